//! Execution state and the stored-state list
//!
//! A [`State`] is one point of the symbolic simulation: token counts per
//! channel, the FIFO of remaining firing times per actor, and (depending on
//! the run mode) per-actor output space and per-tile schedule/TDMA
//! positions. Two states are equal iff all present fields are componentwise
//! equal; `glb_clk` counts ticks since the most recent iteration boundary.
//!
//! States observed at iteration boundaries go into [`StoredStates`].
//! Membership is a linear scan, since the list length is bounded by the
//! iteration period; a hard cap surfaces as resource
//! exhaustion instead of unbounded growth on diverging state spaces.

#![forbid(unsafe_code)]

use std::collections::VecDeque;

use crate::graph::{Ticks, Tokens};

/// One state of the transition system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct State {
    /// Tokens per channel.
    pub ch: Vec<Tokens>,
    /// Remaining firing times per actor, ordered by start time.
    pub act_clk: Vec<VecDeque<Ticks>>,
    /// Remaining shared output-buffer space per actor (Ning-Gao runs only;
    /// empty otherwise).
    pub sp: Vec<Tokens>,
    /// Position in each tile's static-order schedule (binding-aware runs
    /// only; empty otherwise).
    pub schedule_pos: Vec<usize>,
    /// Offset in each tile's TDMA wheel (binding-aware runs only).
    pub tdma_pos: Vec<Ticks>,
    /// Ticks since the last iteration boundary.
    pub glb_clk: Ticks,
}

impl State {
    pub fn new(nr_actors: usize, nr_channels: usize, nr_tiles: usize, actor_space: bool) -> Self {
        Self {
            ch: vec![0; nr_channels],
            act_clk: vec![VecDeque::new(); nr_actors],
            sp: vec![0; if actor_space { nr_actors } else { 0 }],
            schedule_pos: vec![0; nr_tiles],
            tdma_pos: vec![0; nr_tiles],
            glb_clk: 0,
        }
    }
}

/// Error raised when a run outgrows the stored-state cap.
#[derive(Debug, thiserror::Error)]
#[error("state space exceeded the stored-state cap of {cap} iteration states")]
pub struct StateSpaceExhausted {
    /// The configured cap.
    pub cap: usize,
}

/// Append-only list of iteration-boundary states.
#[derive(Debug)]
pub(crate) struct StoredStates {
    states: Vec<State>,
    cap: usize,
}

impl StoredStates {
    pub fn new(cap: usize) -> Self {
        Self { states: Vec::new(), cap }
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Store `s` unless an equal state is already present. Returns the
    /// position of the pre-existing equal state (the recurrence point) or
    /// `None` when `s` was appended.
    pub fn store(&mut self, s: &State) -> Result<Option<usize>, StateSpaceExhausted> {
        if let Some(pos) = self.states.iter().position(|x| x == s) {
            return Ok(Some(pos));
        }
        if self.states.len() >= self.cap {
            return Err(StateSpaceExhausted { cap: self.cap });
        }
        self.states.push(s.clone());
        Ok(None)
    }

    /// Number of iterations and summed ticks on the cycle starting at
    /// `from`.
    pub fn cycle_metrics(&self, from: usize) -> (u64, Ticks) {
        let cycle = &self.states[from..];
        let ticks = cycle.iter().map(|s| s.glb_clk).sum();
        (cycle.len() as u64, ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_clk(clk: Ticks) -> State {
        let mut s = State::new(2, 2, 0, false);
        s.glb_clk = clk;
        s
    }

    #[test]
    fn equality_is_componentwise() {
        let mut a = State::new(2, 2, 0, false);
        let mut b = a.clone();
        assert_eq!(a, b);
        b.ch[1] = 3;
        assert_ne!(a, b);
        b.ch[1] = 0;
        a.act_clk[0].push_back(5);
        b.act_clk[0].push_back(5);
        assert_eq!(a, b);
        b.act_clk[0].push_back(1);
        assert_ne!(a, b);
    }

    #[test]
    fn store_detects_recurrence_and_reports_cycle() {
        let mut stored = StoredStates::new(16);
        assert_eq!(stored.store(&state_with_clk(2)).unwrap(), None);
        assert_eq!(stored.store(&state_with_clk(3)).unwrap(), None);
        assert_eq!(stored.store(&state_with_clk(4)).unwrap(), None);
        // Same state as the second stored one: recurrence at position 1.
        assert_eq!(stored.store(&state_with_clk(3)).unwrap(), Some(1));
        assert_eq!(stored.cycle_metrics(1), (2, 7));
    }

    #[test]
    fn cap_is_enforced() {
        let mut stored = StoredStates::new(2);
        stored.store(&state_with_clk(1)).unwrap();
        stored.store(&state_with_clk(2)).unwrap();
        assert!(stored.store(&state_with_clk(3)).is_err());
    }
}
