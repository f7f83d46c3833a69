//! Repetition vector
//!
//! Solves the balance equations `p · q[src] = c · q[dst]` of an SDF graph by
//! propagating fractional firing rates along channels, scaling by the common
//! denominator and normalising by the global gcd. A graph that admits such a
//! positive integer vector is *consistent*; anything else is rejected before
//! an engine run starts.
//!
//! The *output actor*, the actor with the smallest repetition-vector entry
//! and ties broken towards the lowest id, anchors iteration boundaries in the
//! transition system: framing throughput as iterations of that actor yields
//! the shortest recurrence period and the smallest stored-state list.

#![forbid(unsafe_code)]

use num_integer::Integer;
use num_rational::Ratio;

use crate::graph::{ActorId, TimedGraph};

/// Errors raised when the balance equations have no positive solution.
#[derive(Debug, thiserror::Error)]
pub enum ConsistencyError {
    /// The balance equation of the named channel is violated.
    #[error("graph is inconsistent: balance equation fails on channel '{0}'")]
    Inconsistent(String),
    /// The graph has no actors.
    #[error("graph contains no actors")]
    Empty,
}

/// A positive integer firing count per actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepetitionVector(Vec<u64>);

impl RepetitionVector {
    /// Solve the balance equations of `g`.
    ///
    /// Rates are propagated per connected component with a depth-first walk;
    /// disconnected components each anchor at rate one. The result is the
    /// smallest positive integer solution.
    pub fn compute(g: &TimedGraph) -> Result<Self, ConsistencyError> {
        if g.nr_actors() == 0 {
            return Err(ConsistencyError::Empty);
        }

        let mut rate: Vec<Option<Ratio<u64>>> = vec![None; g.nr_actors()];
        let mut stack = Vec::new();

        for root in 0..g.nr_actors() {
            if rate[root].is_some() {
                continue;
            }
            rate[root] = Some(Ratio::from_integer(1));
            stack.push(ActorId(root));

            while let Some(a) = stack.pop() {
                let ra = rate[a.as_usize()].expect("visited actors carry a rate");
                for (_, ch) in g.channels() {
                    let (other, expected) = if ch.src == a {
                        (ch.dst, ra * Ratio::new(ch.src_rate, ch.dst_rate))
                    } else if ch.dst == a {
                        (ch.src, ra * Ratio::new(ch.dst_rate, ch.src_rate))
                    } else {
                        continue;
                    };
                    match rate[other.as_usize()] {
                        None => {
                            rate[other.as_usize()] = Some(expected);
                            stack.push(other);
                        }
                        Some(r) if r != expected => {
                            return Err(ConsistencyError::Inconsistent(ch.name.clone()));
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        // Scale to integers and normalise to the smallest solution.
        let lcm = rate
            .iter()
            .map(|r| *r.as_ref().expect("all actors visited").denom())
            .fold(1u64, |acc, d| acc.lcm(&d));
        let mut q: Vec<u64> = rate
            .into_iter()
            .map(|r| {
                let r = r.expect("all actors visited");
                r.numer() * (lcm / r.denom())
            })
            .collect();
        let gcd = q.iter().fold(0u64, |acc, &v| acc.gcd(&v));
        for v in &mut q {
            *v /= gcd;
        }

        Ok(Self(q))
    }

    /// Entry of actor `a`.
    #[inline]
    pub fn entry(&self, a: ActorId) -> u64 {
        self.0[a.as_usize()]
    }

    /// The actor with the smallest entry (lowest id on ties) and that entry.
    pub fn output_actor(&self) -> (ActorId, u64) {
        let mut best = (ActorId(0), self.0[0]);
        for (i, &v) in self.0.iter().enumerate() {
            if v < best.1 {
                best = (ActorId(i), v);
            }
        }
        best
    }

    /// Iterate entries in actor-id order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.iter().copied()
    }
}
