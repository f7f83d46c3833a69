//! Abstract dependency graph and storage-dependency detection
//!
//! During the periodic phase (and at a deadlock) the simulator records which
//! actor had to wait for which other actor as edges of an actor×actor
//! reachability matrix. A channel lies on a *storage dependency* when its
//! endpoints sit on a cycle of that matrix: enlarging such a channel might
//! raise throughput, enlarging any other channel cannot.
//!
//! The matrix is a flat boolean vector indexed `from · n + to`, allocated
//! once per analysis and cleared between runs. The cycle search is a DFS
//! from every actor; once an actor's cycles are exhausted its edges are
//! removed so no cycle is discovered twice.

#![forbid(unsafe_code)]

use crate::graph::{ActorId, TimedGraph};

/// Actor×actor waits-for matrix.
#[derive(Debug)]
pub(crate) struct DependencyMatrix {
    n: usize,
    edges: Vec<bool>,
}

impl DependencyMatrix {
    pub fn new(n: usize) -> Self {
        Self { n, edges: vec![false; n * n] }
    }

    /// Record that `from` waited on `to`.
    #[inline]
    pub fn add(&mut self, from: ActorId, to: ActorId) {
        self.edges[from.as_usize() * self.n + to.as_usize()] = true;
    }

    #[inline]
    fn get(&self, from: usize, to: usize) -> bool {
        self.edges[from * self.n + to]
    }

    /// Remove every edge touching `a`.
    fn isolate(&mut self, a: usize) {
        for i in 0..self.n {
            self.edges[i * self.n + a] = false;
            self.edges[a * self.n + i] = false;
        }
    }

    /// Mark every channel of `g` that lies on a cycle of the matrix.
    ///
    /// `dep` is reset first. When `gate` is given, only channels whose entry
    /// is true can keep a mark; the gate runs after cycle detection so a
    /// cycle through non-storage channels still clears its whole path from
    /// the matrix.
    ///
    /// The matrix is consumed: edges are removed as cycles are discovered.
    pub fn find_storage_dependencies(
        &mut self,
        g: &TimedGraph,
        dep: &mut [bool],
        gate: Option<&[bool]>,
    ) {
        dep.fill(false);

        let mut color = vec![false; self.n];
        let mut pi: Vec<usize> = (0..self.n).collect();
        for a in 0..self.n {
            pi[a] = a;
            self.visit(a, &mut color, &mut pi, g, dep);
        }

        if let Some(gate) = gate {
            for (d, &keep) in dep.iter_mut().zip(gate) {
                *d = *d && keep;
            }
        }
    }

    fn visit(
        &mut self,
        a: usize,
        color: &mut [bool],
        pi: &mut Vec<usize>,
        g: &TimedGraph,
        dep: &mut [bool],
    ) {
        color[a] = true;

        for b in 0..self.n {
            if !self.get(a, b) {
                continue;
            }
            if color[b] {
                // Cycle through b: walk the predecessor chain back from a and
                // mark every channel along it.
                let mut c = a;
                let mut d = b;
                loop {
                    for (id, ch) in g.channels() {
                        if ch.dst.as_usize() == d && ch.src.as_usize() == c {
                            dep[id.as_usize()] = true;
                        }
                    }
                    d = c;
                    c = pi[d];
                    if d == b {
                        break;
                    }
                }
            } else {
                pi[b] = a;
                self.visit(b, color, pi, g, dep);
            }
        }

        // All cycles through a are known; its edges would only rediscover
        // them.
        self.isolate(a);
        color[a] = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Actor, TimedGraph};

    fn two_actor_cycle() -> (TimedGraph, ActorId, ActorId) {
        let mut g = TimedGraph::new("cycle");
        let a = g.add_actor(Actor::with_execution("a", "proc", 1));
        let b = g.add_actor(Actor::with_execution("b", "proc", 1));
        g.connect(a, 1, b, 1, 0).unwrap();
        g.connect(b, 1, a, 1, 0).unwrap();
        (g, a, b)
    }

    #[test]
    fn cycle_marks_channels_on_it() {
        let (g, a, b) = two_actor_cycle();
        let mut m = DependencyMatrix::new(2);
        m.add(a, b);
        m.add(b, a);
        let mut dep = vec![false; 2];
        m.find_storage_dependencies(&g, &mut dep, None);
        assert_eq!(dep, vec![true, true]);
    }

    #[test]
    fn acyclic_waits_mark_nothing() {
        let (g, a, b) = two_actor_cycle();
        let mut m = DependencyMatrix::new(2);
        m.add(b, a);
        let mut dep = vec![true; 2];
        m.find_storage_dependencies(&g, &mut dep, None);
        assert_eq!(dep, vec![false, false]);
    }

    #[test]
    fn gate_filters_after_detection() {
        let (g, a, b) = two_actor_cycle();
        let mut m = DependencyMatrix::new(2);
        m.add(a, b);
        m.add(b, a);
        let mut dep = vec![false; 2];
        m.find_storage_dependencies(&g, &mut dep, Some(&[false, true]));
        assert_eq!(dep, vec![false, true]);
    }

    #[test]
    fn self_cycle_marks_self_edge() {
        let mut g = TimedGraph::new("self");
        let a = g.add_actor(Actor::with_execution("a", "proc", 1));
        g.connect(a, 1, a, 1, 1).unwrap();
        let mut m = DependencyMatrix::new(1);
        m.add(a, a);
        let mut dep = vec![false; 1];
        m.find_storage_dependencies(&g, &mut dep, None);
        assert_eq!(dep, vec![true]);
    }
}
