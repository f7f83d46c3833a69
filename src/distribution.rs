//! Storage distributions and the size-ordered lattice
//!
//! A [`StorageDistribution`] is one point of the trade-off space: a storage
//! allocation per channel (per actor in the Ning-Gao variant), its total
//! size, the throughput the simulator measured for it, and the per-channel
//! storage-dependency marks that seed its successors. Distributions of equal
//! total size are grouped into a [`StorageDistributionSet`] carrying the
//! maximum throughput observed in the group.
//!
//! The lattice keeps sets in strictly increasing size order. Storage is
//! index-based (a vector of sets, each owning a vector of distributions)
//! so ownership is explicit and iteration during exploration cannot be
//! invalidated by insertions (successors always land at a larger size).

#![forbid(unsafe_code)]

use serde::Serialize;

use crate::graph::Tokens;
use crate::throughput::Throughput;

/// One storage allocation and its measured behaviour.
#[derive(Debug, Clone, Serialize)]
pub struct StorageDistribution {
    /// Storage per channel (or per actor in the Ning-Gao variant).
    pub sp: Vec<Tokens>,
    /// Total size, `Σ sp`.
    pub sz: Tokens,
    /// Throughput measured by the simulator; zero until explored.
    pub thr: Throughput,
    /// Which channels showed a storage dependency when this distribution was
    /// simulated.
    pub dep: Vec<bool>,
}

impl StorageDistribution {
    /// A fresh, unexplored distribution.
    pub fn new(sp: Vec<Tokens>) -> Self {
        let sz = sp.iter().sum();
        Self { sp, sz, thr: Throughput::zero(), dep: Vec::new() }
    }

    /// A copy of `self` with entry `idx` enlarged by `step`, unexplored.
    pub fn enlarged(&self, idx: usize, step: Tokens) -> Self {
        let mut sp = self.sp.clone();
        sp[idx] += step;
        Self { sz: self.sz + step, sp, thr: Throughput::zero(), dep: Vec::new() }
    }
}

/// All known distributions of one total size.
#[derive(Debug, Clone, Serialize)]
pub struct StorageDistributionSet {
    /// The common total size.
    pub sz: Tokens,
    /// Maximum throughput observed across the distributions.
    pub thr: Throughput,
    /// The distributions, newest first.
    pub distributions: Vec<StorageDistribution>,
}

/// Size-ordered collection of distribution sets.
#[derive(Debug, Default)]
pub(crate) struct Lattice {
    sets: Vec<StorageDistributionSet>,
}

impl Lattice {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[inline]
    pub fn set(&self, idx: usize) -> &StorageDistributionSet {
        &self.sets[idx]
    }

    #[inline]
    pub fn set_mut(&mut self, idx: usize) -> &mut StorageDistributionSet {
        &mut self.sets[idx]
    }

    /// Add `d` to the checklist unless a componentwise-equal distribution of
    /// the same size is already present. Creates or extends the set with
    /// `d.sz`, keeping the size order intact. Returns whether `d` was added.
    pub fn add_to_checklist(&mut self, d: StorageDistribution) -> bool {
        match self.sets.binary_search_by(|s| s.sz.cmp(&d.sz)) {
            Ok(idx) => {
                let set = &mut self.sets[idx];
                if set.distributions.iter().any(|e| e.sp == d.sp) {
                    return false;
                }
                set.distributions.insert(0, d);
                true
            }
            Err(idx) => {
                self.sets.insert(
                    idx,
                    StorageDistributionSet {
                        sz: d.sz,
                        thr: Throughput::zero(),
                        distributions: vec![d],
                    },
                );
                true
            }
        }
    }

    /// Drop the non-minimal distributions of set `idx`: everything, when the
    /// previous (smaller) set already reaches the same throughput; otherwise
    /// every distribution below the set's maximum.
    pub fn minimize_set(&mut self, idx: usize) {
        let dominated =
            idx > 0 && self.sets[idx - 1].thr == self.sets[idx].thr;
        let set = &mut self.sets[idx];
        if dominated {
            set.distributions.clear();
        } else {
            let max = set.thr;
            set.distributions.retain(|d| d.thr >= max);
        }
    }

    /// Remove set `idx` entirely.
    pub fn remove_set(&mut self, idx: usize) {
        self.sets.remove(idx);
    }

    /// Drop every set after `idx`.
    pub fn truncate_after(&mut self, idx: usize) {
        self.sets.truncate(idx + 1);
    }

    /// Consume the lattice into its sets, in increasing size order.
    pub fn into_sets(self) -> Vec<StorageDistributionSet> {
        self.sets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(sp: &[Tokens]) -> StorageDistribution {
        StorageDistribution::new(sp.to_vec())
    }

    #[test]
    fn checklist_orders_by_size_and_deduplicates() {
        let mut l = Lattice::new();
        assert!(l.add_to_checklist(dist(&[2, 2])));
        assert!(l.add_to_checklist(dist(&[1, 1])));
        assert!(l.add_to_checklist(dist(&[3, 1])));
        // Same allocation again: rejected.
        assert!(!l.add_to_checklist(dist(&[2, 2])));
        // Same size, different allocation: joins the existing set.
        assert!(l.add_to_checklist(dist(&[1, 3])));

        assert_eq!(l.len(), 2);
        assert_eq!(l.set(0).sz, 2);
        assert_eq!(l.set(1).sz, 4);
        assert_eq!(l.set(1).distributions.len(), 3);
    }

    #[test]
    fn minimize_drops_sub_maximal_distributions() {
        let mut l = Lattice::new();
        l.add_to_checklist(dist(&[1, 1]));
        l.add_to_checklist(dist(&[2, 0]));
        let set = l.set_mut(0);
        set.distributions[0].thr = Throughput::from_cycle(1, 2);
        set.distributions[1].thr = Throughput::from_cycle(1, 3);
        set.thr = Throughput::from_cycle(1, 2);

        l.minimize_set(0);
        assert_eq!(l.set(0).distributions.len(), 1);
        assert_eq!(l.set(0).distributions[0].thr, Throughput::from_cycle(1, 2));
    }

    #[test]
    fn minimize_clears_sets_dominated_by_smaller_ones() {
        let mut l = Lattice::new();
        l.add_to_checklist(dist(&[1, 1]));
        l.add_to_checklist(dist(&[2, 1]));
        l.set_mut(0).thr = Throughput::from_cycle(1, 2);
        l.set_mut(0).distributions[0].thr = Throughput::from_cycle(1, 2);
        l.set_mut(1).thr = Throughput::from_cycle(1, 2);
        l.set_mut(1).distributions[0].thr = Throughput::from_cycle(1, 2);

        l.minimize_set(1);
        assert!(l.set(1).distributions.is_empty());
        assert_eq!(l.set(0).distributions.len(), 1);
    }

    #[test]
    fn pareto_front_serializes_for_external_rendering() {
        let mut d = dist(&[2, 2]);
        d.thr = Throughput::from_cycle(1, 3);
        d.dep = vec![false, true];
        let set = StorageDistributionSet { sz: 4, thr: d.thr, distributions: vec![d] };

        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["sz"], 4);
        assert_eq!(json["distributions"][0]["sp"][1], 2);
    }

    #[test]
    fn enlarged_distribution_grows_one_entry() {
        let d = dist(&[2, 3]);
        let e = d.enlarged(1, 2);
        assert_eq!(e.sp, vec![2, 5]);
        assert_eq!(e.sz, 7);
        assert!(e.thr.is_zero());
    }
}
