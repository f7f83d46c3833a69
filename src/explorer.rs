//! Throughput / storage-space trade-off exploration
//!
//! A monotone lattice search over storage allocations. The seed is the
//! per-channel lower bound for positive throughput; every simulated
//! allocation contributes successors that enlarge one storage-dependent
//! channel by that channel's coarsest useful step, `gcd(p, c)`. Sets of
//! equal total size are explored in increasing size order, pruned to their
//! throughput-maximal members, and dropped entirely when a smaller size
//! already achieves their throughput. The search stops at a caller-supplied
//! throughput bound or once the graph's maximal throughput is reached.
//!
//! Two spaces drive the shared search:
//!
//! * the **capacity space** for plain graphs: auto-concurrency is first
//!   excluded with a one-token self-loop per actor, then every non-self-edge
//!   channel gets a reverse channel carrying its storage allocation, so the
//!   plain simulator observes back-pressure. Distributions are indexed by
//!   the original channels.
//! * the **binding space** for binding-aware graphs: the rewrite has
//!   already materialised storage as channels marked as storage-modelling;
//!   distributions range over all channels of the rewritten graph.

#![forbid(unsafe_code)]

use num_integer::Integer;
use tracing::debug;

use crate::binding::BindingAwareGraph;
use crate::distribution::{Lattice, StorageDistribution, StorageDistributionSet};
use crate::graph::{ChannelId, TimedGraph, Tokens};
use crate::platform::{FlowType, Mapping, PlatformGraph};
use crate::repetition::RepetitionVector;
use crate::throughput::Throughput;
use crate::transition::{ExecLimits, RunMode, TransitionSystem};
use crate::AnalysisError;

/// Lower bound on the storage of a channel with rates `p`, `c` and `t`
/// initial tokens below which it can never sustain positive throughput.
pub(crate) fn channel_lower_bound(p: Tokens, c: Tokens, t: Tokens) -> Tokens {
    let g = p.gcd(&c);
    p + c - g + t % g
}

/// The coarsest storage step that can change feasibility.
pub(crate) fn channel_size_step(p: Tokens, c: Tokens) -> Tokens {
    p.gcd(&c)
}

/// One trade-off space: how to simulate an allocation, which successors a
/// dependency generates, and when the search may stop.
pub(crate) trait DistributionSpace {
    /// Simulate `d`, filling its throughput and dependency marks.
    fn evaluate(&mut self, d: &mut StorageDistribution) -> Result<(), AnalysisError>;

    /// Enlarged allocations suggested by the dependencies of `d`.
    fn successors(&self, d: &StorageDistribution) -> Vec<StorageDistribution>;

    /// True once a set reaching `thr` ends the search.
    fn should_stop(&self, thr: Throughput) -> bool;
}

/// The shared search loop: explore sets in increasing size order, prune
/// non-minimal allocations, purge everything past the stopping set, and
/// replace a deadlocking seed with the all-zero point.
pub(crate) fn find_minimal_distributions<S: DistributionSpace>(
    space: &mut S,
    seed: StorageDistribution,
) -> Result<Vec<StorageDistributionSet>, AnalysisError> {
    let mut lattice = Lattice::new();
    debug!(sz = seed.sz, "seeding trade-off exploration");
    lattice.add_to_checklist(seed);

    let mut idx = 0;
    let mut stopped = false;
    while idx < lattice.len() {
        let mut di = 0;
        while di < lattice.set(idx).distributions.len() {
            let mut d = lattice.set(idx).distributions[di].clone();
            space.evaluate(&mut d)?;
            if d.thr > lattice.set(idx).thr {
                lattice.set_mut(idx).thr = d.thr;
            }
            for successor in space.successors(&d) {
                lattice.add_to_checklist(successor);
            }
            lattice.set_mut(idx).distributions[di] = d;
            di += 1;
        }
        lattice.minimize_set(idx);

        let thr = lattice.set(idx).thr;
        debug!(sz = lattice.set(idx).sz, thr = thr.as_f64(), "explored distribution set");
        if space.should_stop(thr) {
            stopped = true;
            break;
        }
        if lattice.set(idx).distributions.is_empty() {
            lattice.remove_set(idx);
        } else {
            idx += 1;
        }
    }
    if stopped {
        lattice.truncate_after(idx);
    }

    let mut sets = lattice.into_sets();
    // A deadlocking lower bound is not a minimal allocation; the honest
    // minimum for zero throughput is no storage at all.
    if let Some(first) = sets.first_mut() {
        if first.thr.is_zero() {
            first.sz = 0;
            for d in &mut first.distributions {
                d.sz = 0;
                d.sp.fill(0);
            }
        }
    }
    Ok(sets)
}

/// A plain graph extended so the simulator observes storage back-pressure:
/// one-token self-loops exclude auto-concurrency, and each non-self-edge
/// channel gains a reverse channel holding its free space.
pub(crate) struct CapacityModel {
    pub graph: TimedGraph,
    /// Reverse (storage) channel of each original channel; `None` on
    /// self-edges.
    pub reverse: Vec<Option<ChannelId>>,
    /// Per extended channel: does it carry a storage allocation.
    pub buffer_channels: Vec<bool>,
}

impl CapacityModel {
    pub fn build(g: &TimedGraph) -> Result<Self, AnalysisError> {
        let mut graph = g.clone();

        for (a, _) in g.actors() {
            graph.connect(a, 1, a, 1, 1)?;
        }

        let mut reverse = vec![None; g.nr_channels()];
        for (c, ch) in g.channels() {
            if ch.is_self_edge() {
                continue;
            }
            let rev =
                graph.connect_storage(ch.dst, ch.dst_rate, ch.src, ch.src_rate, 0, c)?;
            reverse[c.as_usize()] = Some(rev);
        }

        let buffer_channels = graph
            .channels()
            .map(|(_, ch)| ch.models_storage_space())
            .collect();

        Ok(Self { graph, reverse, buffer_channels })
    }

    /// Spread an allocation over the original channels onto the reverse
    /// channels of the extended graph.
    pub fn extend_allocation(&self, sp: &[Tokens]) -> Vec<Tokens> {
        let mut extended = vec![0; self.graph.nr_channels()];
        for (c, rev) in self.reverse.iter().enumerate() {
            if let Some(rev) = rev {
                extended[rev.as_usize()] = sp[c];
            }
        }
        extended
    }

    /// Pull per-extended-channel dependency marks back onto the original
    /// channels.
    fn collapse_dependencies(&self, dep: &[bool]) -> Vec<bool> {
        self.reverse
            .iter()
            .map(|rev| rev.map_or(false, |r| dep[r.as_usize()]))
            .collect()
    }

    /// An allocation large enough not to constrain the steady state: the
    /// initial tokens plus one full iteration of production and consumption
    /// per channel.
    pub fn saturated_allocation(&self, g: &TimedGraph, q: &RepetitionVector) -> Vec<Tokens> {
        g.channels()
            .map(|(_, ch)| {
                ch.initial_tokens + ch.src_rate * q.entry(ch.src) + ch.dst_rate * q.entry(ch.dst)
            })
            .collect()
    }
}

/// Throughput of `g` once auto-concurrency is excluded and every channel has
/// a saturating storage allocation. This is the finite-state stand-in for
/// the self-timed throughput of graphs that are not strongly connected.
pub(crate) fn saturated_throughput(g: &TimedGraph) -> Result<Throughput, AnalysisError> {
    let model = CapacityModel::build(g)?;
    let q = RepetitionVector::compute(g)?;
    let sp = model.extend_allocation(&model.saturated_allocation(g, &q));
    let mut ts = TransitionSystem::new(&model.graph, None, ExecLimits::default())?;
    let outcome = ts.execute(
        RunMode::Distribution { sp: &sp, buffer_channels: &model.buffer_channels },
        false,
    )?;
    Ok(outcome.throughput)
}

struct CapacitySpace<'m> {
    original: &'m TimedGraph,
    model: &'m CapacityModel,
    ts: TransitionSystem<'m>,
    steps: Vec<Tokens>,
    thr_bound: f64,
    use_bounds: bool,
    max_thr: Throughput,
}

impl DistributionSpace for CapacitySpace<'_> {
    fn evaluate(&mut self, d: &mut StorageDistribution) -> Result<(), AnalysisError> {
        let sp = self.model.extend_allocation(&d.sp);
        let outcome = self.ts.execute(
            RunMode::Distribution { sp: &sp, buffer_channels: &self.model.buffer_channels },
            true,
        )?;
        d.thr = outcome.throughput;
        d.dep = self.model.collapse_dependencies(&outcome.dep);
        Ok(())
    }

    fn successors(&self, d: &StorageDistribution) -> Vec<StorageDistribution> {
        let mut out = Vec::new();
        for (c, ch) in self.original.channels() {
            let i = c.as_usize();
            if !d.dep[i] || ch.is_self_edge() {
                continue;
            }
            if self.use_bounds && d.sp[i] >= ch.initial_tokens {
                continue;
            }
            out.push(d.enlarged(i, self.steps[i]));
        }
        out
    }

    fn should_stop(&self, thr: Throughput) -> bool {
        thr.as_f64() >= self.thr_bound || thr == self.max_thr
    }
}

/// Pareto-minimal storage allocations of a plain graph against a throughput
/// bound.
///
/// The result lists distribution sets in increasing total size, each tagged
/// with the maximal throughput its allocations reach; exploration stops at
/// the first set meeting `thr_bound` (or the graph's maximal throughput) and
/// everything beyond it is discarded. With `use_bounds`, channels are never
/// grown past their initial-token allocation.
pub fn analyze_buffer_tradeoff(
    g: &TimedGraph,
    thr_bound: f64,
    use_bounds: bool,
) -> Result<Vec<StorageDistributionSet>, AnalysisError> {
    g.validate()?;
    let model = CapacityModel::build(g)?;
    let q = RepetitionVector::compute(g)?;

    let mut min_sz = Vec::with_capacity(g.nr_channels());
    let mut steps = Vec::with_capacity(g.nr_channels());
    for (_, ch) in g.channels() {
        let (p, c, t) = (ch.src_rate, ch.dst_rate, ch.initial_tokens);
        let lb = if ch.is_self_edge() {
            p + c.max(t)
        } else {
            channel_lower_bound(p, c, t).max(t)
        };
        min_sz.push(lb);
        steps.push(channel_size_step(p, c));
    }

    let mut space = CapacitySpace {
        original: g,
        model: &model,
        ts: TransitionSystem::new(&model.graph, None, ExecLimits::default())?,
        steps,
        thr_bound,
        use_bounds,
        max_thr: Throughput::zero(),
    };

    // Measure the maximal reachable throughput at a saturating allocation;
    // the search stops once a set attains it.
    let mut saturated = StorageDistribution::new(model.saturated_allocation(g, &q));
    space.evaluate(&mut saturated)?;
    space.max_thr = saturated.thr;

    find_minimal_distributions(&mut space, StorageDistribution::new(min_sz))
}

struct BindingSpace<'m> {
    graph: &'m TimedGraph,
    buffer_channels: Vec<bool>,
    ts: TransitionSystem<'m>,
    steps: Vec<Tokens>,
    thr_bound: f64,
    use_bounds: bool,
}

impl DistributionSpace for BindingSpace<'_> {
    fn evaluate(&mut self, d: &mut StorageDistribution) -> Result<(), AnalysisError> {
        let outcome = self.ts.execute(
            RunMode::Distribution { sp: &d.sp, buffer_channels: &self.buffer_channels },
            true,
        )?;
        d.thr = outcome.throughput;
        d.dep = outcome.dep;
        Ok(())
    }

    fn successors(&self, d: &StorageDistribution) -> Vec<StorageDistribution> {
        let mut out = Vec::new();
        for (c, ch) in self.graph.channels() {
            let i = c.as_usize();
            if !d.dep[i] || ch.is_self_edge() {
                continue;
            }
            if self.use_bounds && d.sp[i] >= ch.initial_tokens {
                continue;
            }
            out.push(d.enlarged(i, self.steps[i]));
        }
        out
    }

    fn should_stop(&self, thr: Throughput) -> bool {
        // No finite maximal throughput is known for a bound graph; only the
        // caller's bound (or an unbounded measurement) ends the search.
        thr.as_f64() >= self.thr_bound || thr == Throughput::unbounded()
    }
}

/// Pareto-minimal storage allocations of a graph bound to a platform.
///
/// Distributions range over every channel of the binding-aware rewrite of
/// `g`; only channels modelling storage space take their size from the
/// allocation (and can be enlarged), the others keep their initial tokens
/// but still contribute their lower bound to the total size.
pub fn analyze_binding_aware_buffer_tradeoff(
    g: &TimedGraph,
    platform: &PlatformGraph,
    mapping: &Mapping,
    flow: FlowType,
    thr_bound: f64,
    use_bounds: bool,
) -> Result<Vec<StorageDistributionSet>, AnalysisError> {
    g.validate()?;
    let bag = BindingAwareGraph::build(g, platform, mapping, flow)?;
    let graph = &bag.graph;

    let buffer_channels: Vec<bool> =
        graph.channels().map(|(_, ch)| ch.models_storage_space()).collect();

    let mut min_sz = Vec::with_capacity(graph.nr_channels());
    let mut steps = Vec::with_capacity(graph.nr_channels());
    for (c, ch) in graph.channels() {
        let (p, cr, t) = (ch.src_rate, ch.dst_rate, ch.initial_tokens);
        let lb = if ch.is_self_edge() {
            p + cr
        } else if buffer_channels[c.as_usize()] {
            // Storage allocations replace the initial tokens on buffer
            // channels, so those do not raise the bound.
            channel_lower_bound(p, cr, t)
        } else {
            channel_lower_bound(p, cr, t).max(t)
        };
        min_sz.push(lb);
        steps.push(channel_size_step(p, cr));
    }

    let mut space = BindingSpace {
        graph,
        buffer_channels,
        ts: TransitionSystem::new(graph, Some(bag.binding()), ExecLimits::default())?,
        steps,
        thr_bound,
        use_bounds,
    };

    find_minimal_distributions(&mut space, StorageDistribution::new(min_sz))
}
