//! Transition system
//!
//! The deterministic symbolic simulator at the heart of every analysis. A run
//! interleaves three transitions on a mutable [`State`]: *start* (consume
//! input tokens, enqueue a remaining firing time), *end* (dequeue, produce
//! output tokens) and *clock step* (advance time by the smallest remaining
//! firing time). All enabled transitions are taken before time advances, so
//! the execution is a function of the graph and the storage distribution.
//!
//! Each time the output actor completes its repetition-vector-many firings
//! the state is compared against the stored iteration-boundary states; a
//! match means steady state, and the throughput is the number of iterations
//! on the recurrence cycle divided by its span in ticks. A clock step with no
//! firing in flight is a deadlock: throughput zero.
//!
//! Run modes layer three orthogonal refinements over the base rules:
//!
//! * **distribution-driven**: buffer channels start at their allocated
//!   storage instead of their initial tokens, minus the initial tokens of
//!   the channel whose space they model;
//! * **Ning-Gao**: actors own a shared output buffer `sp[a]`; firings claim
//!   space on start, the last reader releases it, and the start scan repeats
//!   until no new firing is enabled so same-time chains are followed;
//! * **binding-aware**: a firing must be at the head of its tile's
//!   static-order schedule, completion times stretch by TDMA waiting, and
//!   clock steps rotate the TDMA wheels.
//!
//! After a run the periodic phase is optionally replayed to collect causal
//! dependencies (which actor waited on which) into a [`DependencyMatrix`];
//! cycles in that matrix yield the storage dependencies that guide the
//! trade-off explorer.

#![forbid(unsafe_code)]

use tracing::{debug, trace};

use crate::binding::BindingContext;
use crate::dependencies::DependencyMatrix;
use crate::graph::{ActorId, ChannelId, Ticks, TimedGraph, Tokens};
use crate::repetition::RepetitionVector;
use crate::state::{State, StoredStates};
use crate::throughput::Throughput;
use crate::AnalysisError;

/// Caps that keep a diverging run from exhausting memory.
#[derive(Debug, Clone, Copy)]
pub struct ExecLimits {
    /// Maximum number of iteration-boundary states kept per run.
    pub max_stored_states: usize,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self { max_stored_states: 1 << 20 }
    }
}

/// How a run initialises channels and which refinements are active.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RunMode<'a> {
    /// Channels start at their initial tokens; storage is unbounded.
    SelfTimed,
    /// Buffer channels start at the allocated storage `sp[c]`.
    Distribution {
        /// Storage per channel; read only where `buffer_channels` is true.
        sp: &'a [Tokens],
        /// Which channels model storage space and take their size from `sp`.
        buffer_channels: &'a [bool],
    },
    /// Shared output buffers: `sp[a]` bounds the tokens actor `a` may have
    /// unconsumed across all its output channels.
    NingGao {
        /// Storage per actor.
        sp: &'a [Tokens],
    },
}

impl RunMode<'_> {
    fn is_ning_gao(&self) -> bool {
        matches!(self, RunMode::NingGao { .. })
    }

    fn dependency_gate(&self) -> Option<&[bool]> {
        match self {
            RunMode::Distribution { buffer_channels, .. } => Some(buffer_channels),
            _ => None,
        }
    }
}

/// Result of one simulation run.
#[derive(Debug)]
pub(crate) struct RunOutcome {
    pub throughput: Throughput,
    /// Per-channel storage-dependency marks (meaningful when the run was
    /// asked to analyze dependencies, and on early storage failures).
    pub dep: Vec<bool>,
    /// First firing time per actor (Ning-Gao runs only; empty otherwise).
    pub start_times: Vec<Ticks>,
}

/// The simulator. One instance serves many runs over the same graph; each
/// run rebuilds its state and stored-state list.
pub(crate) struct TransitionSystem<'a> {
    g: &'a TimedGraph,
    binding: Option<&'a BindingContext>,
    in_channels: Vec<Vec<ChannelId>>,
    out_channels: Vec<Vec<ChannelId>>,
    exec_times: Vec<Ticks>,
    output_actor: ActorId,
    output_rep_cnt: u64,
    current: State,
    previous: State,
    stored: StoredStates,
    ning_gao: bool,
}

impl<'a> TransitionSystem<'a> {
    /// Prepare a simulator: compute the repetition vector, pick the output
    /// actor and cache the adjacency.
    pub fn new(
        g: &'a TimedGraph,
        binding: Option<&'a BindingContext>,
        limits: ExecLimits,
    ) -> Result<Self, AnalysisError> {
        let q = RepetitionVector::compute(g)?;
        let (output_actor, output_rep_cnt) = q.output_actor();

        if let Some(b) = binding {
            b.check_bound_actors_scheduled(g)?;
        }

        let mut in_channels = vec![Vec::new(); g.nr_actors()];
        let mut out_channels = vec![Vec::new(); g.nr_actors()];
        let mut exec_times = Vec::with_capacity(g.nr_actors());
        for (id, ch) in g.channels() {
            out_channels[ch.src.as_usize()].push(id);
            in_channels[ch.dst.as_usize()].push(id);
        }
        for (_, actor) in g.actors() {
            exec_times.push(actor.execution_time().ok_or_else(|| {
                crate::graph::GraphError::MissingExecutionTime(actor.name.clone())
            })?);
        }

        Ok(Self {
            g,
            binding,
            in_channels,
            out_channels,
            exec_times,
            output_actor,
            output_rep_cnt,
            current: State::new(0, 0, 0, false),
            previous: State::new(0, 0, 0, false),
            stored: StoredStates::new(limits.max_stored_states),
            ning_gao: false,
        })
    }

    /// Execute until a recurrent state or a deadlock. With `analyze_deps`,
    /// the periodic phase (or the deadlocked state) is analysed for storage
    /// dependencies.
    pub fn execute(
        &mut self,
        mode: RunMode<'_>,
        analyze_deps: bool,
    ) -> Result<RunOutcome, AnalysisError> {
        let nr_actors = self.g.nr_actors();
        let nr_channels = self.g.nr_channels();
        let nr_tiles = self.binding.map_or(0, |b| b.nr_tiles());
        self.ning_gao = mode.is_ning_gao();

        self.stored.clear();
        self.current = State::new(nr_actors, nr_channels, nr_tiles, self.ning_gao);
        self.previous = State::new(nr_actors, nr_channels, nr_tiles, self.ning_gao);

        let mut dep = vec![false; nr_channels];
        let mut start_times = vec![0; if self.ning_gao { nr_actors } else { 0 }];
        let mut iter_cnt = vec![0u64; if self.ning_gao { nr_actors } else { 0 }];

        if !self.init_channels(&mode, &mut dep) {
            return Ok(RunOutcome { throughput: Throughput::zero(), dep, start_times });
        }

        let mut rep_cnt: u64 = 0;
        let mut global_time: Ticks = 0;

        loop {
            self.previous.ch.copy_from_slice(&self.current.ch);
            if self.ning_gao {
                self.previous.sp.copy_from_slice(&self.current.sp);
            }

            // Finish every enabled firing; iteration boundaries are detected
            // before the completing firing is popped.
            for a in (0..nr_actors).map(ActorId) {
                while self.actor_ready_to_end(a) {
                    if a == self.output_actor {
                        rep_cnt += 1;
                        if rep_cnt == self.output_rep_cnt {
                            if let Some(pos) = self.stored.store(&self.current)? {
                                trace!(cycle_start = pos, "recurrent state found");
                                if analyze_deps {
                                    self.analyze_periodic_phase(&mode, &mut dep);
                                }
                                let (iters, ticks) = self.stored.cycle_metrics(pos);
                                let throughput = Throughput::from_cycle(iters, ticks);
                                if self.ning_gao {
                                    align_start_times(&mut start_times, &iter_cnt, throughput);
                                }
                                return Ok(RunOutcome { throughput, dep, start_times });
                            }
                            self.current.glb_clk = 0;
                            rep_cnt = 0;
                        }
                    }
                    self.end_actor_firing(a);
                }
            }

            // Start every enabled firing. In Ning-Gao mode a started firing
            // can release space that enables another start at the same time,
            // so the scan repeats until quiescent.
            loop {
                let mut started = false;
                for a in (0..nr_actors).map(ActorId) {
                    while self.actor_ready_to_fire(a, &mode) {
                        self.start_actor_firing(a, &mode);
                        if self.ning_gao {
                            start_times[a.as_usize()] = global_time;
                            iter_cnt[a.as_usize()] += 1;
                        }
                        started = true;
                    }
                }
                if !self.ning_gao || !started {
                    break;
                }
            }

            match self.clock_step() {
                None => {
                    debug!("deadlock reached");
                    if analyze_deps {
                        self.analyze_deadlock(&mode, &mut dep);
                    }
                    return Ok(RunOutcome { throughput: Throughput::zero(), dep, start_times });
                }
                Some(step) => global_time += step,
            }
        }
    }

    /// Set up channel contents for the run. Returns false when the storage
    /// allocation cannot even hold the initial tokens (with the failing
    /// channel marked in `dep`).
    fn init_channels(&mut self, mode: &RunMode<'_>, dep: &mut [bool]) -> bool {
        match *mode {
            RunMode::SelfTimed => {
                for (id, ch) in self.g.channels() {
                    self.current.ch[id.as_usize()] = ch.initial_tokens;
                }
            }
            RunMode::Distribution { sp, buffer_channels } => {
                for (id, ch) in self.g.channels() {
                    self.current.ch[id.as_usize()] = if buffer_channels[id.as_usize()] {
                        sp[id.as_usize()]
                    } else {
                        ch.initial_tokens
                    };
                }
                // A channel that models storage space must reserve room for
                // the represented channel's initial tokens. Only source-side
                // space carries them; destination buffers start empty.
                for (id, ch) in self.g.channels() {
                    if !buffer_channels[id.as_usize()] {
                        continue;
                    }
                    let Some(rep) = ch.represents else { continue };
                    let tokens = self.g.channel(rep).initial_tokens;
                    if tokens == 0 || self.g.channel(rep).src != ch.dst {
                        continue;
                    }
                    if self.current.ch[id.as_usize()] >= tokens {
                        self.current.ch[id.as_usize()] -= tokens;
                    } else {
                        dep[id.as_usize()] = true;
                        return false;
                    }
                }
            }
            RunMode::NingGao { sp } => {
                self.current.sp.fill(Tokens::MAX);
                for (id, ch) in self.g.channels() {
                    let src = ch.src.as_usize();
                    if sp[src] < ch.initial_tokens {
                        dep[id.as_usize()] = true;
                        return false;
                    }
                    self.current.ch[id.as_usize()] = ch.initial_tokens;
                    let available = sp[src] - ch.initial_tokens;
                    if self.current.sp[src] > available {
                        self.current.sp[src] = available;
                    }
                }
            }
        }
        true
    }

    fn actor_ready_to_fire(&self, a: ActorId, mode: &RunMode<'_>) -> bool {
        if let Some(b) = self.binding {
            if let Some(t) = b.binding_of_actor(a) {
                let pos = self.current.schedule_pos[t.as_usize()];
                if b.schedule(t).entry(pos) != Some(a) {
                    return false;
                }
            }
        }
        for &c in &self.in_channels[a.as_usize()] {
            if self.current.ch[c.as_usize()] < self.g.channel(c).dst_rate {
                return false;
            }
        }
        if mode.is_ning_gao() {
            for &c in &self.out_channels[a.as_usize()] {
                if self.current.sp[a.as_usize()] < self.g.channel(c).src_rate {
                    return false;
                }
            }
        }
        true
    }

    /// True when consuming from `c` frees space on its source's shared
    /// output buffer: every other output channel of the source holds fewer
    /// tokens, so this consumption retires the token set.
    fn releases_shared_output_space(&self, c: ChannelId) -> bool {
        let src = self.g.channel(c).src;
        for &o in &self.out_channels[src.as_usize()] {
            if o != c && self.current.ch[o.as_usize()] >= self.current.ch[c.as_usize()] {
                return false;
            }
        }
        true
    }

    fn start_actor_firing(&mut self, a: ActorId, mode: &RunMode<'_>) {
        let ning = mode.is_ning_gao();
        for i in 0..self.in_channels[a.as_usize()].len() {
            let c = self.in_channels[a.as_usize()][i];
            let rate = self.g.channel(c).dst_rate;
            if ning && self.releases_shared_output_space(c) {
                let src = self.g.channel(c).src.as_usize();
                self.current.sp[src] += rate;
            }
            self.current.ch[c.as_usize()] -= rate;
        }
        if ning {
            // One token set claims space once, whatever the fanout.
            if let Some(&c) = self.out_channels[a.as_usize()].first() {
                self.current.sp[a.as_usize()] -= self.g.channel(c).src_rate;
            }
        }
        let completion = self.completion_time(a);
        self.current.act_clk[a.as_usize()].push_back(completion);
    }

    /// Execution time plus, on a TDMA-arbitrated tile, the time spent
    /// outside the reserved slice before the firing completes.
    fn completion_time(&self, a: ActorId) -> Ticks {
        let exec = self.exec_times[a.as_usize()];
        let Some(b) = self.binding else { return exec };
        let Some(t) = b.binding_of_actor(a) else { return exec };

        let size = b.tdma_size(t);
        let slice = b.tdma_slice(t);
        let pos = self.current.tdma_pos[t.as_usize()];
        if pos < size - slice {
            // Wait for the slice to start, then one non-reserved gap per
            // extra wheel rotation the execution needs.
            let to_slice = size - slice - pos;
            let rotations = if exec == 0 { 0 } else { (exec - 1) / slice };
            to_slice + exec + (size - slice) * rotations
        } else {
            let past = pos + exec;
            if past < size {
                exec
            } else {
                exec + ((past - size) / slice) * (size - slice)
            }
        }
    }

    fn actor_ready_to_end(&self, a: ActorId) -> bool {
        self.current.act_clk[a.as_usize()].front() == Some(&0)
    }

    fn end_actor_firing(&mut self, a: ActorId) {
        for i in 0..self.out_channels[a.as_usize()].len() {
            let c = self.out_channels[a.as_usize()][i];
            self.current.ch[c.as_usize()] += self.g.channel(c).src_rate;
        }
        self.current.act_clk[a.as_usize()].pop_front();

        if let Some(b) = self.binding {
            if let Some(t) = b.binding_of_actor(a) {
                let pos = self.current.schedule_pos[t.as_usize()];
                self.current.schedule_pos[t.as_usize()] = b.schedule(t).next(pos);
            }
        }
    }

    /// Advance time to the next firing completion. `None` signals deadlock;
    /// zero means a completion is already due.
    fn clock_step(&mut self) -> Option<Ticks> {
        let step = self
            .current
            .act_clk
            .iter()
            .filter_map(|q| q.front().copied())
            .min()?;
        if step == 0 {
            return Some(0);
        }

        for q in &mut self.current.act_clk {
            for remaining in q.iter_mut() {
                *remaining -= step;
            }
        }
        if let Some(b) = self.binding {
            for t in 0..b.nr_tiles() {
                self.current.tdma_pos[t] =
                    (self.current.tdma_pos[t] + step) % b.tdma_size(crate::graph::TileId(t));
            }
        }
        self.current.glb_clk += step;
        Some(step)
    }

    /// Record, before actor `a` starts, which of its ports were blocked in
    /// the previous state.
    fn find_causal_dependencies(&self, a: ActorId, matrix: &mut DependencyMatrix) {
        for &c in &self.in_channels[a.as_usize()] {
            let ch = self.g.channel(c);
            if self.previous.ch[c.as_usize()] < ch.dst_rate {
                matrix.add(ch.dst, ch.src);
            }
        }
        if self.ning_gao {
            for &c in &self.out_channels[a.as_usize()] {
                let ch = self.g.channel(c);
                if self.previous.sp[a.as_usize()] < ch.src_rate {
                    matrix.add(ch.src, ch.dst);
                }
            }
        }
    }

    /// Replay one period from the recurrent state, collecting causal
    /// dependencies, then mark the channels on dependency cycles.
    fn analyze_periodic_phase(&mut self, mode: &RunMode<'_>, dep: &mut [bool]) {
        let nr_actors = self.g.nr_actors();
        let ning = mode.is_ning_gao();
        let periodic = self.current.clone();
        let mut matrix = DependencyMatrix::new(nr_actors);

        self.current.glb_clk = 0;
        // The output actor's pending completion still belongs to the last
        // iteration; the period ends one boundary later.
        let mut rep_cnt: i64 = -1;

        for a in (0..nr_actors).map(ActorId) {
            while self.actor_ready_to_end(a) {
                if a == self.output_actor {
                    rep_cnt += 1;
                    if rep_cnt == self.output_rep_cnt as i64 {
                        self.current.glb_clk = 0;
                        rep_cnt = 0;
                    }
                }
                self.end_actor_firing(a);
            }
        }

        loop {
            loop {
                let mut started = false;
                for a in (0..nr_actors).map(ActorId) {
                    while self.actor_ready_to_fire(a, mode) {
                        self.find_causal_dependencies(a, &mut matrix);
                        self.start_actor_firing(a, mode);
                        started = true;
                    }
                }
                if !ning || !started {
                    break;
                }
            }

            // The replayed cycle is live, so time always progresses here.
            let _ = self.clock_step();

            self.previous.ch.copy_from_slice(&self.current.ch);
            if ning {
                self.previous.sp.copy_from_slice(&self.current.sp);
            }

            for a in (0..nr_actors).map(ActorId) {
                while self.actor_ready_to_end(a) {
                    if a == self.output_actor {
                        rep_cnt += 1;
                        if rep_cnt == self.output_rep_cnt as i64 {
                            if self.current == periodic {
                                matrix.find_storage_dependencies(
                                    self.g,
                                    dep,
                                    mode.dependency_gate(),
                                );
                                return;
                            }
                            self.current.glb_clk = 0;
                            rep_cnt = 0;
                        }
                    }
                    self.end_actor_firing(a);
                }
            }
        }
    }

    /// At the deadlocked state, record which channels starve their consumer
    /// (and, in Ning-Gao mode, which saturate their producer), then mark the
    /// cycles.
    fn analyze_deadlock(&mut self, mode: &RunMode<'_>, dep: &mut [bool]) {
        let mut matrix = DependencyMatrix::new(self.g.nr_actors());

        for (id, ch) in self.g.channels() {
            let dst_schedulable = match self.binding {
                Some(b) => match b.binding_of_actor(ch.dst) {
                    Some(t) => {
                        let pos = self.current.schedule_pos[t.as_usize()];
                        b.schedule(t).entry(pos) == Some(ch.dst)
                    }
                    None => true,
                },
                None => true,
            };
            if dst_schedulable && self.current.ch[id.as_usize()] < ch.dst_rate {
                matrix.add(ch.dst, ch.src);
            }
            if mode.is_ning_gao() && self.current.sp[ch.src.as_usize()] < ch.src_rate {
                matrix.add(ch.src, ch.dst);
            }
        }

        matrix.find_storage_dependencies(self.g, dep, mode.dependency_gate());
    }
}

/// Shift per-actor start times so actors that lag a full period line up, and
/// rebase the earliest firing to time zero.
fn align_start_times(start_times: &mut [Ticks], iter_cnt: &[u64], throughput: Throughput) {
    let period = if throughput.is_zero() || throughput.iterations() == 0 {
        0
    } else {
        throughput.ticks() / throughput.iterations()
    };
    let max_iter = iter_cnt.iter().copied().max().unwrap_or(0);
    for (st, &cnt) in start_times.iter_mut().zip(iter_cnt) {
        *st += (max_iter - cnt) * period;
    }
    let min = start_times.iter().copied().min().unwrap_or(0);
    for st in start_times.iter_mut() {
        *st -= min;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Actor, TimedGraph};

    fn actor(g: &mut TimedGraph, name: &str, t: u64) -> ActorId {
        g.add_actor(Actor::with_execution(name, "proc", t))
    }

    fn run_self_timed(g: &TimedGraph) -> RunOutcome {
        let mut ts = TransitionSystem::new(g, None, ExecLimits::default()).unwrap();
        ts.execute(RunMode::SelfTimed, false).unwrap()
    }

    #[test]
    fn feedback_loop_recurs_with_expected_period() {
        let mut g = TimedGraph::new("loop");
        let a = actor(&mut g, "a", 1);
        let b = actor(&mut g, "b", 1);
        g.connect(a, 1, b, 1, 0).unwrap();
        g.connect(b, 1, a, 1, 1).unwrap();

        let outcome = run_self_timed(&g);
        assert_eq!(outcome.throughput, Throughput::from_cycle(1, 2));
    }

    #[test]
    fn multi_token_cycle_allows_overlap() {
        // Two tokens on the return channel let two firings of a overlap the
        // cycle; the period per iteration halves against the single-token
        // case with execution times (2, 2).
        let mut g = TimedGraph::new("loop2");
        let a = actor(&mut g, "a", 2);
        let b = actor(&mut g, "b", 2);
        g.connect(a, 1, b, 1, 0).unwrap();
        g.connect(b, 1, a, 1, 2).unwrap();

        let outcome = run_self_timed(&g);
        assert_eq!(outcome.throughput, Throughput::from_cycle(1, 2));
    }

    #[test]
    fn deadlock_analysis_marks_the_starved_cycle() {
        let mut g = TimedGraph::new("dead");
        let a = actor(&mut g, "a", 1);
        let b = actor(&mut g, "b", 1);
        g.connect(a, 1, b, 1, 0).unwrap();
        g.connect(b, 1, a, 1, 0).unwrap();

        let mut ts = TransitionSystem::new(&g, None, ExecLimits::default()).unwrap();
        let outcome = ts.execute(RunMode::SelfTimed, true).unwrap();
        assert!(outcome.throughput.is_zero());
        assert!(outcome.dep.iter().any(|&d| d));
    }

    #[test]
    fn distribution_run_honours_buffer_sizes() {
        // a -> b with the reverse channel modelling the storage of the
        // forward one: zero space deadlocks, one token of space does not.
        let mut g = TimedGraph::new("buf");
        let a = actor(&mut g, "a", 1);
        let b = actor(&mut g, "b", 1);
        let fwd = g.connect(a, 1, b, 1, 0).unwrap();
        g.connect_storage(b, 1, a, 1, 0, fwd).unwrap();

        let buffer_channels = vec![false, true];
        let mut ts = TransitionSystem::new(&g, None, ExecLimits::default()).unwrap();

        let starved = ts
            .execute(RunMode::Distribution { sp: &[0, 0], buffer_channels: &buffer_channels }, true)
            .unwrap();
        assert!(starved.throughput.is_zero());
        assert!(starved.dep[1]);

        let flowing = ts
            .execute(RunMode::Distribution { sp: &[0, 1], buffer_channels: &buffer_channels }, true)
            .unwrap();
        assert_eq!(flowing.throughput, Throughput::from_cycle(1, 2));
    }

    #[test]
    fn ning_gao_space_gates_firing() {
        // a -> b, one unit of output space on a: firings of a serialize on
        // b's consumption even though tokens would allow more.
        let mut g = TimedGraph::new("ng");
        let a = actor(&mut g, "a", 1);
        let b = actor(&mut g, "b", 1);
        g.connect(a, 1, b, 1, 0).unwrap();
        g.connect(b, 1, a, 1, 1).unwrap();

        let mut ts = TransitionSystem::new(&g, None, ExecLimits::default()).unwrap();
        let outcome = ts.execute(RunMode::NingGao { sp: &[1, 1] }, true).unwrap();
        assert_eq!(outcome.throughput, Throughput::from_cycle(1, 2));
        assert_eq!(outcome.start_times.len(), 2);
    }

    #[test]
    fn ning_gao_rejects_space_below_initial_tokens() {
        let mut g = TimedGraph::new("ng0");
        let a = actor(&mut g, "a", 1);
        let b = actor(&mut g, "b", 1);
        g.connect(a, 1, b, 1, 3).unwrap();

        let mut ts = TransitionSystem::new(&g, None, ExecLimits::default()).unwrap();
        let outcome = ts.execute(RunMode::NingGao { sp: &[2, 1] }, true).unwrap();
        assert!(outcome.throughput.is_zero());
        assert!(outcome.dep[0]);
    }
}
