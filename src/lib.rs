//! Crate root: public surface and analysis-wide invariants
//!
//! State-space analysis of timed synchronous dataflow graphs: maximal
//! self-timed throughput, Pareto-minimal storage allocations against a
//! throughput bound, and both questions for graphs bound to multi-tile
//! platforms with TDMA-arbitrated processors.
//!
//! ## Invariants
//!
//! - **Determinism.** The simulator takes every enabled transition before
//!   advancing time, scanning actors in ascending id order; two runs over
//!   the same graph and storage allocation produce identical throughput and
//!   dependency marks.
//! - **Exact throughput.** Throughput is carried as a reduced
//!   `iterations / ticks` fraction ([`Throughput`]); the explorer's pruning
//!   and its "maximal throughput reached" stop test compare exactly, and
//!   floating point appears only against caller-supplied bounds.
//! - **Monotone search.** Storage allocations are explored in increasing
//!   total size, enlarging only channels that showed a storage dependency,
//!   by steps of `gcd(production rate, consumption rate)`. Self-edges are
//!   never enlarged.
//! - **Deadlock is a value.** A run that cannot progress reports zero
//!   throughput with its dependency marks intact; errors are reserved for
//!   malformed inputs ([`AnalysisError`]) and fail fast at entry.
//!
//! The graph model is deliberately small ([`TimedGraph`]): dense ids, one
//! execution time per processor type, channels with fixed rates. Rendering,
//! file formats and platform description parsing live outside this crate.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

/// Binding-aware rewrite: fold a platform mapping into the graph.
pub mod binding;
mod dependencies;
/// Storage distributions, distribution sets and the trade-off lattice.
pub mod distribution;
/// Throughput / storage-space trade-off exploration.
pub mod explorer;
/// The timed SDF graph model consumed by every analysis.
pub mod graph;
/// Shared output-buffer sizing after Ning and Gao.
pub mod ning_gao;
/// Platform model: tiles, connections, mappings and schedules.
pub mod platform;
/// Repetition vectors and output-actor selection.
pub mod repetition;
mod state;
/// Throughput analyses and the exact throughput fraction.
pub mod throughput;
mod transition;

pub use binding::{BindingAwareGraph, BindingContext};
pub use distribution::{StorageDistribution, StorageDistributionSet};
pub use explorer::{analyze_binding_aware_buffer_tradeoff, analyze_buffer_tradeoff};
pub use graph::{
    Actor, ActorId, BufferSizes, Channel, ChannelId, GraphError, Ticks, TileId, TimedGraph, Tokens,
};
pub use ning_gao::{analyze_ning_gao, NingGaoResult};
pub use platform::{
    Connection, ConnectionId, FlowType, Mapping, MappingError, PlatformGraph, StaticOrderSchedule,
    Tile,
};
pub use repetition::{ConsistencyError, RepetitionVector};
pub use state::StateSpaceExhausted;
pub use throughput::{
    analyze_binding_aware_throughput, analyze_bound_graph, analyze_throughput, Throughput,
};

/// Any way an analysis call can fail. Simulator-level deadlock is *not* an
/// error; it surfaces as zero [`Throughput`].
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The graph itself is malformed (unknown ids, zero rates, missing
    /// execution times).
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// The balance equations have no positive solution.
    #[error(transparent)]
    InconsistentGraph(#[from] ConsistencyError),
    /// The platform mapping is contradictory or incomplete.
    #[error(transparent)]
    InvalidMapping(#[from] MappingError),
    /// A run outgrew the stored-state cap.
    #[error(transparent)]
    ResourceExhausted(#[from] StateSpaceExhausted),
}
