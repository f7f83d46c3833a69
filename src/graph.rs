//! Timed SDF graph model
//!
//! The record types the analyses consume: actors with per-processor execution
//! times, channels with fixed port rates and initial tokens, and the graph
//! container with stable dense ids. Channels may additionally *model storage
//! space* of another channel (a back-reference set by the binding-aware
//! rewrite and the capacity model), and carry the buffer/connection
//! attributes the rewrite reads.
//!
//! The graph is read-only during analysis; every engine run borrows it
//! immutably. Ids are dense (`0..n`) so per-actor and per-channel state can
//! live in plain vectors.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::Serialize;

/// Execution time in clock ticks.
pub type Ticks = u64;

/// A token (or storage-space) count.
pub type Tokens = u64;

/// Dense actor id `a ∈ {0..nr_actors-1}`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ActorId(pub usize);

impl ActorId {
    /// Access the underlying index.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0
    }
}

/// Dense channel id `c ∈ {0..nr_channels-1}`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ChannelId(pub usize);

impl ChannelId {
    /// Access the underlying index.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0
    }
}

/// Dense tile id `t ∈ {0..nr_tiles-1}` in the platform graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TileId(pub usize);

impl TileId {
    /// Access the underlying index.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0
    }
}

/// Errors raised while building or validating a graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A channel endpoint names an actor id outside the graph.
    #[error("channel endpoint references unknown actor {0}")]
    UnknownActor(usize),
    /// Port rates must be positive; a zero rate makes the balance equations
    /// degenerate.
    #[error("channel '{0}' has a zero port rate")]
    ZeroRate(String),
    /// The graph has no actors.
    #[error("graph contains no actors")]
    Empty,
    /// An actor has no execution time on its selected processor.
    #[error("actor '{0}' has no execution time on a default processor")]
    MissingExecutionTime(String),
}

/// An actor with one execution time per processor type it can run on.
#[derive(Debug, Clone)]
pub struct Actor {
    /// Actor name, used in diagnostics and by the rewrite to derive names of
    /// inserted actors.
    pub name: String,
    execution: BTreeMap<String, Ticks>,
    default_processor: Option<String>,
}

impl Actor {
    /// Create an actor with no execution times yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), execution: BTreeMap::new(), default_processor: None }
    }

    /// Create an actor with a single processor entry which is also the
    /// default.
    pub fn with_execution(
        name: impl Into<String>,
        processor: impl Into<String>,
        time: Ticks,
    ) -> Self {
        let processor = processor.into();
        let mut a = Self::new(name);
        a.execution.insert(processor.clone(), time);
        a.default_processor = Some(processor);
        a
    }

    /// Add or replace the execution time on a processor type.
    pub fn set_execution(&mut self, processor: impl Into<String>, time: Ticks) {
        self.execution.insert(processor.into(), time);
    }

    /// Select the processor whose execution time [`Actor::execution_time`]
    /// reports.
    pub fn set_default_processor(&mut self, processor: impl Into<String>) {
        self.default_processor = Some(processor.into());
    }

    /// Execution time on a named processor type, if known.
    pub fn execution_time_on(&self, processor: &str) -> Option<Ticks> {
        self.execution.get(processor).copied()
    }

    /// Execution time on the default processor. Falls back to the sole entry
    /// when no default was selected and exactly one entry exists.
    pub fn execution_time(&self) -> Option<Ticks> {
        match &self.default_processor {
            Some(p) => self.execution.get(p).copied(),
            None if self.execution.len() == 1 => self.execution.values().next().copied(),
            None => None,
        }
    }
}

/// Storage-space annotation of a channel: total, source-side, destination-side
/// and in-memory token counts. Consumed by the binding-aware rewrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferSizes {
    /// Total storage bound.
    pub sz: Tokens,
    /// Source-side (network-interface) buffer.
    pub src: Tokens,
    /// Destination-side buffer.
    pub dst: Tokens,
    /// Memory buffer for intra-tile channels.
    pub mem: Tokens,
}

/// A channel between two actor ports with fixed rates.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Channel name.
    pub name: String,
    /// Producing actor.
    pub src: ActorId,
    /// Tokens produced per firing of `src`.
    pub src_rate: Tokens,
    /// Consuming actor.
    pub dst: ActorId,
    /// Tokens consumed per firing of `dst`.
    pub dst_rate: Tokens,
    /// Tokens present before the first firing.
    pub initial_tokens: Tokens,
    /// When set, this channel models the storage space of the referenced
    /// channel instead of carrying application data.
    pub represents: Option<ChannelId>,
    /// Storage annotation read by the binding-aware rewrite.
    pub buffer_size: BufferSizes,
    /// Token size in bits (connection-latency model input).
    pub token_size: u64,
    /// Minimal bandwidth in bits per tick on the bound connection.
    pub min_bandwidth: f64,
    /// Minimal latency between production and consumption.
    pub min_latency: Ticks,
}

impl Channel {
    /// True when source and destination are the same actor.
    #[inline]
    pub fn is_self_edge(&self) -> bool {
        self.src == self.dst
    }

    /// True when this channel models the storage space of another channel.
    #[inline]
    pub fn models_storage_space(&self) -> bool {
        self.represents.is_some()
    }
}

/// A timed SDF graph: actors and channels with stable dense ids.
#[derive(Debug, Clone, Default)]
pub struct TimedGraph {
    /// Graph name.
    pub name: String,
    actors: Vec<Actor>,
    channels: Vec<Channel>,
}

impl TimedGraph {
    /// Create an empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), actors: Vec::new(), channels: Vec::new() }
    }

    /// Append an actor; its id is the current actor count.
    pub fn add_actor(&mut self, actor: Actor) -> ActorId {
        self.actors.push(actor);
        ActorId(self.actors.len() - 1)
    }

    /// Append a fully specified channel after validating its endpoints and
    /// rates.
    pub fn add_channel(&mut self, channel: Channel) -> Result<ChannelId, GraphError> {
        for endpoint in [channel.src, channel.dst] {
            if endpoint.as_usize() >= self.actors.len() {
                return Err(GraphError::UnknownActor(endpoint.as_usize()));
            }
        }
        if channel.src_rate == 0 || channel.dst_rate == 0 {
            return Err(GraphError::ZeroRate(channel.name.clone()));
        }
        self.channels.push(channel);
        Ok(ChannelId(self.channels.len() - 1))
    }

    /// Convenience constructor for a plain data channel.
    pub fn connect(
        &mut self,
        src: ActorId,
        src_rate: Tokens,
        dst: ActorId,
        dst_rate: Tokens,
        initial_tokens: Tokens,
    ) -> Result<ChannelId, GraphError> {
        let name = format!("ch{}", self.channels.len());
        self.add_channel(Channel {
            name,
            src,
            src_rate,
            dst,
            dst_rate,
            initial_tokens,
            represents: None,
            buffer_size: BufferSizes::default(),
            token_size: 0,
            min_bandwidth: 0.0,
            min_latency: 0,
        })
    }

    /// Convenience constructor for a channel that models the storage space
    /// of `represents`.
    pub fn connect_storage(
        &mut self,
        src: ActorId,
        src_rate: Tokens,
        dst: ActorId,
        dst_rate: Tokens,
        initial_tokens: Tokens,
        represents: ChannelId,
    ) -> Result<ChannelId, GraphError> {
        let name = format!("{}_space", self.channels[represents.as_usize()].name);
        self.add_channel(Channel {
            name,
            src,
            src_rate,
            dst,
            dst_rate,
            initial_tokens,
            represents: Some(represents),
            buffer_size: BufferSizes::default(),
            token_size: 0,
            min_bandwidth: 0.0,
            min_latency: 0,
        })
    }

    /// Number of actors.
    #[inline]
    pub fn nr_actors(&self) -> usize {
        self.actors.len()
    }

    /// Number of channels.
    #[inline]
    pub fn nr_channels(&self) -> usize {
        self.channels.len()
    }

    /// Actor by id.
    #[inline]
    pub fn actor(&self, a: ActorId) -> &Actor {
        &self.actors[a.as_usize()]
    }

    /// Mutable actor by id (used by the rewrite only).
    #[inline]
    pub(crate) fn actor_mut(&mut self, a: ActorId) -> &mut Actor {
        &mut self.actors[a.as_usize()]
    }

    /// Channel by id.
    #[inline]
    pub fn channel(&self, c: ChannelId) -> &Channel {
        &self.channels[c.as_usize()]
    }

    /// Iterate actors in id order.
    pub fn actors(&self) -> impl Iterator<Item = (ActorId, &Actor)> {
        self.actors.iter().enumerate().map(|(i, a)| (ActorId(i), a))
    }

    /// Iterate channels in id order.
    pub fn channels(&self) -> impl Iterator<Item = (ChannelId, &Channel)> {
        self.channels.iter().enumerate().map(|(i, c)| (ChannelId(i), c))
    }

    /// Channels consumed by actor `a`, in id order. A self-edge appears in
    /// both the input and output list of its actor.
    pub fn input_channels(&self, a: ActorId) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels().filter(move |(_, c)| c.dst == a).map(|(id, _)| id)
    }

    /// Channels produced by actor `a`, in id order.
    pub fn output_channels(&self, a: ActorId) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels().filter(move |(_, c)| c.src == a).map(|(id, _)| id)
    }

    /// True when every actor reaches every other over the channels. The
    /// self-timed state space is finite exactly for such graphs: every
    /// channel then lies on a cycle whose token count bounds it.
    pub fn is_strongly_connected(&self) -> bool {
        if self.actors.is_empty() {
            return true;
        }
        let forward = self.reachable_from(0, false);
        let backward = self.reachable_from(0, true);
        forward.iter().zip(&backward).all(|(&f, &b)| f && b)
    }

    fn reachable_from(&self, root: usize, reversed: bool) -> Vec<bool> {
        let mut seen = vec![false; self.actors.len()];
        let mut stack = vec![root];
        seen[root] = true;
        while let Some(a) = stack.pop() {
            for ch in &self.channels {
                let (from, to) =
                    if reversed { (ch.dst, ch.src) } else { (ch.src, ch.dst) };
                if from.as_usize() == a && !seen[to.as_usize()] {
                    seen[to.as_usize()] = true;
                    stack.push(to.as_usize());
                }
            }
        }
        seen
    }

    /// Check the graph is analysable: non-empty and every actor has a
    /// resolvable execution time.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.actors.is_empty() {
            return Err(GraphError::Empty);
        }
        for actor in &self.actors {
            if actor.execution_time().is_none() {
                return Err(GraphError::MissingExecutionTime(actor.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_validation_rejects_bad_endpoints_and_rates() {
        let mut g = TimedGraph::new("t");
        let a = g.add_actor(Actor::with_execution("a", "proc", 1));
        assert!(matches!(
            g.connect(a, 1, ActorId(7), 1, 0),
            Err(GraphError::UnknownActor(7))
        ));
        assert!(matches!(g.connect(a, 0, a, 1, 0), Err(GraphError::ZeroRate(_))));
    }

    #[test]
    fn adjacency_lists_follow_channel_ids() {
        let mut g = TimedGraph::new("t");
        let a = g.add_actor(Actor::with_execution("a", "proc", 1));
        let b = g.add_actor(Actor::with_execution("b", "proc", 1));
        let c0 = g.connect(a, 2, b, 3, 0).unwrap();
        let c1 = g.connect(b, 1, a, 1, 1).unwrap();
        let c2 = g.connect(a, 1, a, 1, 1).unwrap();

        let outs: Vec<_> = g.output_channels(a).collect();
        let ins: Vec<_> = g.input_channels(a).collect();
        assert_eq!(outs, vec![c0, c2]);
        assert_eq!(ins, vec![c1, c2]);
        assert!(g.channel(c2).is_self_edge());
        assert!(!g.channel(c0).is_self_edge());
    }

    #[test]
    fn strong_connectivity() {
        let mut g = TimedGraph::new("t");
        let a = g.add_actor(Actor::with_execution("a", "proc", 1));
        let b = g.add_actor(Actor::with_execution("b", "proc", 1));
        g.connect(a, 1, b, 1, 0).unwrap();
        assert!(!g.is_strongly_connected());
        g.connect(b, 1, a, 1, 1).unwrap();
        assert!(g.is_strongly_connected());
    }

    #[test]
    fn execution_time_resolution() {
        let mut a = Actor::new("a");
        assert_eq!(a.execution_time(), None);
        a.set_execution("arm", 5);
        assert_eq!(a.execution_time(), Some(5));
        a.set_execution("dsp", 3);
        assert_eq!(a.execution_time(), None);
        a.set_default_processor("dsp");
        assert_eq!(a.execution_time(), Some(3));
        assert_eq!(a.execution_time_on("arm"), Some(5));
    }
}
