//! Platform collaborator model
//!
//! Tiles with TDMA-arbitrated processors, connections between tiles, and the
//! mapping of an application graph onto them: actor→tile and
//! channel→connection bindings plus one static-order schedule per tile. The
//! binding-aware rewrite validates a [`Mapping`] against a
//! [`PlatformGraph`] and folds both into an extended SDF graph.
//!
//! Validation is strict and fails fast: an actor bound to two tiles, a
//! channel bound to two connections, a connection whose endpoints do not
//! match the mapped tiles, or a memory too small for a channel's initial
//! tokens are all fatal before any analysis starts.

#![forbid(unsafe_code)]

use crate::graph::{ActorId, ChannelId, Ticks, TileId};

/// Dense connection id in the platform graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub usize);

impl ConnectionId {
    /// Access the underlying index.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0
    }
}

/// A tile: one processor with a TDMA wheel and a reserved slice.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Tile name.
    pub name: String,
    /// Processor type; actors must carry an execution time for it.
    pub processor_type: String,
    /// TDMA wheel size in ticks.
    pub wheel_size: Ticks,
    /// Slice of the wheel reserved for the application, in ticks.
    pub slice: Ticks,
}

/// A directed connection between two tiles.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Connection name.
    pub name: String,
    /// Source tile.
    pub src: TileId,
    /// Destination tile.
    pub dst: TileId,
    /// Fixed latency in ticks.
    pub latency: Ticks,
}

/// The multi-tile platform: tiles and the connections between them.
#[derive(Debug, Clone, Default)]
pub struct PlatformGraph {
    tiles: Vec<Tile>,
    connections: Vec<Connection>,
}

impl PlatformGraph {
    /// Create an empty platform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tile; its id is the current tile count.
    pub fn add_tile(&mut self, tile: Tile) -> TileId {
        self.tiles.push(tile);
        TileId(self.tiles.len() - 1)
    }

    /// Append a connection between existing tiles.
    pub fn add_connection(&mut self, connection: Connection) -> ConnectionId {
        self.connections.push(connection);
        ConnectionId(self.connections.len() - 1)
    }

    /// Number of tiles.
    #[inline]
    pub fn nr_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// Number of connections.
    #[inline]
    pub fn nr_connections(&self) -> usize {
        self.connections.len()
    }

    /// Tile by id.
    #[inline]
    pub fn tile(&self, t: TileId) -> &Tile {
        &self.tiles[t.as_usize()]
    }

    /// Connection by id.
    #[inline]
    pub fn connection(&self, c: ConnectionId) -> &Connection {
        &self.connections[c.as_usize()]
    }
}

/// A static-order schedule: a firing sequence with a loop-back position that
/// makes it effectively infinite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticOrderSchedule {
    entries: Vec<ActorId>,
    start_periodic: usize,
}

impl StaticOrderSchedule {
    /// A schedule that repeats `entries` from `start_periodic` once the end
    /// is reached.
    pub fn new(entries: Vec<ActorId>, start_periodic: usize) -> Self {
        Self { entries, start_periodic }
    }

    /// A fully periodic schedule (loops back to the first entry).
    pub fn periodic(entries: Vec<ActorId>) -> Self {
        Self::new(entries, 0)
    }

    /// True when the schedule has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Actor at `pos`, if in range.
    #[inline]
    pub fn entry(&self, pos: usize) -> Option<ActorId> {
        self.entries.get(pos).copied()
    }

    /// Position following `pos`, wrapping to the periodic part at the end.
    #[inline]
    pub fn next(&self, pos: usize) -> usize {
        if pos + 1 >= self.entries.len() {
            self.start_periodic
        } else {
            pos + 1
        }
    }

    /// Insert `actor` before `pos`, keeping the loop-back position on the
    /// same entry.
    pub fn insert(&mut self, pos: usize, actor: ActorId) {
        if self.start_periodic > pos {
            self.start_periodic += 1;
        }
        self.entries.insert(pos, actor);
    }

    /// Iterate the scheduled actors in order.
    pub fn iter(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.entries.iter().copied()
    }
}

/// Which design flow's communication model the binding-aware rewrite uses.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowType {
    /// Network-on-chip flow: connection-latency actor plus TDMA
    /// synchronisation on the destination tile.
    NSoC,
    /// Shared-bus flow: semaphore/credit/communication actors with an AMBA
    /// latency model and TDMA synchronisation on both tiles.
    MPFlow,
}

/// Errors raised while validating a mapping against platform and graph.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    /// An actor appears in two actor bindings.
    #[error("actor {} is bound to multiple tiles", .0.as_usize())]
    ActorBoundTwice(ActorId),
    /// A channel appears in two channel bindings.
    #[error("channel {} is bound to multiple connections", .0.as_usize())]
    ChannelBoundTwice(ChannelId),
    /// Every mapped actor must be bound to a tile.
    #[error("actor {} is not bound to any tile", .0.as_usize())]
    ActorNotBound(ActorId),
    /// An intra-tile channel must not be bound to a connection.
    #[error("channel {} connects actors on one tile but is bound to a connection", .0.as_usize())]
    ChannelBoundWithinTile(ChannelId),
    /// An inter-tile channel must be bound to a connection.
    #[error("channel {} crosses tiles but is not bound to a connection", .0.as_usize())]
    ChannelNotBound(ChannelId),
    /// The bound connection does not run between the mapped tiles.
    #[error("channel {} is bound to a connection with mismatching endpoints", .0.as_usize())]
    ConnectionMismatch(ChannelId),
    /// The memory (or source buffer) cannot hold the channel's initial
    /// tokens.
    #[error("insufficient storage for the initial tokens of channel {}", .0.as_usize())]
    InsufficientMemory(ChannelId),
    /// An actor is bound to a tile whose processor type it has no execution
    /// time for.
    #[error("actor {actor} has no execution time for processor type '{processor}'")]
    NoExecutionTime {
        /// The mapped actor's id.
        actor: usize,
        /// The tile's processor type.
        processor: String,
    },
    /// A tile with bound actors has no static-order schedule.
    #[error("tile {} has bound actors but no schedule", .0.as_usize())]
    MissingSchedule(TileId),
    /// A tile's reserved slice is zero or exceeds its wheel.
    #[error("tile {} has an invalid TDMA slice", .0.as_usize())]
    InvalidSlice(TileId),
    /// A binding references an id outside the graph or platform.
    #[error("mapping references an unknown id")]
    UnknownId,
}

/// The binding of an application graph onto a platform.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    pub(crate) actor_bindings: Vec<(ActorId, TileId)>,
    pub(crate) channel_bindings: Vec<(ChannelId, ConnectionId)>,
    pub(crate) schedules: Vec<(TileId, StaticOrderSchedule)>,
}

impl Mapping {
    /// An empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an actor to a tile.
    pub fn bind_actor(&mut self, actor: ActorId, tile: TileId) -> &mut Self {
        self.actor_bindings.push((actor, tile));
        self
    }

    /// Bind a channel to a connection.
    pub fn bind_channel(&mut self, channel: ChannelId, connection: ConnectionId) -> &mut Self {
        self.channel_bindings.push((channel, connection));
        self
    }

    /// Set the static-order schedule of a tile.
    pub fn set_schedule(&mut self, tile: TileId, schedule: StaticOrderSchedule) -> &mut Self {
        self.schedules.push((tile, schedule));
        self
    }
}
