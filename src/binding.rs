//! Binding-aware rewrite
//!
//! Folds a platform binding back into the application graph so the plain
//! transition system answers the bound-throughput question. Every mapped
//! actor gains a one-token self-loop (a processor runs one firing at a time)
//! and takes its worst-case response time on the bound processor as
//! execution time. Channel storage and communication become structure:
//!
//! * an intra-tile channel gains a reverse channel whose tokens are the free
//!   memory left after the initial tokens are stored;
//! * an NSoC inter-tile channel grows a pipeline: source buffer, a
//!   connection-latency actor serialised by its own self-loop, TDMA
//!   synchronisation on the destination wheel when the slice does not cover
//!   it, a pre-filled destination buffer, and optionally a minimum-latency
//!   actor;
//! * an MPFlow inter-tile channel becomes the six-actor shared-bus
//!   construct: semaphore, credit and communication latency (AMBA model),
//!   TDMA synchronisation on both wheels, and a credit channel returning
//!   `src buffer − initial tokens` of back-pressure. The destination tile's
//!   schedule is extended with the communication actor directly before each
//!   firing of the destination actor so slot accounting stays tight.
//!
//! The original channels stay in place: they carry the data dependencies,
//! while the inserted structure carries storage and latency.

#![forbid(unsafe_code)]

use tracing::debug;

use crate::graph::{ActorId, ChannelId, Ticks, TileId, TimedGraph};
use crate::platform::{
    ConnectionId, FlowType, Mapping, MappingError, PlatformGraph, StaticOrderSchedule,
};

/// Latency of a semaphore update over the AMBA bus, in ticks.
const AMBA_SEMAPHORE_LATENCY: Ticks = 11;

/// Time to move a token of `token_size` bits over the AMBA bus: the size is
/// rounded up to 32-bit words, the latency is piecewise linear in it.
fn amba_bus_latency(token_size: u64) -> Ticks {
    let bits = if token_size % 32 != 0 { token_size + 32 - token_size % 32 } else { token_size };
    if bits < 1024 {
        (0.34144 * bits as f64 + 110.592).ceil() as Ticks
    } else {
        (0.36660 * bits as f64 + 90.806).ceil() as Ticks
    }
}

/// The extracted binding the transition system consults during a run.
#[derive(Debug, Clone)]
pub struct BindingContext {
    actor_binding: Vec<Option<TileId>>,
    schedules: Vec<StaticOrderSchedule>,
    tdma_size: Vec<Ticks>,
    tdma_slice: Vec<Ticks>,
}

impl BindingContext {
    /// Number of tiles in the platform.
    #[inline]
    pub fn nr_tiles(&self) -> usize {
        self.tdma_size.len()
    }

    /// Tile an actor is bound to, if any. Actors inserted by the rewrite
    /// are mostly unbound and fire free of schedule and TDMA constraints.
    #[inline]
    pub fn binding_of_actor(&self, a: ActorId) -> Option<TileId> {
        self.actor_binding.get(a.as_usize()).copied().flatten()
    }

    /// Static-order schedule of a tile.
    #[inline]
    pub fn schedule(&self, t: TileId) -> &StaticOrderSchedule {
        &self.schedules[t.as_usize()]
    }

    /// TDMA wheel size of a tile.
    #[inline]
    pub fn tdma_size(&self, t: TileId) -> Ticks {
        self.tdma_size[t.as_usize()]
    }

    /// Reserved TDMA slice of a tile.
    #[inline]
    pub fn tdma_slice(&self, t: TileId) -> Ticks {
        self.tdma_slice[t.as_usize()]
    }

    /// Every bound actor must live on a tile with a schedule.
    pub fn check_bound_actors_scheduled(&self, g: &TimedGraph) -> Result<(), MappingError> {
        for (a, _) in g.actors() {
            if let Some(t) = self.binding_of_actor(a) {
                if self.schedules[t.as_usize()].is_empty() {
                    return Err(MappingError::MissingSchedule(t));
                }
            }
        }
        Ok(())
    }
}

/// An application graph with its platform binding folded in.
#[derive(Debug, Clone)]
pub struct BindingAwareGraph {
    /// The rewritten graph the transition system executes.
    pub graph: TimedGraph,
    binding: BindingContext,
}

impl BindingAwareGraph {
    /// The extracted binding.
    #[inline]
    pub fn binding(&self) -> &BindingContext {
        &self.binding
    }

    /// Number of platform tiles.
    #[inline]
    pub fn nr_tiles(&self) -> usize {
        self.binding.nr_tiles()
    }

    /// Tile an actor of the rewritten graph is bound to.
    #[inline]
    pub fn binding_of_actor(&self, a: ActorId) -> Option<TileId> {
        self.binding.binding_of_actor(a)
    }

    /// Validate the mapping and build the binding-aware graph.
    pub fn build(
        g: &TimedGraph,
        platform: &PlatformGraph,
        mapping: &Mapping,
        flow: FlowType,
    ) -> Result<Self, MappingError> {
        let (actor_binding, channel_binding, binding) = extract(g, platform, mapping)?;
        let mut builder = Builder {
            graph: g.clone(),
            binding,
            platform,
            actor_binding,
            channel_binding,
        };

        builder.rewrite_actors()?;
        builder.rewrite_channels(flow)?;

        let bag = BindingAwareGraph {
            binding: BindingContext {
                actor_binding: builder.actor_binding,
                ..builder.binding
            },
            graph: builder.graph,
        };
        bag.binding.check_bound_actors_scheduled(&bag.graph)?;
        debug!(
            actors = bag.graph.nr_actors(),
            channels = bag.graph.nr_channels(),
            "binding-aware graph constructed"
        );
        Ok(bag)
    }
}

/// Pull the mapping into dense per-id vectors, rejecting double bindings and
/// unknown ids.
fn extract(
    g: &TimedGraph,
    platform: &PlatformGraph,
    mapping: &Mapping,
) -> Result<(Vec<Option<TileId>>, Vec<Option<ConnectionId>>, BindingContext), MappingError> {
    let nr_tiles = platform.nr_tiles();

    let mut actor_binding: Vec<Option<TileId>> = vec![None; g.nr_actors()];
    for &(a, t) in &mapping.actor_bindings {
        if a.as_usize() >= g.nr_actors() || t.as_usize() >= nr_tiles {
            return Err(MappingError::UnknownId);
        }
        if actor_binding[a.as_usize()].is_some() {
            return Err(MappingError::ActorBoundTwice(a));
        }
        actor_binding[a.as_usize()] = Some(t);
    }

    let mut channel_binding: Vec<Option<ConnectionId>> = vec![None; g.nr_channels()];
    for &(c, conn) in &mapping.channel_bindings {
        if c.as_usize() >= g.nr_channels() || conn.as_usize() >= platform.nr_connections() {
            return Err(MappingError::UnknownId);
        }
        if channel_binding[c.as_usize()].is_some() {
            return Err(MappingError::ChannelBoundTwice(c));
        }
        channel_binding[c.as_usize()] = Some(conn);
    }

    let mut schedules = vec![StaticOrderSchedule::default(); nr_tiles];
    for (t, schedule) in &mapping.schedules {
        if t.as_usize() >= nr_tiles {
            return Err(MappingError::UnknownId);
        }
        schedules[t.as_usize()] = schedule.clone();
    }

    let mut tdma_size = Vec::with_capacity(nr_tiles);
    let mut tdma_slice = Vec::with_capacity(nr_tiles);
    for t in 0..nr_tiles {
        let tile = platform.tile(TileId(t));
        tdma_size.push(tile.wheel_size);
        tdma_slice.push(tile.slice);
    }

    // A bound actor will divide by the slice and subtract it from the wheel.
    for (t, slice) in tdma_slice.iter().enumerate() {
        let used = actor_binding.iter().flatten().any(|b| b.as_usize() == t);
        if used && (*slice == 0 || *slice > tdma_size[t]) {
            return Err(MappingError::InvalidSlice(TileId(t)));
        }
    }

    let binding = BindingContext {
        actor_binding: Vec::new(),
        schedules,
        tdma_size,
        tdma_slice,
    };
    Ok((actor_binding, channel_binding, binding))
}

struct Builder<'p> {
    graph: TimedGraph,
    binding: BindingContext,
    platform: &'p PlatformGraph,
    actor_binding: Vec<Option<TileId>>,
    channel_binding: Vec<Option<ConnectionId>>,
}

impl Builder<'_> {
    /// Give every mapped actor its worst-case response time and a one-token
    /// self-loop serialising its firings.
    fn rewrite_actors(&mut self) -> Result<(), MappingError> {
        for a in 0..self.actor_binding.len() {
            let actor = ActorId(a);
            let tile = self.actor_binding[a].ok_or(MappingError::ActorNotBound(actor))?;
            let processor = &self.platform.tile(tile).processor_type;
            let wcrt = self
                .graph
                .actor(actor)
                .execution_time_on(processor)
                .ok_or_else(|| MappingError::NoExecutionTime {
                    actor: a,
                    processor: processor.clone(),
                })?;
            {
                let actor = self.graph.actor_mut(actor);
                actor.set_execution("wcrt", wcrt);
                actor.set_default_processor("wcrt");
            }
            self.connect(actor, 1, actor, 1, 1);
        }
        Ok(())
    }

    fn rewrite_channels(&mut self, flow: FlowType) -> Result<(), MappingError> {
        for c in 0..self.channel_binding.len() {
            let channel = ChannelId(c);
            let ch = self.graph.channel(channel).clone();
            if ch.is_self_edge() {
                continue;
            }
            let src_tile = self.actor_binding[ch.src.as_usize()]
                .ok_or(MappingError::ActorNotBound(ch.src))?;
            let dst_tile = self.actor_binding[ch.dst.as_usize()]
                .ok_or(MappingError::ActorNotBound(ch.dst))?;

            if src_tile == dst_tile {
                if self.channel_binding[c].is_some() {
                    return Err(MappingError::ChannelBoundWithinTile(channel));
                }
                self.model_intra_tile_channel(channel)?;
            } else {
                let conn = self.channel_binding[c].ok_or(MappingError::ChannelNotBound(channel))?;
                let connection = self.platform.connection(conn).clone();
                if connection.src != src_tile || connection.dst != dst_tile {
                    return Err(MappingError::ConnectionMismatch(channel));
                }
                match flow {
                    FlowType::NSoC => {
                        self.model_connection_nsoc(channel, connection.latency, dst_tile)?
                    }
                    FlowType::MPFlow => {
                        self.model_connection_mpflow(channel, src_tile, dst_tile)?
                    }
                }
            }
        }
        Ok(())
    }

    /// Memory space of an intra-tile channel: a reverse channel whose tokens
    /// are the free space left once the initial tokens are stored.
    fn model_intra_tile_channel(&mut self, c: ChannelId) -> Result<(), MappingError> {
        let ch = self.graph.channel(c).clone();
        if ch.buffer_size.mem < ch.initial_tokens {
            return Err(MappingError::InsufficientMemory(c));
        }
        self.graph
            .connect_storage(
                ch.dst,
                ch.dst_rate,
                ch.src,
                ch.src_rate,
                ch.buffer_size.mem - ch.initial_tokens,
                c,
            )
            .map_err(|_| MappingError::UnknownId)?;
        Ok(())
    }

    fn model_connection_nsoc(
        &mut self,
        c: ChannelId,
        connection_latency: Ticks,
        dst_tile: TileId,
    ) -> Result<(), MappingError> {
        let ch = self.graph.channel(c).clone();
        let dst_proc = self.platform.tile(dst_tile);

        // The connection itself: latency plus the transfer time of one token
        // at the connection's minimal bandwidth; one token in flight at a
        // time.
        let transfer = if ch.min_bandwidth > 0.0 {
            (ch.token_size as f64 / ch.min_bandwidth).ceil() as Ticks
        } else {
            0
        };
        let conn_actor = self
            .add_latency_actor(format!("{}_connection", ch.name), connection_latency + transfer);
        self.connect(conn_actor, 1, conn_actor, 1, 1);

        // Source buffer: space freed towards the producer once the
        // connection has taken a token set.
        if ch.buffer_size.src < ch.initial_tokens {
            return Err(MappingError::InsufficientMemory(c));
        }
        self.connect_storage(
            conn_actor,
            1,
            ch.src,
            ch.src_rate,
            ch.buffer_size.src - ch.initial_tokens,
            c,
        );

        // Destination buffer, pre-filled with its full capacity.
        self.connect_storage(ch.dst, ch.dst_rate, conn_actor, 1, ch.buffer_size.dst, c);

        // Data entering the connection.
        self.connect(ch.src, ch.src_rate, conn_actor, 1, ch.initial_tokens);

        // Synchronisation with the destination TDMA wheel, when the slice
        // does not cover it.
        if dst_proc.wheel_size > dst_proc.slice {
            let tdma_actor = self.add_latency_actor(
                format!("{}_tdma", ch.name),
                dst_proc.wheel_size - dst_proc.slice,
            );
            self.connect(conn_actor, 1, tdma_actor, 1, 0);
            self.connect(tdma_actor, 1, ch.dst, ch.dst_rate, 0);
        } else {
            self.connect(conn_actor, 1, ch.dst, ch.dst_rate, 0);
        }

        // A minimal production-to-consumption latency runs in parallel with
        // the buffered path.
        if ch.min_latency > 0 {
            let latency_actor =
                self.add_latency_actor(format!("{}_latency", ch.name), ch.min_latency);
            self.connect(ch.src, ch.src_rate, latency_actor, 1, ch.initial_tokens);
            self.connect(latency_actor, 1, ch.dst, ch.dst_rate, 0);
        }
        Ok(())
    }

    fn model_connection_mpflow(
        &mut self,
        c: ChannelId,
        src_tile: TileId,
        dst_tile: TileId,
    ) -> Result<(), MappingError> {
        let ch = self.graph.channel(c).clone();
        let src_proc = self.platform.tile(src_tile);
        let dst_proc = self.platform.tile(dst_tile);

        if ch.buffer_size.src < ch.initial_tokens {
            return Err(MappingError::InsufficientMemory(c));
        }

        let semaphore =
            self.add_latency_actor(format!("{}_semaphore", ch.name), AMBA_SEMAPHORE_LATENCY);
        let credit = self.add_latency_actor(format!("{}_credit", ch.name), AMBA_SEMAPHORE_LATENCY);
        let communication = self.add_latency_actor(
            format!("{}_communication", ch.name),
            amba_bus_latency(ch.token_size),
        );
        let tdma_src = self.add_latency_actor(
            format!("{}_tdma_sync_src", ch.name),
            src_proc.wheel_size - src_proc.slice,
        );
        let tdma_dst = self.add_latency_actor(
            format!("{}_tdma_sync_dst", ch.name),
            dst_proc.wheel_size - dst_proc.slice,
        );

        self.connect(ch.src, ch.src_rate, semaphore, 1, ch.initial_tokens);
        self.connect(semaphore, 1, tdma_dst, 1, 0);
        self.connect(tdma_dst, 1, communication, ch.dst_rate, 0);
        self.connect(communication, ch.dst_rate, ch.dst, ch.dst_rate, 0);
        self.connect(ch.dst, ch.dst_rate, communication, ch.dst_rate, ch.dst_rate);
        self.connect(communication, ch.dst_rate, credit, 1, 0);
        self.connect(credit, 1, tdma_src, 1, 0);
        self.connect(tdma_src, 1, ch.src, ch.src_rate, ch.buffer_size.src - ch.initial_tokens);

        // The bus transfer occupies the destination processor: bind it there
        // and schedule it directly before each firing of the destination
        // actor.
        self.actor_binding.resize(self.graph.nr_actors(), None);
        self.actor_binding[communication.as_usize()] = Some(dst_tile);

        let schedule = &mut self.binding.schedules[dst_tile.as_usize()];
        let mut pos = 0;
        while pos < schedule.len() {
            if schedule.entry(pos) == Some(ch.dst) {
                schedule.insert(pos, communication);
                pos += 1;
            }
            pos += 1;
        }
        Ok(())
    }

    fn add_latency_actor(&mut self, name: String, exec_time: Ticks) -> ActorId {
        let actor = crate::graph::Actor::with_execution(name, "latency", exec_time);
        self.graph.add_actor(actor)
    }

    /// Channel creation on the rewritten graph cannot fail: endpoints exist
    /// and every rate is positive.
    fn connect(&mut self, src: ActorId, p: u64, dst: ActorId, cr: u64, tokens: u64) -> ChannelId {
        self.graph
            .connect(src, p, dst, cr, tokens)
            .expect("rewrite uses valid endpoints and rates")
    }

    fn connect_storage(
        &mut self,
        src: ActorId,
        p: u64,
        dst: ActorId,
        cr: u64,
        tokens: u64,
        represents: ChannelId,
    ) -> ChannelId {
        self.graph
            .connect_storage(src, p, dst, cr, tokens, represents)
            .expect("rewrite uses valid endpoints and rates")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Actor, BufferSizes, Channel, TimedGraph};
    use crate::platform::{Connection, Tile};

    fn two_tile_setup() -> (TimedGraph, PlatformGraph, Mapping, ChannelId) {
        let mut g = TimedGraph::new("app");
        let a = g.add_actor(Actor::with_execution("a", "arm", 2));
        let b = g.add_actor(Actor::with_execution("b", "arm", 1));
        let c = g
            .add_channel(Channel {
                name: "ab".into(),
                src: a,
                src_rate: 1,
                dst: b,
                dst_rate: 1,
                initial_tokens: 0,
                represents: None,
                buffer_size: BufferSizes { sz: 4, src: 2, dst: 2, mem: 0 },
                token_size: 8,
                min_bandwidth: 2.0,
                min_latency: 0,
            })
            .unwrap();

        let mut platform = PlatformGraph::new();
        let t0 = platform.add_tile(Tile {
            name: "tile0".into(),
            processor_type: "arm".into(),
            wheel_size: 4,
            slice: 1,
        });
        let t1 = platform.add_tile(Tile {
            name: "tile1".into(),
            processor_type: "arm".into(),
            wheel_size: 4,
            slice: 1,
        });
        let conn = platform.add_connection(Connection {
            name: "c0".into(),
            src: t0,
            dst: t1,
            latency: 1,
        });

        let mut mapping = Mapping::new();
        mapping
            .bind_actor(a, t0)
            .bind_actor(b, t1)
            .bind_channel(c, conn)
            .set_schedule(t0, StaticOrderSchedule::periodic(vec![a]))
            .set_schedule(t1, StaticOrderSchedule::periodic(vec![b]));

        (g, platform, mapping, c)
    }

    #[test]
    fn nsoc_rewrite_inserts_latency_and_tdma_actors() {
        let (g, platform, mapping, _) = two_tile_setup();
        let bag = BindingAwareGraph::build(&g, &platform, &mapping, FlowType::NSoC).unwrap();

        // a, b, connection actor, tdma actor.
        assert_eq!(bag.graph.nr_actors(), 4);
        // Original channel, two self-loops, connection self-loop, source and
        // destination buffers, data feed, and the two tdma hops.
        assert_eq!(bag.graph.nr_channels(), 9);

        let conn_actor = bag
            .graph
            .actors()
            .find(|(_, a)| a.name == "ab_connection")
            .map(|(id, a)| (id, a.execution_time().unwrap()))
            .unwrap();
        // Connection latency 1 plus ceil(8 bits / 2 bits per tick).
        assert_eq!(conn_actor.1, 5);

        let tdma_actor = bag
            .graph
            .actors()
            .find(|(_, a)| a.name == "ab_tdma")
            .map(|(_, a)| a.execution_time().unwrap())
            .unwrap();
        assert_eq!(tdma_actor, 3);

        // Inserted actors are not bound to any tile in the NSoC flow.
        assert_eq!(bag.binding_of_actor(conn_actor.0), None);

        // Storage channels point back at the rewritten channel.
        let storage: Vec<_> = bag
            .graph
            .channels()
            .filter(|(_, ch)| ch.models_storage_space())
            .collect();
        assert_eq!(storage.len(), 2);
        assert!(storage.iter().all(|(_, ch)| ch.represents == Some(ChannelId(0))));
        // Source buffer starts at its free space, destination at capacity.
        let initials: Vec<u64> = storage.iter().map(|(_, ch)| ch.initial_tokens).collect();
        assert_eq!(initials, vec![2, 2]);
    }

    #[test]
    fn mpflow_rewrite_builds_the_bus_construct_and_extends_the_schedule() {
        let (g, platform, mapping, _) = two_tile_setup();
        let bag = BindingAwareGraph::build(&g, &platform, &mapping, FlowType::MPFlow).unwrap();

        assert_eq!(bag.graph.nr_actors(), 7);
        assert_eq!(bag.graph.nr_channels(), 11);

        let comm = bag
            .graph
            .actors()
            .find(|(_, a)| a.name == "ab_communication")
            .map(|(id, a)| (id, a.execution_time().unwrap()))
            .unwrap();
        // 8 bits round up to one 32-bit word: ceil(0.34144·32 + 110.592).
        assert_eq!(comm.1, 122);
        assert_eq!(bag.binding_of_actor(comm.0), Some(TileId(1)));

        let semaphore = bag
            .graph
            .actors()
            .find(|(_, a)| a.name == "ab_semaphore")
            .map(|(_, a)| a.execution_time().unwrap())
            .unwrap();
        assert_eq!(semaphore, AMBA_SEMAPHORE_LATENCY);

        // The communication actor fires directly before b on tile 1.
        let schedule = bag.binding().schedule(TileId(1));
        let order: Vec<_> = schedule.iter().collect();
        assert_eq!(order, vec![comm.0, ActorId(1)]);
    }

    #[test]
    fn mapping_validation_rejects_double_and_mismatched_bindings() {
        let (g, platform, mut mapping, c) = two_tile_setup();
        mapping.bind_actor(ActorId(0), TileId(1));
        assert!(matches!(
            BindingAwareGraph::build(&g, &platform, &mapping, FlowType::NSoC),
            Err(MappingError::ActorBoundTwice(_))
        ));

        let (g, mut platform, _mapping, _) = two_tile_setup();
        // A connection running the wrong way.
        let backwards = platform.add_connection(Connection {
            name: "back".into(),
            src: TileId(1),
            dst: TileId(0),
            latency: 0,
        });
        let mut wrong = Mapping::new();
        wrong
            .bind_actor(ActorId(0), TileId(0))
            .bind_actor(ActorId(1), TileId(1))
            .bind_channel(c, backwards)
            .set_schedule(TileId(0), StaticOrderSchedule::periodic(vec![ActorId(0)]))
            .set_schedule(TileId(1), StaticOrderSchedule::periodic(vec![ActorId(1)]));
        assert!(matches!(
            BindingAwareGraph::build(&g, &platform, &wrong, FlowType::NSoC),
            Err(MappingError::ConnectionMismatch(_))
        ));
    }

    #[test]
    fn intra_tile_memory_must_hold_initial_tokens() {
        let mut g = TimedGraph::new("intra");
        let a = g.add_actor(Actor::with_execution("a", "arm", 1));
        let b = g.add_actor(Actor::with_execution("b", "arm", 1));
        g.add_channel(Channel {
            name: "ab".into(),
            src: a,
            src_rate: 1,
            dst: b,
            dst_rate: 1,
            initial_tokens: 3,
            represents: None,
            buffer_size: BufferSizes { sz: 2, src: 0, dst: 0, mem: 2 },
            token_size: 0,
            min_bandwidth: 0.0,
            min_latency: 0,
        })
        .unwrap();

        let mut platform = PlatformGraph::new();
        let t0 = platform.add_tile(Tile {
            name: "tile0".into(),
            processor_type: "arm".into(),
            wheel_size: 1,
            slice: 1,
        });
        let mut mapping = Mapping::new();
        mapping
            .bind_actor(a, t0)
            .bind_actor(b, t0)
            .set_schedule(t0, StaticOrderSchedule::periodic(vec![a, b]));

        assert!(matches!(
            BindingAwareGraph::build(&g, &platform, &mapping, FlowType::NSoC),
            Err(MappingError::InsufficientMemory(_))
        ));
    }

    #[test]
    fn min_latency_adds_a_parallel_latency_path() {
        let (mut g, platform, mapping, c) = two_tile_setup();
        // Rebuild the channel with a minimal latency.
        let mut ch = g.channel(c).clone();
        ch.min_latency = 7;
        let mut g2 = TimedGraph::new("app");
        let a = g2.add_actor(Actor::with_execution("a", "arm", 2));
        let b = g2.add_actor(Actor::with_execution("b", "arm", 1));
        ch.src = a;
        ch.dst = b;
        g2.add_channel(ch).unwrap();
        g = g2;

        let bag = BindingAwareGraph::build(&g, &platform, &mapping, FlowType::NSoC).unwrap();
        let latency = bag
            .graph
            .actors()
            .find(|(_, actor)| actor.name == "ab_latency")
            .map(|(_, actor)| actor.execution_time().unwrap());
        assert_eq!(latency, Some(7));
        assert_eq!(bag.graph.nr_actors(), 5);
        assert_eq!(bag.graph.nr_channels(), 11);
    }
}
