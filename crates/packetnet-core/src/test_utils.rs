//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).
//!
//! Systems are laid out on the x axis. With the default 60-unit footprint,
//! two systems 160 units apart are joined by a 100-unit wire.

use crate::config::SimConfig;
use crate::engine::Engine;
use crate::fixed::Fixed64;
use crate::geom::Point;
use crate::id::*;
use crate::packet::{PacketTemplate, SemanticType};
use crate::topology::*;
use crate::world::World;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Schedules
// ===========================================================================

pub fn schedule(total: u32, period_ms: u64) -> GeneratorSchedule {
    schedule_of(PacketTemplate::normal(), total, period_ms)
}

pub fn schedule_of(template: PacketTemplate, total: u32, period_ms: u64) -> GeneratorSchedule {
    GeneratorSchedule {
        total,
        period_ms,
        template,
    }
}

// ===========================================================================
// Topology builders
// ===========================================================================

/// Add a system at `(x, y)` and return its id.
pub fn system(t: &mut Topology, system_type: SystemType, x: f64, y: f64) -> SystemId {
    t.add_system(system_type, Point::from_f64(x, y)).unwrap()
}

pub fn output(t: &mut Topology, system: SystemId, shape: Shape) -> PortId {
    t.add_port(system, PortDirection::Out, shape).unwrap()
}

pub fn input(t: &mut Topology, system: SystemId, shape: Shape) -> PortId {
    t.add_port(system, PortDirection::In, shape).unwrap()
}

/// Add an output port on `from`, an input port on `to`, and wire them.
pub fn link(t: &mut Topology, from: SystemId, to: SystemId, shape: Shape) -> WireId {
    let out = output(t, from, shape);
    let inp = input(t, to, shape);
    t.connect(out, inp).unwrap()
}

/// One source wired straight to one sink over 100 units.
#[derive(Debug, Clone)]
pub struct Line {
    pub topology: Topology,
    pub source: SystemId,
    pub sink: SystemId,
    pub wire: WireId,
}

pub fn source_to_sink(
    source_shape: Shape,
    sink_shape: Shape,
    total: u32,
    period_ms: u64,
) -> Line {
    source_to_sink_with(PacketTemplate::normal(), source_shape, sink_shape, total, period_ms)
}

pub fn source_to_sink_with(
    template: PacketTemplate,
    source_shape: Shape,
    sink_shape: Shape,
    total: u32,
    period_ms: u64,
) -> Line {
    let mut t = Topology::new(&SimConfig::default());
    let source = system(&mut t, SystemType::Source, 0.0, 0.0);
    let sink = system(&mut t, SystemType::Sink, 160.0, 0.0);
    let out = output(&mut t, source, source_shape);
    let inp = input(&mut t, sink, sink_shape);
    let wire = t.connect(out, inp).unwrap();
    t.set_generator(source, schedule_of(template, total, period_ms))
        .unwrap();
    Line {
        topology: t,
        source,
        sink,
        wire,
    }
}

/// Source -> `relay` -> nothing. The relay has no output ports, so every
/// packet that reaches it must queue.
#[derive(Debug, Clone)]
pub struct DeadEnd {
    pub topology: Topology,
    pub source: SystemId,
    pub relay: SystemId,
}

pub fn dead_end(relay_type: SystemType, capacity: usize, template: PacketTemplate, total: u32) -> DeadEnd {
    let mut t = Topology::new(&SimConfig::default());
    let source = system(&mut t, SystemType::Source, 0.0, 0.0);
    let relay = system(&mut t, relay_type, 160.0, 0.0);
    link(&mut t, source, relay, Shape::Square);
    t.set_queue_capacity(relay, capacity).unwrap();
    t.set_generator(source, schedule_of(template, total, 16))
        .unwrap();
    DeadEnd {
        topology: t,
        source,
        relay,
    }
}

/// Source (BULK) -> distributor -> merger -> sink, every wire SQUARE.
#[derive(Debug, Clone)]
pub struct Chain {
    pub topology: Topology,
    pub source: SystemId,
    pub distributor: SystemId,
    pub merger: SystemId,
    pub sink: SystemId,
}

pub fn distributor_merger_chain(bulk_size: u32) -> Chain {
    let mut t = Topology::new(&SimConfig::default());
    let source = system(&mut t, SystemType::Source, 0.0, 0.0);
    let distributor = system(&mut t, SystemType::Distributor, 160.0, 0.0);
    let merger = system(&mut t, SystemType::Merger, 320.0, 0.0);
    let sink = system(&mut t, SystemType::Sink, 480.0, 0.0);
    link(&mut t, source, distributor, Shape::Square);
    link(&mut t, distributor, merger, Shape::Square);
    link(&mut t, merger, sink, Shape::Square);
    let template = PacketTemplate::of(SemanticType::Bulk)
        .with_shape(Shape::Square)
        .with_size(bulk_size);
    t.set_generator(source, schedule_of(template, 1, 1000))
        .unwrap();
    Chain {
        topology: t,
        source,
        distributor,
        merger,
        sink,
    }
}

/// `width` parallel source -> node -> sink lanes plus, for `width >= 2`, a
/// lane that crosses a spy pair. Used for load tests and benchmarks.
pub fn mesh(width: usize, packets_per_source: u32) -> Topology {
    let mut t = Topology::new(&SimConfig::default());
    for lane in 0..width {
        let y = lane as f64 * 120.0;
        let source = system(&mut t, SystemType::Source, 0.0, y);
        let node = system(&mut t, SystemType::Node, 160.0, y);
        let sink = system(&mut t, SystemType::Sink, 320.0, y);
        let shape = match lane % 3 {
            0 => Shape::Square,
            1 => Shape::Triangle,
            _ => Shape::Circle,
        };
        link(&mut t, source, node, shape);
        link(&mut t, node, sink, Shape::Any);
        t.set_generator(source, schedule(packets_per_source, 32))
            .unwrap();
    }
    if width >= 2 {
        let spy_a = system(&mut t, SystemType::Spy, 160.0, -200.0);
        let spy_b = system(&mut t, SystemType::Spy, 320.0, -200.0);
        let extra = system(&mut t, SystemType::Source, 0.0, -200.0);
        let sink = system(&mut t, SystemType::Sink, 480.0, -200.0);
        link(&mut t, extra, spy_a, Shape::Circle);
        link(&mut t, spy_b, sink, Shape::Any);
        t.set_generator(extra, schedule(packets_per_source, 48))
            .unwrap();
    }
    t
}

// ===========================================================================
// Runners
// ===========================================================================

pub fn world(topology: &Topology) -> World {
    World::new(topology.clone(), SimConfig::default())
}

/// Step until the world finishes or `max_ticks` have run. Returns the
/// number of ticks run.
pub fn run_world(world: &mut World, max_ticks: u64) -> u64 {
    let mut ran = 0;
    while ran < max_ticks && world.step() {
        ran += 1;
    }
    ran
}

/// An engine around `topology`, already started.
pub fn started_engine(topology: &Topology) -> Engine {
    let mut engine = Engine::from_topology(topology.clone(), SimConfig::default());
    engine.start().unwrap();
    engine
}
