//! Packetnet Core -- the packet-routing simulation for network-building
//! puzzle games.
//!
//! Players place systems (sources, sinks and routing nodes), give them
//! typed ports, and draw wires between them. This crate owns that
//! topology, moves packets across it in fixed-size ticks, and offers a
//! prediction engine that fast-forwards a copy of the level so the editor
//! can preview any instant of a run.
//!
//! # Five-Phase Tick
//!
//! Each call to [`engine::Engine::tick`] advances the simulation by one
//! tick of `SimConfig::tick_ms` virtual milliseconds:
//!
//! 1. **Generation** -- Due sources emit a packet onto a random free port.
//! 2. **Movement** -- Packets on wires advance; noisy packets are lost.
//! 3. **Arrival** -- Packets at the end of a wire enter the destination
//!    system's [`behavior::Behavior`].
//! 4. **Drain** -- Every system forwards its head-of-queue packet if an
//!    output wire is free.
//! 5. **Bookkeeping** -- Events are delivered, the tick counter and state
//!    hash update, and the read model is republished.
//!
//! # Editing and Running
//!
//! ```rust,ignore
//! let mut engine = Engine::new(SimConfig::default());
//! let src = engine.add_system(SystemType::Source, Point::from_f64(0.0, 0.0))?;
//! let sink = engine.add_system(SystemType::Sink, Point::from_f64(160.0, 0.0))?;
//! let out = engine.add_port(src, PortDirection::Out, Shape::Square)?;
//! let inp = engine.add_port(sink, PortDirection::In, Shape::Square)?;
//! engine.connect(out, inp)?;
//! engine.set_generator(src, GeneratorSchedule { total: 2, period_ms: 1000, template: PacketTemplate::normal() })?;
//! let preview = engine.predict(2000)?;
//! engine.start()?;
//! engine.run_to_completion(10_000)?;
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Editor commands, run control, and event delivery.
//! - [`topology::Topology`] -- Systems, ports and wires with cached geometry.
//! - [`world::World`] -- Runtime state and the tick algorithm.
//! - [`predict::Predictor`] -- Side-effect-free previews from time zero.
//! - [`query::SnapshotHandle`] -- Shared read model for renderers.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`event::EventBus`] -- Buffered simulation events with passive listeners.
//! - [`serialize`] -- Versioned level save/load via bitcode.

pub mod behavior;
pub mod config;
pub mod engine;
pub mod event;
pub mod fixed;
pub mod geom;
pub mod id;
pub mod packet;
pub mod predict;
pub mod query;
pub mod rng;
pub mod serialize;
pub mod sim;
pub mod stats;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod topology;
pub mod validation;
pub mod world;
