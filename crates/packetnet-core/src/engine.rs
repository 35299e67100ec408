//! The live simulation engine: run control, editor commands, event
//! delivery and snapshot publication around a [`World`].
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - A [`World`] (topology, packets, queues, RNG, clock, statistics)
//! - A [`RunPhase`] gating editor commands against run control
//! - An [`EventBus`] for typed simulation events
//! - A [`SnapshotHandle`] that readers on other threads poll for the
//!   latest [`WorldSnapshot`]
//!
//! # Lifecycle
//!
//! Editor commands are accepted while [`RunPhase::Editing`]. [`Engine::start`]
//! freezes the topology; [`Engine::tick`] then advances one step at a time
//! until every packet is terminal and every generator is exhausted, at
//! which point the phase becomes [`RunPhase::Finished`].
//! [`Engine::reset_for_level`] returns to editing with the topology intact.

use crate::config::SimConfig;
use crate::event::{EventBus, EventKind, PassiveListener};
use crate::fixed::{Fixed64, Millis};
use crate::geom::Point;
use crate::id::{PacketId, PortId, SystemId, WireId};
use crate::predict::{Prediction, Predictor};
use crate::query::{PacketSnapshot, SnapshotHandle, WorldSnapshot};
use crate::sim::AdvanceResult;
use crate::stats::RunStats;
use crate::topology::{GeneratorSchedule, PortDirection, Shape, SystemType, Topology, TopologyError};
use crate::world::{InvariantViolation, World};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by run control, editor passthroughs and effect hooks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("the run has started; the topology is frozen until reset")]
    RunInProgress,
    #[error("the run has already started")]
    AlreadyStarted,
    #[error("the run has not started")]
    NotStarted,
    #[error("packet not found: {0:?}")]
    PacketNotFound(PacketId),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("engine invariant violated: {0}")]
    InvariantViolation(InvariantViolation),
}

/// Where the engine is in a level's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    Editing,
    Running,
    Finished,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Engine {
    world: World,
    phase: RunPhase,
    /// Checked at the top of every tick.
    paused: bool,
    /// Typed event bus for simulation events.
    pub event_bus: EventBus,
    snapshots: SnapshotHandle,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl Engine {
    /// An engine with an empty topology.
    pub fn new(config: SimConfig) -> Self {
        let topology = Topology::new(&config);
        Self::from_topology(topology, config)
    }

    /// An engine in the editing phase around an existing topology.
    pub fn from_topology(topology: Topology, config: SimConfig) -> Self {
        let engine = Self {
            world: World::new(topology, config),
            phase: RunPhase::Editing,
            paused: false,
            event_bus: EventBus::default(),
            snapshots: SnapshotHandle::new(),
        };
        engine.publish();
        engine
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn topology(&self) -> &Topology {
        &self.world.topology
    }

    pub fn config(&self) -> &SimConfig {
        &self.world.config
    }

    pub fn stats(&self) -> &RunStats {
        &self.world.stats
    }

    pub fn tick_count(&self) -> u64 {
        self.world.tick()
    }

    pub fn state_hash(&self) -> u64 {
        self.world.state_hash()
    }

    /// Every invariant violation recorded since the run started.
    pub fn violations(&self) -> &[InvariantViolation] {
        self.world.violations()
    }

    /// A reader for the snapshot published after each tick. Clone it into
    /// a render or HUD thread.
    pub fn snapshots(&self) -> SnapshotHandle {
        self.snapshots.clone()
    }

    /// A fresh snapshot of the current state.
    pub fn snapshot(&self) -> WorldSnapshot {
        self.world.world_snapshot()
    }

    /// One entry per packet instance seen so far in this run, terminal ones
    /// first, followed by packets sources have yet to generate.
    pub fn packet_report(&self) -> Vec<PacketSnapshot> {
        self.world.packet_report(true)
    }

    // -----------------------------------------------------------------------
    // Editor commands
    // -----------------------------------------------------------------------

    fn edit<T>(
        &mut self,
        command: impl FnOnce(&mut Topology) -> Result<T, TopologyError>,
    ) -> Result<T, EngineError> {
        if self.phase != RunPhase::Editing {
            log::warn!("editor command rejected: run in progress");
            return Err(EngineError::RunInProgress);
        }
        let value = command(&mut self.world.topology)?;
        self.world.reset_runtime();
        self.publish();
        Ok(value)
    }

    pub fn add_system(
        &mut self,
        system_type: SystemType,
        position: Point,
    ) -> Result<SystemId, EngineError> {
        self.edit(|t| t.add_system(system_type, position))
    }

    pub fn set_queue_capacity(
        &mut self,
        system: SystemId,
        capacity: usize,
    ) -> Result<(), EngineError> {
        self.edit(|t| t.set_queue_capacity(system, capacity))
    }

    pub fn set_generator(
        &mut self,
        system: SystemId,
        schedule: GeneratorSchedule,
    ) -> Result<(), EngineError> {
        self.edit(|t| t.set_generator(system, schedule))
    }

    pub fn move_system(&mut self, system: SystemId, position: Point) -> Result<(), EngineError> {
        self.edit(|t| t.move_system(system, position))
    }

    pub fn add_port(
        &mut self,
        system: SystemId,
        direction: PortDirection,
        shape: Shape,
    ) -> Result<PortId, EngineError> {
        self.edit(|t| t.add_port(system, direction, shape))
    }

    pub fn remove_port(&mut self, port: PortId) -> Result<(), EngineError> {
        self.edit(|t| t.remove_port(port))
    }

    pub fn connect(&mut self, a: PortId, b: PortId) -> Result<WireId, EngineError> {
        self.edit(|t| t.connect(a, b))
    }

    pub fn disconnect(&mut self, wire: WireId) -> Result<(), EngineError> {
        self.edit(|t| t.disconnect(wire))
    }

    pub fn insert_waypoint(
        &mut self,
        wire: WireId,
        index: usize,
        point: Point,
    ) -> Result<(), EngineError> {
        self.edit(|t| t.insert_waypoint(wire, index, point))
    }

    pub fn move_waypoint(
        &mut self,
        wire: WireId,
        index: usize,
        point: Point,
    ) -> Result<(), EngineError> {
        self.edit(|t| t.move_waypoint(wire, index, point))
    }

    pub fn delete_waypoint(&mut self, wire: WireId, index: usize) -> Result<(), EngineError> {
        self.edit(|t| t.delete_waypoint(wire, index))
    }

    // -----------------------------------------------------------------------
    // Prediction
    // -----------------------------------------------------------------------

    /// Preview the run up to `target_ms` of virtual time without touching
    /// live state. Only available while editing.
    pub fn predict(&self, target_ms: Millis) -> Result<Vec<PacketSnapshot>, EngineError> {
        Ok(self.predict_run(target_ms)?.packets)
    }

    /// Like [`Engine::predict`], with the tick count and statistics of the
    /// preview.
    pub fn predict_run(&self, target_ms: Millis) -> Result<Prediction, EngineError> {
        if self.phase != RunPhase::Editing {
            return Err(EngineError::RunInProgress);
        }
        Ok(Predictor::new(&self.world.topology, &self.world.config).run(target_ms))
    }

    // -----------------------------------------------------------------------
    // Run control
    // -----------------------------------------------------------------------

    /// Freeze the topology and begin the run from tick 0.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.phase != RunPhase::Editing {
            return Err(EngineError::AlreadyStarted);
        }
        self.world.reset_runtime();
        self.phase = RunPhase::Running;
        self.paused = false;
        log::info!(
            "run started: {} systems, {} wires",
            self.world.topology.system_count(),
            self.world.topology.wire_count()
        );
        if self.world.is_finished() {
            self.finish();
        }
        self.publish();
        Ok(())
    }

    pub fn pause(&mut self, paused: bool) {
        if self.paused != paused {
            log::info!(
                "run {} at tick {}",
                if paused { "paused" } else { "resumed" },
                self.world.tick()
            );
        }
        self.paused = paused;
    }

    /// Return to editing. Runtime state, statistics and the clock are
    /// cleared, the RNG is reseeded, and the topology is kept.
    pub fn reset_for_level(&mut self) {
        self.world.reset_runtime();
        self.phase = RunPhase::Editing;
        self.paused = false;
        log::info!("level reset");
        self.publish();
    }

    /// Run one tick. Returns whether a tick actually ran: `false` while
    /// paused or once the run has finished.
    ///
    /// An invariant violation recorded during the tick is returned as an
    /// error after the tick completes.
    pub fn tick(&mut self) -> Result<bool, EngineError> {
        match self.phase {
            RunPhase::Editing => return Err(EngineError::NotStarted),
            RunPhase::Finished => return Ok(false),
            RunPhase::Running => {}
        }
        if self.paused {
            return Ok(false);
        }

        let recorded = self.world.violations.len();
        let stepped = self.world.step();

        for event in self.world.events.drain(..) {
            self.event_bus.emit(event);
        }
        self.event_bus.deliver();

        if self.world.is_finished() {
            self.finish();
        }
        self.publish();

        match self.world.violations.get(recorded) {
            Some(violation) => Err(EngineError::InvariantViolation(violation.clone())),
            None => Ok(stepped),
        }
    }

    /// Feed `dt_ms` of wall time; run as many whole ticks as it covers.
    /// Nothing accumulates while paused.
    pub fn advance(&mut self, dt_ms: Millis) -> Result<AdvanceResult, EngineError> {
        let mut result = AdvanceResult::default();
        if self.paused || self.phase != RunPhase::Running {
            result.finished = self.phase == RunPhase::Finished;
            return Ok(result);
        }
        let tick_ms = self.world.config.tick_ms;
        self.world.sim_state.bank(dt_ms);
        while self.world.sim_state.take_tick(tick_ms) {
            if self.tick()? {
                result.steps_run += 1;
            }
            if self.phase == RunPhase::Finished {
                self.world.sim_state.drain();
                break;
            }
        }
        result.finished = self.phase == RunPhase::Finished;
        Ok(result)
    }

    /// Tick until the run finishes or `max_ticks` have run.
    pub fn run_to_completion(&mut self, max_ticks: u64) -> Result<u64, EngineError> {
        let mut ran = 0;
        while ran < max_ticks && self.tick()? {
            ran += 1;
        }
        Ok(ran)
    }

    fn finish(&mut self) {
        if self.phase == RunPhase::Finished {
            return;
        }
        self.phase = RunPhase::Finished;
        let stats = &self.world.stats;
        log::info!(
            "run finished at tick {}: delivered {} / generated {} units, {} coins",
            self.world.tick(),
            stats.delivered_units,
            stats.generated_units,
            stats.coins
        );
    }

    fn publish(&self) {
        self.snapshots.publish(self.world.world_snapshot());
    }

    /// Take over `restored`'s world and phase, keeping this engine's
    /// listeners and snapshot handle.
    pub(crate) fn restore_from(&mut self, restored: Engine) {
        let event_bus = std::mem::take(&mut self.event_bus);
        let snapshots = self.snapshots.clone();
        *self = Engine {
            event_bus,
            snapshots,
            ..restored
        };
        self.publish();
    }

    // -----------------------------------------------------------------------
    // Interactive-effect hooks
    // -----------------------------------------------------------------------

    /// Add noise to a live packet, clamped to its size.
    pub fn add_noise(&mut self, packet: PacketId, amount: Fixed64) -> Result<(), EngineError> {
        if self.world.add_noise(packet, amount) {
            Ok(())
        } else {
            Err(EngineError::PacketNotFound(packet))
        }
    }

    /// Disable a system for `duration_ms` of virtual time.
    pub fn disable_system(
        &mut self,
        system: SystemId,
        duration_ms: Millis,
    ) -> Result<(), EngineError> {
        if self.world.disable_system(system, duration_ms) {
            Ok(())
        } else {
            Err(TopologyError::SystemNotFound(system).into())
        }
    }

    /// Scale a live packet's wire speed. Negative factors clamp to zero.
    pub fn set_packet_speed_factor(
        &mut self,
        packet: PacketId,
        factor: Fixed64,
    ) -> Result<(), EngineError> {
        if self.world.set_speed_factor(packet, factor) {
            Ok(())
        } else {
            Err(EngineError::PacketNotFound(packet))
        }
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.event_bus.suppress(kind);
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.event_bus.on_passive(kind, listener);
    }
}
