//! The mutable simulation state and the per-tick algorithm.
//!
//! A [`World`] owns a copy of the topology plus everything that changes
//! while a run ticks: per-system queues and generator progress, the live
//! packet arena, wire occupancy, the routing RNG, the clock, and run
//! statistics. The live [`Engine`](crate::engine::Engine) and the
//! [`Predictor`](crate::predict::Predictor) both drive a `World`, which is
//! what keeps a preview and a live run in agreement.
//!
//! # Tick phases
//!
//! Each [`World::step`] runs:
//! 1. **Generation** -- due sources emit one packet onto an available port.
//! 2. **Movement** -- packets on wires advance; noisy packets are lost.
//! 3. **Arrival** -- packets at the end of a wire enter the destination
//!    system's behavior.
//! 4. **Drain** -- every system tries to forward its head-of-queue packet.
//! 5. **Bookkeeping** -- the tick counter and state hash update.

use crate::config::SimConfig;
use crate::event::Event;
use crate::fixed::{Fixed64, Millis, checked_div_64};
use crate::geom::Point;
use crate::id::{PacketId, PortId, SystemId, WireId};
use crate::packet::{LossReason, MotionState, Packet, WireMotion};
use crate::query::{PacketSnapshot, PacketStatus, SystemSnapshot, WorldSnapshot};
use crate::rng::SimRng;
use crate::sim::{SimState, StateHash};
use crate::stats::RunStats;
use crate::topology::{Shape, Topology};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::{BTreeMap, VecDeque};

// ---------------------------------------------------------------------------
// Invariant violations
// ---------------------------------------------------------------------------

/// A state the tick algorithm should never reach on a validated topology.
///
/// These are not packet losses: they point at a bug upstream. The packet
/// involved is still retired (as `Misrouted`) so the tick completes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("source {system:?} received packet {packet:?}")]
    SourceReceived { system: SystemId, packet: PacketId },
    #[error("wire {wire:?} carrying packet {packet:?} resolves to no system")]
    DanglingWire { wire: WireId, packet: PacketId },
    #[error("system {system:?} has no routing behavior")]
    NoBehavior { system: SystemId, packet: PacketId },
}

// ---------------------------------------------------------------------------
// Per-system runtime state
// ---------------------------------------------------------------------------

/// Runtime state of one system. Rebuilt from scratch on every reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemState {
    /// FIFO of packets waiting for a free output port.
    pub queue: VecDeque<PacketId>,
    /// Bits collected by a merger, keyed by the bulk they came from.
    pub merge_buffer: BTreeMap<PacketId, Vec<PacketId>>,
    /// Packets generated so far (sources only).
    pub generated: u32,
    /// Virtual time at which the next packet may be generated.
    pub next_due_ms: Millis,
    /// While set, the system neither receives, generates nor drains.
    pub disabled_until_ms: Option<Millis>,
}

impl SystemState {
    pub fn buffered_bits(&self) -> usize {
        self.merge_buffer.values().map(Vec::len).sum()
    }
}

/// How a packet enters a wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Launch {
    /// Leaves through a port; the speed model applies.
    Exit,
    /// Placed directly onto a wire by a spy; base speed, no acceleration.
    Teleport,
}

/// An output port whose wire can take a packet right now.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub port: PortId,
    pub wire: WireId,
    pub shape: Shape,
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct World {
    pub(crate) topology: Topology,
    pub(crate) config: SimConfig,

    // -- Per-system state (SoA, keyed by SystemId) --
    pub(crate) system_states: SecondaryMap<SystemId, SystemState>,

    /// Live packets only. Terminal packets move to `retired`.
    pub(crate) packets: SlotMap<PacketId, Packet>,
    /// At most one packet per wire.
    pub(crate) wire_occupant: SecondaryMap<WireId, PacketId>,

    pub(crate) rng: SimRng,
    pub(crate) sim_state: SimState,
    pub(crate) stats: RunStats,

    /// Snapshots of packets that reached a terminal state, in order.
    pub(crate) retired: Vec<PacketSnapshot>,
    /// Events recorded during the current tick.
    pub(crate) events: Vec<Event>,
    pub(crate) violations: Vec<InvariantViolation>,
    pub(crate) last_state_hash: u64,
}

impl World {
    pub fn new(topology: Topology, config: SimConfig) -> Self {
        let mut world = Self {
            rng: SimRng::new(config.seed),
            topology,
            config,
            system_states: SecondaryMap::new(),
            packets: SlotMap::with_key(),
            wire_occupant: SecondaryMap::new(),
            sim_state: SimState::new(),
            stats: RunStats::default(),
            retired: Vec::new(),
            events: Vec::new(),
            violations: Vec::new(),
            last_state_hash: 0,
        };
        world.reset_runtime();
        world
    }

    /// Drop every packet, queue and counter and reseed the RNG. The topology
    /// is kept. A reset world is indistinguishable from a freshly built one.
    pub fn reset_runtime(&mut self) {
        self.system_states = SecondaryMap::new();
        for (id, _) in self.topology.systems() {
            self.system_states.insert(id, SystemState::default());
        }
        self.packets = SlotMap::with_key();
        self.wire_occupant = SecondaryMap::new();
        self.rng = SimRng::new(self.config.seed);
        self.sim_state = SimState::new();
        self.stats = RunStats::default();
        self.retired.clear();
        self.events.clear();
        self.violations.clear();
        self.last_state_hash = 0;
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn tick(&self) -> u64 {
        self.sim_state.tick
    }

    /// Virtual time of the tick about to run.
    pub fn now_ms(&self) -> Millis {
        self.sim_state.now_ms(self.config.tick_ms)
    }

    pub fn packet(&self, id: PacketId) -> Option<&Packet> {
        self.packets.get(id)
    }

    pub fn live_packet_count(&self) -> usize {
        self.packets.len()
    }

    pub fn system_state(&self, system: SystemId) -> Option<&SystemState> {
        self.system_states.get(system)
    }

    pub fn queue(&self, system: SystemId) -> impl Iterator<Item = PacketId> + '_ {
        self.system_states
            .get(system)
            .into_iter()
            .flat_map(|s| s.queue.iter().copied())
    }

    pub fn violations(&self) -> &[InvariantViolation] {
        &self.violations
    }

    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    /// Every generator is exhausted and no packet is left alive.
    pub fn is_finished(&self) -> bool {
        self.packets.is_empty() && self.generators_exhausted()
    }

    fn generators_exhausted(&self) -> bool {
        self.topology.systems().all(|(id, data)| {
            data.generator.as_ref().is_none_or(|g| {
                self.system_states
                    .get(id)
                    .is_some_and(|s| s.generated >= g.total)
            })
        })
    }

    pub fn is_enabled(&self, system: SystemId, now: Millis) -> bool {
        self.system_states
            .get(system)
            .and_then(|s| s.disabled_until_ms)
            .is_none_or(|until| now >= until)
    }

    // -----------------------------------------------------------------------
    // Interactive-effect hooks
    // -----------------------------------------------------------------------

    /// Add noise to a live packet. Returns `false` if the packet is gone.
    pub fn add_noise(&mut self, packet: PacketId, amount: Fixed64) -> bool {
        let Some(p) = self.packets.get_mut(packet) else {
            return false;
        };
        p.add_noise(amount);
        true
    }

    /// Disable a system for `duration_ms` of virtual time from now.
    pub fn disable_system(&mut self, system: SystemId, duration_ms: Millis) -> bool {
        let until = self.now_ms().saturating_add(duration_ms);
        let Some(state) = self.system_states.get_mut(system) else {
            return false;
        };
        state.disabled_until_ms = Some(until);
        true
    }

    /// Scale a live packet's wire speed.
    pub fn set_speed_factor(&mut self, packet: PacketId, factor: Fixed64) -> bool {
        let Some(p) = self.packets.get_mut(packet) else {
            return false;
        };
        p.speed_factor = factor.max(Fixed64::ZERO);
        true
    }

    // -----------------------------------------------------------------------
    // Step
    // -----------------------------------------------------------------------

    /// Run one tick. Returns `false` (and changes nothing) on a finished
    /// world.
    pub fn step(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        self.events.clear();

        self.phase_generate();
        let arrivals = self.phase_move();
        self.phase_arrive(arrivals);
        self.phase_drain();
        self.phase_bookkeeping();
        true
    }

    // -----------------------------------------------------------------------
    // Phase 1: Generation
    // -----------------------------------------------------------------------

    fn phase_generate(&mut self) {
        let now = self.now_ms();
        let sources: Vec<SystemId> = self
            .topology
            .systems()
            .filter(|(_, data)| data.generator.is_some())
            .map(|(id, _)| id)
            .collect();

        for source in sources {
            if !self.is_enabled(source, now) {
                continue;
            }
            let Some(schedule) = self
                .topology
                .system(source)
                .and_then(|data| data.generator.as_ref())
            else {
                continue;
            };
            let Some(state) = self.system_states.get(source) else {
                continue;
            };
            if state.generated >= schedule.total || now < state.next_due_ms {
                continue;
            }
            let period = schedule.period_ms;
            let template = schedule.template.clone();

            let mut candidates = self.available_output_ports(source);
            self.rng.shuffle(&mut candidates);
            // Deferred, not skipped: the due time stays where it was.
            let Some(&Candidate { port, wire, shape }) = candidates.first() else {
                continue;
            };
            let position = self
                .topology
                .port(port)
                .map_or(Point::ORIGIN, |p| p.position);

            let mut packet = template.instantiate(shape, position);
            packet.origin = Some(source);
            let size = packet.size;
            let id = self.packets.insert(packet);
            self.stats.record_generated(size);
            if let Some(state) = self.system_states.get_mut(source) {
                state.generated += 1;
                state.next_due_ms = now + period;
            }
            self.events.push(Event::PacketGenerated {
                packet: id,
                source,
                size,
                tick: self.sim_state.tick,
            });
            log::debug!("tick {}: {source:?} generated {id:?}", self.sim_state.tick);
            self.launch(id, port, wire, Launch::Exit);
        }
    }

    // -----------------------------------------------------------------------
    // Phase 2: Movement
    // -----------------------------------------------------------------------

    /// Advance every packet on a wire. Returns the packets that reached the
    /// end of their wire, in arena order.
    fn phase_move(&mut self) -> Vec<PacketId> {
        let moving: Vec<PacketId> = self
            .packets
            .iter()
            .filter(|(_, p)| p.is_on_wire())
            .map(|(id, _)| id)
            .collect();

        let arrival_threshold = Fixed64::ONE - self.config.arrival_epsilon;
        let mut arrivals = Vec::new();
        for id in moving {
            let Some(packet) = self.packets.get(id) else {
                continue;
            };
            if packet.noise_exceeded() {
                self.lose_packet(id, LossReason::Noise);
                continue;
            }
            let Some(motion) = packet.wire_motion().copied() else {
                continue;
            };
            let Some(wire) = self.topology.wire(motion.wire) else {
                self.violation(InvariantViolation::DanglingWire {
                    wire: motion.wire,
                    packet: id,
                });
                self.lose_packet(id, LossReason::Misrouted);
                continue;
            };

            let length = wire.length();
            let travelled = motion
                .distance
                .saturating_add(motion.speed.saturating_mul(packet.speed_factor));
            let progress =
                checked_div_64(travelled, length).map_or(Fixed64::ONE, |p| p.min(Fixed64::ONE));
            let distance = travelled.min(length);
            let speed = if motion.accelerating {
                motion
                    .speed
                    .saturating_add(self.config.triangle_acceleration)
                    .min(self.config.triangle_max_speed)
            } else {
                motion.speed
            };
            let position = wire.path().point_at(distance);

            if let Some(packet) = self.packets.get_mut(id) {
                packet.position = position;
                packet.motion = MotionState::OnWire(WireMotion {
                    distance,
                    progress,
                    speed,
                    ..motion
                });
            }
            if progress >= arrival_threshold {
                arrivals.push(id);
            }
        }
        arrivals
    }

    // -----------------------------------------------------------------------
    // Phase 3: Arrival
    // -----------------------------------------------------------------------

    fn phase_arrive(&mut self, arrivals: Vec<PacketId>) {
        let now = self.now_ms();
        for id in arrivals {
            let Some(motion) = self.packets.get(id).and_then(|p| p.wire_motion().copied()) else {
                continue;
            };
            let end = self
                .topology
                .wire(motion.wire)
                .map(|w| (w.length(), w.path().point_at(w.length())));
            if let (Some(packet), Some((length, point))) = (self.packets.get_mut(id), end) {
                packet.position = point;
                packet.motion = MotionState::OnWire(WireMotion {
                    distance: length,
                    progress: Fixed64::ONE,
                    ..motion
                });
            }
            self.free_wire(motion.wire, id);

            let Some(destination) = self.topology.wire_destination(motion.wire) else {
                self.violation(InvariantViolation::DanglingWire {
                    wire: motion.wire,
                    packet: id,
                });
                self.lose_packet(id, LossReason::Misrouted);
                continue;
            };
            if !self.is_enabled(destination, now) {
                self.lose_packet(id, LossReason::UnreachableDestination);
                continue;
            }
            self.receive(destination, id);
        }
    }

    // -----------------------------------------------------------------------
    // Phase 4: Queue draining
    // -----------------------------------------------------------------------

    fn phase_drain(&mut self) {
        let now = self.now_ms();
        let waiting: Vec<SystemId> = self
            .system_states
            .iter()
            .filter(|(_, s)| !s.queue.is_empty())
            .map(|(id, _)| id)
            .collect();
        for system in waiting {
            if self.is_enabled(system, now) {
                self.drain_queue(system);
            }
        }
    }

    /// Try to forward the head of `system`'s queue. Only the head is ever
    /// considered. Returns whether a packet left.
    pub(crate) fn drain_queue(&mut self, system: SystemId) -> bool {
        let Some(head) = self
            .system_states
            .get(system)
            .and_then(|s| s.queue.front().copied())
        else {
            return false;
        };
        let Some(candidate) = self.find_available_output_port(system, head) else {
            return false;
        };
        if let Some(state) = self.system_states.get_mut(system) {
            state.queue.pop_front();
        }
        self.launch(head, candidate.port, candidate.wire, Launch::Exit);
        true
    }

    // -----------------------------------------------------------------------
    // Phase 5: Bookkeeping
    // -----------------------------------------------------------------------

    fn phase_bookkeeping(&mut self) {
        self.sim_state.tick += 1;
        self.last_state_hash = self.compute_state_hash();
        if self.is_finished() {
            self.events.push(Event::RunFinished {
                tick: self.sim_state.tick,
            });
        }
    }

    fn compute_state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(self.sim_state.tick);
        hasher.write_u64(self.rng.state());
        for (id, packet) in &self.packets {
            hasher.write_key(id);
            hasher.write_u32(packet.size);
            hasher.write_fixed64(packet.noise);
            hasher.write_point(packet.position);
            if let Some(motion) = packet.wire_motion() {
                hasher.write_fixed64(motion.distance);
                hasher.write_fixed64(motion.speed);
            }
        }
        for (id, state) in &self.system_states {
            hasher.write_key(id);
            hasher.write_u64(state.queue.len() as u64);
            hasher.write_u32(state.generated);
        }
        hasher.write_u64(self.stats.generated_units);
        hasher.write_u64(self.stats.delivered_units);
        hasher.write_u64(self.stats.lost_units);
        hasher.finish()
    }

    // -----------------------------------------------------------------------
    // Routing helpers
    // -----------------------------------------------------------------------

    /// Connected output ports of `system` whose wire is free and whose
    /// destination is enabled, in port order.
    pub(crate) fn available_output_ports(&self, system: SystemId) -> Vec<Candidate> {
        let now = self.now_ms();
        let Some(data) = self.topology.system(system) else {
            return Vec::new();
        };
        data.outputs
            .iter()
            .filter_map(|&port| {
                let p = self.topology.port(port)?;
                let wire = p.wire()?;
                if self.wire_occupant.contains_key(wire) {
                    return None;
                }
                let destination = self.topology.wire_destination(wire)?;
                self.is_enabled(destination, now).then_some(Candidate {
                    port,
                    wire,
                    shape: p.shape,
                })
            })
            .collect()
    }

    /// Pick an exit for `packet` at `system`: shuffle the available ports,
    /// then take the first one for volumetric packets, or the first
    /// shape-compatible one (falling back to any) for everything else.
    pub(crate) fn find_available_output_port(
        &mut self,
        system: SystemId,
        packet: PacketId,
    ) -> Option<Candidate> {
        let mut candidates = self.available_output_ports(system);
        self.rng.shuffle(&mut candidates);
        let packet = self.packets.get(packet)?;
        if packet.is_volumetric() {
            return candidates.first().copied();
        }
        candidates
            .iter()
            .find(|c| c.shape.accepts(packet.shape))
            .or_else(|| candidates.first())
            .copied()
    }

    /// Place `id` at the start of `wire`.
    pub(crate) fn launch(&mut self, id: PacketId, port: PortId, wire: WireId, launch: Launch) {
        let port_shape = self.topology.port(port).map_or(Shape::Any, |p| p.shape);
        let start = self
            .topology
            .wire(wire)
            .map_or(Point::ORIGIN, |w| w.path().point_at(Fixed64::ZERO));
        let base = self.config.base_speed;
        let compatible_factor = self.config.compatible_speed_factor;
        let Some(packet) = self.packets.get_mut(id) else {
            return;
        };
        let (speed, accelerating) = match launch {
            Launch::Teleport => (base, false),
            Launch::Exit => exit_speed(packet.shape, port_shape, base, compatible_factor),
        };
        packet.position = start;
        packet.motion = MotionState::OnWire(WireMotion {
            wire,
            distance: Fixed64::ZERO,
            progress: Fixed64::ZERO,
            speed,
            accelerating,
        });
        self.wire_occupant.insert(wire, id);
    }

    /// Route `id` out of `system` now, or queue it.
    pub(crate) fn route_or_enqueue(&mut self, system: SystemId, id: PacketId) {
        match self.find_available_output_port(system, id) {
            Some(candidate) => self.launch(id, candidate.port, candidate.wire, Launch::Exit),
            None => self.enqueue(system, id),
        }
    }

    /// Append `id` to `system`'s queue, or lose it if the queue is full.
    ///
    /// Distributors never reject. Volumetric packets may exceed capacity at
    /// a plain NODE.
    pub(crate) fn enqueue(&mut self, system: SystemId, id: PacketId) {
        let Some(data) = self.topology.system(system) else {
            return;
        };
        let system_type = data.system_type;
        let capacity = data.queue_capacity;
        let position = data.position;
        let volumetric = self.packets.get(id).is_some_and(Packet::is_volumetric);
        let depth = self.system_states.get(system).map_or(0, |s| s.queue.len());

        if !queue_accepts(system_type, depth, capacity, volumetric) {
            self.lose_packet(id, LossReason::QueueOverflow);
            return;
        }
        let Some(packet) = self.packets.get_mut(id) else {
            return;
        };
        packet.motion = MotionState::InQueue { system };
        packet.position = position;
        if let Some(state) = self.system_states.get_mut(system) {
            state.queue.push_back(id);
        }
        self.events.push(Event::PacketQueued {
            packet: id,
            system,
            tick: self.sim_state.tick,
        });
    }

    fn free_wire(&mut self, wire: WireId, id: PacketId) {
        if self.wire_occupant.get(wire) == Some(&id) {
            self.wire_occupant.remove(wire);
        }
    }

    pub(crate) fn violation(&mut self, violation: InvariantViolation) {
        log::error!("tick {}: {violation}", self.sim_state.tick);
        self.violations.push(violation);
    }

    // -----------------------------------------------------------------------
    // Retirement
    // -----------------------------------------------------------------------

    /// Remove `id` from the live set, freeing its wire or queue slot.
    fn take_packet(&mut self, id: PacketId) -> Option<Packet> {
        let packet = self.packets.remove(id)?;
        if let Some(motion) = packet.wire_motion() {
            self.free_wire(motion.wire, id);
        }
        if let Some(state) = packet
            .queued_at()
            .and_then(|system| self.system_states.get_mut(system))
        {
            state.queue.retain(|&p| p != id);
        }
        Some(packet)
    }

    fn retire(&mut self, id: PacketId, packet: &Packet) {
        let snapshot = snapshot_packet(Some(id), packet, &self.topology);
        self.retired.push(snapshot);
    }

    /// The single loss path: every lost packet goes through here.
    pub(crate) fn lose_packet(&mut self, id: PacketId, reason: LossReason) {
        let Some(mut packet) = self.take_packet(id) else {
            return;
        };
        packet.motion = MotionState::Lost(reason);
        self.stats.record_lost(packet.size);
        self.retire(id, &packet);
        self.events.push(Event::PacketLost {
            packet: id,
            reason,
            size: packet.size,
            tick: self.sim_state.tick,
        });
        log::debug!("tick {}: {id:?} lost ({reason:?})", self.sim_state.tick);
    }

    pub(crate) fn deliver(&mut self, id: PacketId, sink: SystemId) {
        let Some(mut packet) = self.take_packet(id) else {
            return;
        };
        packet.motion = MotionState::Delivered;
        self.stats.record_delivered(packet.size);
        self.retire(id, &packet);
        self.events.push(Event::PacketDelivered {
            packet: id,
            sink,
            size: packet.size,
            tick: self.sim_state.tick,
        });
    }

    /// Retire a packet absorbed by a split or merge. Counts as neither loss
    /// nor delivery.
    pub(crate) fn consume(&mut self, id: PacketId) -> Option<Packet> {
        let mut packet = self.take_packet(id)?;
        packet.motion = MotionState::Consumed;
        self.retire(id, &packet);
        Some(packet)
    }

    // -----------------------------------------------------------------------
    // Read model
    // -----------------------------------------------------------------------

    /// One snapshot per packet instance: retired packets in retirement
    /// order, then live packets. With `include_pending`, every packet a
    /// source has yet to generate is appended as `NotYetGenerated`.
    pub fn packet_report(&self, include_pending: bool) -> Vec<PacketSnapshot> {
        let mut report = self.retired.clone();
        report.extend(self.live_packets());
        if include_pending {
            report.extend(self.pending_packets());
        }
        report
    }

    fn live_packets(&self) -> impl Iterator<Item = PacketSnapshot> + '_ {
        self.packets
            .iter()
            .map(|(id, packet)| snapshot_packet(Some(id), packet, &self.topology))
    }

    fn pending_packets(&self) -> Vec<PacketSnapshot> {
        let mut pending = Vec::new();
        for (id, data) in self.topology.systems() {
            let Some(schedule) = &data.generator else {
                continue;
            };
            let generated = self.system_states.get(id).map_or(0, |s| s.generated);
            let port_shape = data
                .outputs
                .first()
                .and_then(|&p| self.topology.port(p))
                .map_or(Shape::Any, |p| p.shape);
            for _ in generated..schedule.total {
                let mut packet = schedule.template.instantiate(port_shape, data.position);
                packet.origin = Some(id);
                pending.push(snapshot_packet(None, &packet, &self.topology));
            }
        }
        pending
    }

    pub fn world_snapshot(&self) -> WorldSnapshot {
        let now = self.now_ms();
        let systems = self
            .topology
            .systems()
            .map(|(id, data)| {
                let state = self.system_states.get(id);
                SystemSnapshot {
                    id,
                    system_type: data.system_type,
                    position: data.position,
                    queue_depth: state.map_or(0, |s| s.queue.len()),
                    buffered_bits: state.map_or(0, SystemState::buffered_bits),
                    all_ports_connected: self.topology.system_fully_wired(id),
                    disabled: !self.is_enabled(id, now),
                }
            })
            .collect();
        WorldSnapshot {
            tick: self.sim_state.tick,
            elapsed_ms: now,
            packets: self.live_packets().collect(),
            systems,
            stats: self.stats,
        }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Initial speed and acceleration flag of a packet leaving through a port.
///
/// A SQUARE through a compatible port is slowed to `base * factor`; a
/// TRIANGLE through an incompatible port accelerates. Everything else runs
/// at `base`.
pub(crate) fn exit_speed(
    packet: Shape,
    port: Shape,
    base: Fixed64,
    compatible_factor: Fixed64,
) -> (Fixed64, bool) {
    let compatible = port.accepts(packet);
    match packet {
        Shape::Square if compatible => (base * compatible_factor, false),
        Shape::Triangle if !compatible => (base, true),
        _ => (base, false),
    }
}

/// Whether a queue of `depth` packets can take one more.
pub(crate) fn queue_accepts(
    system_type: crate::topology::SystemType,
    depth: usize,
    capacity: usize,
    volumetric: bool,
) -> bool {
    use crate::topology::SystemType;
    system_type == SystemType::Distributor
        || depth < capacity
        || (volumetric && system_type == SystemType::Node)
}

fn status_of(motion: &MotionState) -> PacketStatus {
    match motion {
        MotionState::NotYetGenerated => PacketStatus::NotYetGenerated,
        MotionState::OnWire(_) => PacketStatus::OnWire,
        MotionState::InQueue { .. } => PacketStatus::InQueue,
        MotionState::Delivered => PacketStatus::Delivered,
        MotionState::Lost(reason) => PacketStatus::Lost(*reason),
        MotionState::Consumed => PacketStatus::Consumed,
    }
}

fn snapshot_packet(id: Option<PacketId>, packet: &Packet, topology: &Topology) -> PacketSnapshot {
    let motion = packet.wire_motion();
    let velocity = motion
        .and_then(|m| {
            let dir = topology.wire(m.wire)?.path().direction_at(m.distance);
            let speed = m.speed.saturating_mul(packet.speed_factor);
            Some(Point::new(
                dir.x.saturating_mul(speed),
                dir.y.saturating_mul(speed),
            ))
        })
        .unwrap_or(Point::ORIGIN);
    PacketSnapshot {
        id,
        shape: packet.shape,
        semantic: packet.semantic,
        size: packet.size,
        status: status_of(&packet.motion),
        position: packet.position,
        velocity,
        progress: motion.map_or(Fixed64::ZERO, |m| m.progress),
        noise: packet.noise,
        wire: motion.map(|m| m.wire),
        queued_at: packet.queued_at(),
        origin: packet.origin,
    }
}
