//! Per-system-type routing rules.
//!
//! [`Behavior`] is a closed set selected from the [`SystemType`] when a
//! packet arrives. Every variant shares the routing helpers on
//! [`World`]; only `receive` differs.

use crate::event::Event;
use crate::id::{PacketId, SystemId};
use crate::packet::{BitTag, LossReason, MotionState, Packet, SemanticType};
use crate::topology::SystemType;
use crate::world::{InvariantViolation, Launch, World};

/// How a system handles an arriving packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Behavior {
    /// Never receives.
    Source,
    /// Consumes packets that match one of its input shapes.
    Sink,
    /// Forwards or queues (NODE, ANTITROJAN).
    Relay,
    /// Splits BULK packets into BITs.
    Distributor,
    /// Reassembles BITs into BULK packets.
    Merger,
    /// Strips protection, destroys secrets, teleports everything else.
    Spy,
}

impl Behavior {
    /// The behavior for a system type, or `None` for types with no routing
    /// rules.
    pub fn for_type(system_type: SystemType) -> Option<Self> {
        match system_type {
            SystemType::Source => Some(Behavior::Source),
            SystemType::Sink => Some(Behavior::Sink),
            SystemType::Node | SystemType::AntiTrojan => Some(Behavior::Relay),
            SystemType::Distributor => Some(Behavior::Distributor),
            SystemType::Merger => Some(Behavior::Merger),
            SystemType::Spy => Some(Behavior::Spy),
            SystemType::Corruptor | SystemType::Vpn => None,
        }
    }
}

impl World {
    /// Hand an arriving packet to `system`'s behavior.
    pub(crate) fn receive(&mut self, system: SystemId, packet: PacketId) {
        let behavior = self
            .topology
            .system(system)
            .and_then(|data| Behavior::for_type(data.system_type));
        match behavior {
            Some(Behavior::Source) => {
                self.violation(InvariantViolation::SourceReceived { system, packet });
                self.lose_packet(packet, LossReason::Misrouted);
            }
            Some(Behavior::Sink) => self.sink_receive(system, packet),
            Some(Behavior::Relay) => self.route_or_enqueue(system, packet),
            Some(Behavior::Distributor) => self.distributor_receive(system, packet),
            Some(Behavior::Merger) => self.merger_receive(system, packet),
            Some(Behavior::Spy) => self.spy_receive(system, packet),
            None => {
                self.violation(InvariantViolation::NoBehavior { system, packet });
                self.lose_packet(packet, LossReason::Misrouted);
            }
        }
    }

    fn sink_receive(&mut self, sink: SystemId, id: PacketId) {
        let Some(packet) = self.packets.get(id) else {
            return;
        };
        if packet.is_bulk() || packet.is_bit() {
            self.lose_packet(id, LossReason::Unassembled);
            return;
        }
        let shape = packet.shape;
        let accepted = self.topology.system(sink).is_some_and(|data| {
            data.inputs
                .iter()
                .filter_map(|&p| self.topology.port(p))
                .any(|port| port.shape.accepts(shape))
        });
        if accepted {
            self.deliver(id, sink);
        } else {
            self.lose_packet(id, LossReason::ShapeMismatch);
        }
    }

    fn distributor_receive(&mut self, system: SystemId, id: PacketId) {
        if !self.packets.get(id).is_some_and(Packet::is_bulk) {
            self.route_or_enqueue(system, id);
            return;
        }
        let Some(bulk) = self.consume(id) else {
            return;
        };
        let tag = BitTag {
            bulk_parent: id,
            group_size: bulk.size,
        };
        let bits: Vec<PacketId> = (0..bulk.size)
            .map(|_| {
                let mut bit = Packet::bit(tag, bulk.shape, bulk.position);
                bit.origin = bulk.origin;
                self.packets.insert(bit)
            })
            .collect();
        self.events.push(Event::BulkSplit {
            bulk: id,
            system,
            bits: bulk.size,
            tick: self.sim_state.tick,
        });
        log::debug!(
            "tick {}: {system:?} split {id:?} into {} bits",
            self.sim_state.tick,
            bulk.size
        );
        for bit in bits {
            self.route_or_enqueue(system, bit);
        }
    }

    fn merger_receive(&mut self, system: SystemId, id: PacketId) {
        let Some(tag) = self.packets.get(id).and_then(|p| p.bit) else {
            self.route_or_enqueue(system, id);
            return;
        };
        let Some(position) = self.topology.system(system).map(|d| d.position) else {
            return;
        };
        if let Some(packet) = self.packets.get_mut(id) {
            packet.motion = MotionState::InQueue { system };
            packet.position = position;
        }
        let Some(state) = self.system_states.get_mut(system) else {
            return;
        };
        let group = state.merge_buffer.entry(tag.bulk_parent).or_default();
        group.push(id);
        if (group.len() as u32) < tag.group_size {
            return;
        }
        let bits = state
            .merge_buffer
            .remove(&tag.bulk_parent)
            .unwrap_or_default();

        let mut first = None;
        for bit in &bits {
            if let Some(consumed) = self.consume(*bit) {
                first.get_or_insert(consumed);
            }
        }
        let Some(first) = first else {
            return;
        };
        let mut bulk = Packet::bulk(first.shape, tag.group_size, position);
        bulk.origin = first.origin;
        let bulk_id = self.packets.insert(bulk);
        self.events.push(Event::BulkMerged {
            bulk: bulk_id,
            system,
            bits: tag.group_size,
            tick: self.sim_state.tick,
        });
        log::debug!(
            "tick {}: {system:?} merged {} bits into {bulk_id:?}",
            self.sim_state.tick,
            bits.len()
        );
        self.enqueue(system, bulk_id);
    }

    fn spy_receive(&mut self, system: SystemId, id: PacketId) {
        let Some(packet) = self.packets.get_mut(id) else {
            return;
        };
        packet.remove_protection();
        if packet.semantic == SemanticType::Secret {
            self.lose_packet(id, LossReason::DestroyedBySpy);
            return;
        }

        let now = self.now_ms();
        let mut spies: Vec<SystemId> = self
            .topology
            .systems()
            .filter(|&(other, data)| data.system_type == SystemType::Spy && other != system)
            .map(|(other, _)| other)
            .filter(|&other| self.is_enabled(other, now))
            .collect();
        self.rng.shuffle(&mut spies);

        for target in spies {
            let mut ports = self.available_output_ports(target);
            self.rng.shuffle(&mut ports);
            if let Some(candidate) = ports.first() {
                self.launch(id, candidate.port, candidate.wire, Launch::Teleport);
                self.events.push(Event::PacketTeleported {
                    packet: id,
                    from: system,
                    to: target,
                    tick: self.sim_state.tick,
                });
                log::debug!(
                    "tick {}: {id:?} teleported {system:?} -> {target:?}",
                    self.sim_state.tick
                );
                return;
            }
        }
        self.lose_packet(id, LossReason::InvalidTeleportTarget);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::fixed::{Fixed64, f64_to_fixed64};
    use crate::geom::Point;
    use crate::packet::PacketTemplate;
    use crate::query::PacketStatus;
    use crate::topology::{PortDirection, Shape, Topology};

    /// A world whose packets are inserted by hand and delivered straight
    /// into `receive`.
    fn world_with(build: impl FnOnce(&mut Topology)) -> World {
        let config = SimConfig::default();
        let mut t = Topology::new(&config);
        build(&mut t);
        World::new(t, config)
    }

    fn insert(world: &mut World, packet: Packet) -> PacketId {
        world.packets.insert(packet)
    }

    fn normal(shape: Shape) -> Packet {
        PacketTemplate::normal().instantiate(shape, Point::ORIGIN)
    }

    fn sink_world(input: Shape) -> (World, SystemId) {
        let mut sink = None;
        let world = world_with(|t| {
            let s = t.add_system(SystemType::Sink, Point::ORIGIN).unwrap();
            t.add_port(s, PortDirection::In, input).unwrap();
            sink = Some(s);
        });
        (world, sink.unwrap())
    }

    #[test]
    fn behavior_table() {
        assert_eq!(Behavior::for_type(SystemType::AntiTrojan), Some(Behavior::Relay));
        assert_eq!(Behavior::for_type(SystemType::Node), Some(Behavior::Relay));
        assert_eq!(Behavior::for_type(SystemType::Corruptor), None);
        assert_eq!(Behavior::for_type(SystemType::Vpn), None);
    }

    #[test]
    fn sink_delivers_matching_shape() {
        let (mut world, sink) = sink_world(Shape::Circle);
        let id = insert(&mut world, normal(Shape::Circle));
        world.receive(sink, id);
        assert_eq!(world.stats.delivered_units, 1);
        assert_eq!(world.stats.coins, 1);
        assert_eq!(world.retired[0].status, PacketStatus::Delivered);
    }

    #[test]
    fn sink_rejects_mismatched_shape() {
        let (mut world, sink) = sink_world(Shape::Square);
        let id = insert(&mut world, normal(Shape::Triangle));
        world.receive(sink, id);
        assert_eq!(world.stats.lost_units, 3);
        assert_eq!(
            world.retired[0].status,
            PacketStatus::Lost(LossReason::ShapeMismatch)
        );
    }

    #[test]
    fn any_input_accepts_every_shape() {
        let (mut world, sink) = sink_world(Shape::Any);
        let id = insert(&mut world, normal(Shape::Triangle));
        world.receive(sink, id);
        assert_eq!(world.stats.delivered_units, 3);
    }

    #[test]
    fn sink_rejects_bulk_and_bits() {
        let (mut world, sink) = sink_world(Shape::Any);
        let bulk = insert(&mut world, Packet::bulk(Shape::Square, 8, Point::ORIGIN));
        world.receive(sink, bulk);
        assert_eq!(
            world.retired[0].status,
            PacketStatus::Lost(LossReason::Unassembled)
        );
        assert_eq!(world.stats.lost_units, 8);
    }

    #[test]
    fn source_receiving_is_a_violation() {
        let mut src = None;
        let mut world = world_with(|t| {
            src = Some(t.add_system(SystemType::Source, Point::ORIGIN).unwrap());
        });
        let src = src.unwrap();
        let id = insert(&mut world, normal(Shape::Square));
        world.receive(src, id);
        assert_eq!(
            world.violations(),
            &[InvariantViolation::SourceReceived {
                system: src,
                packet: id
            }]
        );
        assert_eq!(
            world.retired[0].status,
            PacketStatus::Lost(LossReason::Misrouted)
        );
    }

    #[test]
    fn distributor_splits_bulk_into_size_bits() {
        let mut dist = None;
        let mut world = world_with(|t| {
            dist = Some(t.add_system(SystemType::Distributor, Point::ORIGIN).unwrap());
        });
        let dist = dist.unwrap();
        let bulk = insert(&mut world, Packet::bulk(Shape::Circle, 6, Point::ORIGIN));
        world.receive(dist, bulk);

        // No outputs: every bit is queued, none rejected.
        let queued: Vec<PacketId> = world.queue(dist).collect();
        assert_eq!(queued.len(), 6);
        for id in queued {
            let bit = world.packet(id).unwrap();
            assert_eq!(bit.semantic, SemanticType::Bit);
            assert_eq!(bit.shape, Shape::Circle);
            assert_eq!(
                bit.bit,
                Some(BitTag {
                    bulk_parent: bulk,
                    group_size: 6
                })
            );
        }
        assert_eq!(world.retired[0].status, PacketStatus::Consumed);
        assert_eq!(world.stats.lost_units, 0);
    }

    #[test]
    fn merger_reassembles_complete_group() {
        let mut merger = None;
        let mut world = world_with(|t| {
            merger = Some(t.add_system(SystemType::Merger, Point::ORIGIN).unwrap());
        });
        let merger = merger.unwrap();
        let parent = insert(&mut world, Packet::bulk(Shape::Square, 3, Point::ORIGIN));
        world.consume(parent);
        let tag = BitTag {
            bulk_parent: parent,
            group_size: 3,
        };
        let bits: Vec<PacketId> = (0..3)
            .map(|_| insert(&mut world, Packet::bit(tag, Shape::Square, Point::ORIGIN)))
            .collect();

        world.receive(merger, bits[0]);
        world.receive(merger, bits[1]);
        assert_eq!(world.system_state(merger).unwrap().buffered_bits(), 2);
        assert_eq!(world.queue(merger).count(), 0);
        assert_eq!(world.packet(bits[0]).unwrap().queued_at(), Some(merger));

        world.receive(merger, bits[2]);
        assert_eq!(world.system_state(merger).unwrap().buffered_bits(), 0);
        for bit in &bits {
            assert!(world.packet(*bit).is_none());
        }
        let queued: Vec<PacketId> = world.queue(merger).collect();
        assert_eq!(queued.len(), 1);
        let bulk = world.packet(queued[0]).unwrap();
        assert_eq!(bulk.semantic, SemanticType::Bulk);
        assert_eq!(bulk.size, 3);
    }

    #[test]
    fn spy_destroys_secret() {
        let mut spy = None;
        let mut world = world_with(|t| {
            spy = Some(t.add_system(SystemType::Spy, Point::ORIGIN).unwrap());
        });
        let spy = spy.unwrap();
        let id = insert(
            &mut world,
            PacketTemplate::of(SemanticType::Secret).instantiate(Shape::Square, Point::ORIGIN),
        );
        world.receive(spy, id);
        assert_eq!(
            world.retired[0].status,
            PacketStatus::Lost(LossReason::DestroyedBySpy)
        );
        assert_eq!(world.stats.lost_units, 4);
    }

    #[test]
    fn spy_without_partner_loses_packet() {
        let mut spy = None;
        let mut world = world_with(|t| {
            spy = Some(t.add_system(SystemType::Spy, Point::ORIGIN).unwrap());
        });
        let spy = spy.unwrap();
        let id = insert(&mut world, normal(Shape::Square));
        world.receive(spy, id);
        assert_eq!(
            world.retired[0].status,
            PacketStatus::Lost(LossReason::InvalidTeleportTarget)
        );
    }

    #[test]
    fn spy_teleports_at_base_speed() {
        let mut ids = None;
        let mut world = world_with(|t| {
            let a = t.add_system(SystemType::Spy, Point::from_f64(0.0, 0.0)).unwrap();
            let b = t.add_system(SystemType::Spy, Point::from_f64(0.0, 300.0)).unwrap();
            let sink = t.add_system(SystemType::Sink, Point::from_f64(200.0, 300.0)).unwrap();
            let out = t.add_port(b, PortDirection::Out, Shape::Square).unwrap();
            let inp = t.add_port(sink, PortDirection::In, Shape::Square).unwrap();
            let wire = t.connect(out, inp).unwrap();
            ids = Some((a, b, wire));
        });
        let (a, _, wire) = ids.unwrap();
        let id = insert(&mut world, normal(Shape::Square));
        world.receive(a, id);
        let motion = world.packet(id).unwrap().wire_motion().copied().unwrap();
        assert_eq!(motion.wire, wire);
        // A compatible SQUARE exit would be slowed; a teleport is not.
        assert_eq!(motion.speed, f64_to_fixed64(2.0));
        assert!(!motion.accelerating);
    }

    #[test]
    fn spy_unwraps_protected_before_routing() {
        let mut ids = None;
        let mut world = world_with(|t| {
            let a = t.add_system(SystemType::Spy, Point::ORIGIN).unwrap();
            let b = t.add_system(SystemType::Spy, Point::from_f64(0.0, 300.0)).unwrap();
            let sink = t.add_system(SystemType::Sink, Point::from_f64(200.0, 300.0)).unwrap();
            let out = t.add_port(b, PortDirection::Out, Shape::Square).unwrap();
            let inp = t.add_port(sink, PortDirection::In, Shape::Square).unwrap();
            t.connect(out, inp).unwrap();
            ids = Some(a);
        });
        let a = ids.unwrap();

        let protected_secret = insert(
            &mut world,
            PacketTemplate::protected(SemanticType::Secret).instantiate(Shape::Square, Point::ORIGIN),
        );
        world.receive(a, protected_secret);
        assert_eq!(
            world.retired[0].status,
            PacketStatus::Lost(LossReason::DestroyedBySpy)
        );

        let protected_normal = insert(
            &mut world,
            PacketTemplate::protected(SemanticType::Normal).instantiate(Shape::Square, Point::ORIGIN),
        );
        world.receive(a, protected_normal);
        let packet = world.packet(protected_normal).unwrap();
        assert_eq!(packet.semantic, SemanticType::Normal);
        assert!(packet.is_on_wire());
        assert_eq!(packet.noise, Fixed64::ZERO);
    }
}
