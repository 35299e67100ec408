//! The static network: systems, their ports, and the wires between them.
//!
//! Everything here is edited before a run starts and is read-only while the
//! tick loop runs. Systems, ports and wires live in `SlotMap` arenas and
//! refer to each other by key, so cloning a topology for a prediction is a
//! plain `Clone`.

use crate::config::SimConfig;
use crate::fixed::{Fixed64, fixed_from_u32};
use crate::geom::{Point, Polyline};
use crate::id::{PortId, SystemId, WireId};
use crate::packet::PacketTemplate;
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors returned by editor commands and by [`Topology::validate`]. No
/// state is mutated when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("port already connected: {0:?}")]
    AlreadyConnected(PortId),
    #[error("cannot connect two ports of the same direction")]
    SamePortDirection,
    #[error("cannot wire a system to itself")]
    SameParentSystem,
    #[error("{role:?} systems cannot carry {direction:?} ports")]
    PortDirectionNotAllowed {
        role: SystemRole,
        direction: PortDirection,
    },
    #[error("system type {0:?} has no defined behavior")]
    UnsupportedSystemType(SystemType),
    #[error("system {0:?} is not a source")]
    NotASource(SystemId),
    #[error("system not found: {0:?}")]
    SystemNotFound(SystemId),
    #[error("port not found: {0:?}")]
    PortNotFound(PortId),
    #[error("wire not found: {0:?}")]
    WireNotFound(WireId),
    #[error("waypoint index {index} out of range for wire {wire:?}")]
    WaypointOutOfRange { wire: WireId, index: usize },
    #[error("port {0:?} disagrees with its system or wire")]
    CorruptPort(PortId),
    #[error("wire {0:?} does not join an output to an input")]
    CorruptWire(WireId),
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    In,
    Out,
}

/// Packet and port shapes. `Any` only appears on ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    Square,
    Triangle,
    Circle,
    Any,
}

impl Shape {
    /// Whether a port of this shape is compatible with a packet of `packet`
    /// shape.
    pub fn accepts(self, packet: Shape) -> bool {
        self == Shape::Any || self == packet
    }
}

/// Which port directions a system carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemRole {
    Source,
    Sink,
    Node,
}

/// The closed set of system types. The type selects the routing behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemType {
    Source,
    Sink,
    Node,
    AntiTrojan,
    Distributor,
    Merger,
    Spy,
    Corruptor,
    Vpn,
}

impl SystemType {
    pub fn role(self) -> SystemRole {
        match self {
            SystemType::Source => SystemRole::Source,
            SystemType::Sink => SystemRole::Sink,
            _ => SystemRole::Node,
        }
    }

    /// Corruptor and VPN systems are named by level data but have no
    /// routing rules, so they cannot be placed.
    pub fn is_supported(self) -> bool {
        !matches!(self, SystemType::Corruptor | SystemType::Vpn)
    }
}

impl SystemRole {
    pub fn allows(self, direction: PortDirection) -> bool {
        match self {
            SystemRole::Source => direction == PortDirection::Out,
            SystemRole::Sink => direction == PortDirection::In,
            SystemRole::Node => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Core data structures
// ---------------------------------------------------------------------------

/// Packet generation plan for a source system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorSchedule {
    /// Packets to generate over the whole run.
    pub total: u32,
    /// Minimum virtual milliseconds between two generated packets.
    pub period_ms: u64,
    /// What each generated packet looks like.
    pub template: PacketTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortData {
    pub direction: PortDirection,
    pub shape: Shape,
    pub system: SystemId,
    /// Board position, derived from the owning system's layout.
    pub position: Point,
    /// The wire attached to this port. Set and cleared only by
    /// `connect`/`disconnect`.
    wire: Option<WireId>,
}

impl PortData {
    pub fn is_connected(&self) -> bool {
        self.wire.is_some()
    }

    pub fn wire(&self) -> Option<WireId> {
        self.wire
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemData {
    pub system_type: SystemType,
    /// Center of the system on the board.
    pub position: Point,
    pub inputs: Vec<PortId>,
    pub outputs: Vec<PortId>,
    /// Inbound queue capacity. Ignored by distributors.
    pub queue_capacity: usize,
    pub generator: Option<GeneratorSchedule>,
}

impl SystemData {
    pub fn role(&self) -> SystemRole {
        self.system_type.role()
    }

    fn ports(&self, direction: PortDirection) -> &[PortId] {
        match direction {
            PortDirection::In => &self.inputs,
            PortDirection::Out => &self.outputs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireData {
    /// Output port the wire leaves from.
    pub start: PortId,
    /// Input port the wire arrives at.
    pub end: PortId,
    waypoints: Vec<Point>,
    path: Polyline,
}

impl WireData {
    pub fn waypoints(&self) -> &[Point] {
        &self.waypoints
    }

    pub fn path(&self) -> &Polyline {
        &self.path
    }

    pub fn length(&self) -> Fixed64 {
        self.path.length()
    }
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// The editable network graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    systems: SlotMap<SystemId, SystemData>,
    ports: SlotMap<PortId, PortData>,
    wires: SlotMap<WireId, WireData>,
    system_width: Fixed64,
    system_height: Fixed64,
    default_queue_capacity: usize,
}

impl Default for Topology {
    fn default() -> Self {
        Self::new(&SimConfig::default())
    }
}

impl Topology {
    /// Create an empty topology using the footprint and queue capacity from
    /// `config`.
    pub fn new(config: &SimConfig) -> Self {
        Self {
            systems: SlotMap::with_key(),
            ports: SlotMap::with_key(),
            wires: SlotMap::with_key(),
            system_width: config.system_width,
            system_height: config.system_height,
            default_queue_capacity: config.queue_capacity,
        }
    }

    // -----------------------------------------------------------------------
    // Systems
    // -----------------------------------------------------------------------

    pub fn add_system(
        &mut self,
        system_type: SystemType,
        position: Point,
    ) -> Result<SystemId, TopologyError> {
        if !system_type.is_supported() {
            return Err(TopologyError::UnsupportedSystemType(system_type));
        }
        Ok(self.systems.insert(SystemData {
            system_type,
            position,
            inputs: Vec::new(),
            outputs: Vec::new(),
            queue_capacity: self.default_queue_capacity,
            generator: None,
        }))
    }

    pub fn set_queue_capacity(
        &mut self,
        system: SystemId,
        capacity: usize,
    ) -> Result<(), TopologyError> {
        let data = self
            .systems
            .get_mut(system)
            .ok_or(TopologyError::SystemNotFound(system))?;
        data.queue_capacity = capacity;
        Ok(())
    }

    pub fn set_generator(
        &mut self,
        system: SystemId,
        schedule: GeneratorSchedule,
    ) -> Result<(), TopologyError> {
        let data = self
            .systems
            .get_mut(system)
            .ok_or(TopologyError::SystemNotFound(system))?;
        if data.role() != SystemRole::Source {
            return Err(TopologyError::NotASource(system));
        }
        data.generator = Some(schedule);
        Ok(())
    }

    /// Move a system. Its ports and every wire touching them are re-laid
    /// out.
    pub fn move_system(&mut self, system: SystemId, position: Point) -> Result<(), TopologyError> {
        let data = self
            .systems
            .get_mut(system)
            .ok_or(TopologyError::SystemNotFound(system))?;
        data.position = position;
        self.relayout_system(system);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Ports
    // -----------------------------------------------------------------------

    pub fn add_port(
        &mut self,
        system: SystemId,
        direction: PortDirection,
        shape: Shape,
    ) -> Result<PortId, TopologyError> {
        let data = self
            .systems
            .get(system)
            .ok_or(TopologyError::SystemNotFound(system))?;
        let role = data.role();
        if !role.allows(direction) {
            return Err(TopologyError::PortDirectionNotAllowed { role, direction });
        }
        let port = self.ports.insert(PortData {
            direction,
            shape,
            system,
            position: data.position,
            wire: None,
        });
        if let Some(data) = self.systems.get_mut(system) {
            match direction {
                PortDirection::In => data.inputs.push(port),
                PortDirection::Out => data.outputs.push(port),
            }
        }
        self.relayout_system(system);
        Ok(port)
    }

    /// Remove a port, disconnecting its wire first.
    pub fn remove_port(&mut self, port: PortId) -> Result<(), TopologyError> {
        let data = self.ports.get(port).ok_or(TopologyError::PortNotFound(port))?;
        let system = data.system;
        let wire = data.wire;
        if let Some(wire) = wire {
            self.disconnect(wire)?;
        }
        self.ports.remove(port);
        if let Some(data) = self.systems.get_mut(system) {
            data.inputs.retain(|&p| p != port);
            data.outputs.retain(|&p| p != port);
        }
        self.relayout_system(system);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Wires
    // -----------------------------------------------------------------------

    /// Wire an output port to an input port. The two ports may be given in
    /// either order.
    pub fn connect(&mut self, a: PortId, b: PortId) -> Result<WireId, TopologyError> {
        let pa = self.ports.get(a).ok_or(TopologyError::PortNotFound(a))?;
        let pb = self.ports.get(b).ok_or(TopologyError::PortNotFound(b))?;
        if pa.direction == pb.direction {
            return Err(TopologyError::SamePortDirection);
        }
        if pa.is_connected() {
            return Err(TopologyError::AlreadyConnected(a));
        }
        if pb.is_connected() {
            return Err(TopologyError::AlreadyConnected(b));
        }
        if pa.system == pb.system {
            return Err(TopologyError::SameParentSystem);
        }
        let (start, end) = if pa.direction == PortDirection::Out {
            (a, b)
        } else {
            (b, a)
        };
        let path = Polyline::new(vec![self.ports[start].position, self.ports[end].position]);
        let wire = self.wires.insert(WireData {
            start,
            end,
            waypoints: Vec::new(),
            path,
        });
        self.ports[start].wire = Some(wire);
        self.ports[end].wire = Some(wire);
        Ok(wire)
    }

    pub fn disconnect(&mut self, wire: WireId) -> Result<(), TopologyError> {
        let data = self
            .wires
            .remove(wire)
            .ok_or(TopologyError::WireNotFound(wire))?;
        for port in [data.start, data.end] {
            if let Some(p) = self.ports.get_mut(port) {
                p.wire = None;
            }
        }
        Ok(())
    }

    pub fn insert_waypoint(
        &mut self,
        wire: WireId,
        index: usize,
        point: Point,
    ) -> Result<(), TopologyError> {
        let data = self
            .wires
            .get_mut(wire)
            .ok_or(TopologyError::WireNotFound(wire))?;
        if index > data.waypoints.len() {
            return Err(TopologyError::WaypointOutOfRange { wire, index });
        }
        data.waypoints.insert(index, point);
        self.rebuild_path(wire);
        Ok(())
    }

    pub fn move_waypoint(
        &mut self,
        wire: WireId,
        index: usize,
        point: Point,
    ) -> Result<(), TopologyError> {
        let data = self
            .wires
            .get_mut(wire)
            .ok_or(TopologyError::WireNotFound(wire))?;
        let slot = data
            .waypoints
            .get_mut(index)
            .ok_or(TopologyError::WaypointOutOfRange { wire, index })?;
        *slot = point;
        self.rebuild_path(wire);
        Ok(())
    }

    pub fn delete_waypoint(&mut self, wire: WireId, index: usize) -> Result<(), TopologyError> {
        let data = self
            .wires
            .get_mut(wire)
            .ok_or(TopologyError::WireNotFound(wire))?;
        if index >= data.waypoints.len() {
            return Err(TopologyError::WaypointOutOfRange { wire, index });
        }
        data.waypoints.remove(index);
        self.rebuild_path(wire);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------------

    /// Spread a system's ports evenly along its left (inputs) and right
    /// (outputs) edges, then refresh every wire attached to them.
    fn relayout_system(&mut self, system: SystemId) {
        let Some(data) = self.systems.get(system) else {
            return;
        };
        let half_w = self.system_width / 2;
        let half_h = self.system_height / 2;
        let mut placements = Vec::with_capacity(data.inputs.len() + data.outputs.len());
        for direction in [PortDirection::In, PortDirection::Out] {
            let ports = data.ports(direction);
            let x = match direction {
                PortDirection::In => data.position.x.saturating_sub(half_w),
                PortDirection::Out => data.position.x.saturating_add(half_w),
            };
            let slots = fixed_from_u32(ports.len() as u32 + 1);
            for (i, &port) in ports.iter().enumerate() {
                let offset = self.system_height.saturating_mul(fixed_from_u32(i as u32 + 1)) / slots;
                let y = data.position.y.saturating_sub(half_h).saturating_add(offset);
                placements.push((port, Point::new(x, y)));
            }
        }

        let mut touched = Vec::new();
        for (port, position) in placements {
            if let Some(p) = self.ports.get_mut(port) {
                p.position = position;
                if let Some(wire) = p.wire {
                    touched.push(wire);
                }
            }
        }
        for wire in touched {
            self.rebuild_path(wire);
        }
    }

    /// Recompute every port position and wire path from the system
    /// positions.
    pub(crate) fn relayout_all(&mut self) {
        let systems: Vec<SystemId> = self.systems.keys().collect();
        for system in systems {
            self.relayout_system(system);
        }
    }

    fn rebuild_path(&mut self, wire: WireId) {
        let Some(data) = self.wires.get(wire) else {
            return;
        };
        let (Some(start), Some(end)) = (self.ports.get(data.start), self.ports.get(data.end)) else {
            return;
        };
        let mut points = Vec::with_capacity(data.waypoints.len() + 2);
        points.push(start.position);
        points.extend_from_slice(&data.waypoints);
        points.push(end.position);
        if let Some(data) = self.wires.get_mut(wire) {
            data.path = Polyline::new(points);
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Check that the three arenas agree. Every port is listed once, by its
    /// own system, under its own direction. Every wire joins an output to an
    /// input on another system, and both ports point back at it.
    ///
    /// Editor commands keep this true; decoded levels must be checked.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let mut listed: SecondaryMap<PortId, ()> = SecondaryMap::new();
        for (id, data) in &self.systems {
            if !data.system_type.is_supported() {
                return Err(TopologyError::UnsupportedSystemType(data.system_type));
            }
            let role = data.role();
            if data.generator.is_some() && role != SystemRole::Source {
                return Err(TopologyError::NotASource(id));
            }
            for direction in [PortDirection::In, PortDirection::Out] {
                let ports = data.ports(direction);
                if !ports.is_empty() && !role.allows(direction) {
                    return Err(TopologyError::PortDirectionNotAllowed { role, direction });
                }
                for &port in ports {
                    let p = self.ports.get(port).ok_or(TopologyError::PortNotFound(port))?;
                    if p.system != id
                        || p.direction != direction
                        || listed.insert(port, ()).is_some()
                    {
                        return Err(TopologyError::CorruptPort(port));
                    }
                }
            }
        }

        for (id, port) in &self.ports {
            if !listed.contains_key(id) {
                return Err(TopologyError::CorruptPort(id));
            }
            if let Some(wire) = port.wire {
                let w = self.wires.get(wire).ok_or(TopologyError::WireNotFound(wire))?;
                if w.start != id && w.end != id {
                    return Err(TopologyError::CorruptPort(id));
                }
            }
        }

        for (id, wire) in &self.wires {
            let start = self
                .ports
                .get(wire.start)
                .ok_or(TopologyError::PortNotFound(wire.start))?;
            let end = self
                .ports
                .get(wire.end)
                .ok_or(TopologyError::PortNotFound(wire.end))?;
            if start.direction != PortDirection::Out
                || end.direction != PortDirection::In
                || start.wire != Some(id)
                || end.wire != Some(id)
            {
                return Err(TopologyError::CorruptWire(id));
            }
            if start.system == end.system {
                return Err(TopologyError::SameParentSystem);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn system(&self, system: SystemId) -> Option<&SystemData> {
        self.systems.get(system)
    }

    pub fn port(&self, port: PortId) -> Option<&PortData> {
        self.ports.get(port)
    }

    pub fn wire(&self, wire: WireId) -> Option<&WireData> {
        self.wires.get(wire)
    }

    pub fn systems(&self) -> impl Iterator<Item = (SystemId, &SystemData)> {
        self.systems.iter()
    }

    pub fn ports(&self) -> impl Iterator<Item = (PortId, &PortData)> {
        self.ports.iter()
    }

    pub fn wires(&self) -> impl Iterator<Item = (WireId, &WireData)> {
        self.wires.iter()
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    /// The system a wire delivers into.
    pub fn wire_destination(&self, wire: WireId) -> Option<SystemId> {
        let data = self.wires.get(wire)?;
        self.ports.get(data.end).map(|p| p.system)
    }

    /// The system a wire leaves from.
    pub fn wire_origin(&self, wire: WireId) -> Option<SystemId> {
        let data = self.wires.get(wire)?;
        self.ports.get(data.start).map(|p| p.system)
    }

    /// Whether every port on `system` has a wire.
    pub fn system_fully_wired(&self, system: SystemId) -> bool {
        self.systems.get(system).is_some_and(|data| {
            data.inputs
                .iter()
                .chain(data.outputs.iter())
                .all(|&p| self.ports.get(p).is_some_and(PortData::is_connected))
        })
    }
}
