//! Packets: the units of data that move across wires.
//!
//! A packet owns its motion state but no reference to the topology or to
//! any renderer. Routing code asks it routing questions ([`Packet::is_volumetric`],
//! [`Packet::noise_exceeded`]); the read model asks it drawing questions
//! (position, progress, noise).

use crate::fixed::{Fixed64, fixed_from_u32};
use crate::geom::Point;
use crate::id::{PacketId, SystemId, WireId};
use crate::topology::Shape;
use serde::{Deserialize, Serialize};

/// What a packet means to the systems that handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemanticType {
    Normal,
    /// Wraps another type; a spy strips the wrapper.
    Protected,
    Secret,
    Trojan,
    Bulk,
    /// A fragment of a split bulk packet.
    Bit,
    Messenger,
    Wobble,
}

/// Why a packet was lost. Every loss goes through one path and only differs
/// in this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LossReason {
    /// Accumulated noise reached the packet's size.
    Noise,
    /// No input port on the sink matches the packet's shape.
    ShapeMismatch,
    /// Bulk and bit packets must be reassembled before reaching a sink.
    Unassembled,
    /// The destination queue was full.
    QueueOverflow,
    /// The destination system was disabled on arrival.
    UnreachableDestination,
    /// A spy destroyed a secret packet.
    DestroyedBySpy,
    /// A spy found no other spy with a free output port.
    InvalidTeleportTarget,
    /// The packet reached a system that can never receive (an engine bug).
    Misrouted,
}

/// Tag carried by BIT packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitTag {
    /// The bulk packet this bit was split from.
    pub bulk_parent: PacketId,
    /// How many bits the bulk was split into.
    pub group_size: u32,
}

/// Motion along a wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMotion {
    pub wire: WireId,
    /// Distance travelled from the wire's start.
    pub distance: Fixed64,
    /// `distance / length`, in [0, 1].
    pub progress: Fixed64,
    /// Current speed in board units per tick.
    pub speed: Fixed64,
    /// Whether speed grows each tick.
    pub accelerating: bool,
}

/// Where a packet is. A live packet is in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionState {
    /// Scheduled by a source but not generated yet (predictions only).
    NotYetGenerated,
    OnWire(WireMotion),
    /// Held by a system, either in its FIFO queue or in a merge buffer.
    InQueue { system: SystemId },
    Delivered,
    Lost(LossReason),
    /// Absorbed into another packet (bulk split, bits merged).
    Consumed,
}

impl MotionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MotionState::Delivered | MotionState::Lost(_) | MotionState::Consumed
        )
    }
}

/// Blueprint for packets a source generates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketTemplate {
    pub semantic: SemanticType,
    /// Fixed shape, or `None` to take the shape of the exit port.
    pub shape: Option<Shape>,
    /// Explicit size, or `None` for the default size of shape and type.
    pub size: Option<u32>,
    /// For protected packets: the type revealed when protection is removed.
    pub underlying: Option<SemanticType>,
}

impl Default for PacketTemplate {
    fn default() -> Self {
        Self {
            semantic: SemanticType::Normal,
            shape: None,
            size: None,
            underlying: None,
        }
    }
}

impl PacketTemplate {
    pub fn normal() -> Self {
        Self::default()
    }

    pub fn of(semantic: SemanticType) -> Self {
        Self {
            semantic,
            ..Self::default()
        }
    }

    pub fn protected(underlying: SemanticType) -> Self {
        Self {
            semantic: SemanticType::Protected,
            underlying: Some(underlying),
            ..Self::default()
        }
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// The shape a packet would take leaving through a port of `port_shape`.
    pub fn shape_for(&self, port_shape: Shape) -> Shape {
        match self.shape.unwrap_or(port_shape) {
            Shape::Any => Shape::Square,
            shape => shape,
        }
    }

    /// Build a fresh packet leaving through a port of `port_shape`.
    pub fn instantiate(&self, port_shape: Shape, position: Point) -> Packet {
        let shape = self.shape_for(port_shape);
        let underlying = match self.semantic {
            SemanticType::Protected => Some(self.underlying.unwrap_or(SemanticType::Normal)),
            _ => None,
        };
        let size_type = underlying.unwrap_or(self.semantic);
        let size = self.size.unwrap_or_else(|| default_size(shape, size_type));
        Packet::new(shape, self.semantic, size, position).with_underlying(underlying)
    }
}

/// Size a packet gets when none is given.
pub fn default_size(shape: Shape, semantic: SemanticType) -> u32 {
    match semantic {
        SemanticType::Secret => 4,
        SemanticType::Bulk => 8,
        SemanticType::Bit => 1,
        _ => match shape {
            Shape::Circle => 1,
            Shape::Square | Shape::Any => 2,
            Shape::Triangle => 3,
        },
    }
}

/// A unit of data in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub shape: Shape,
    pub semantic: SemanticType,
    pub size: u32,
    /// Accumulated noise, clamped to `[0, size]`.
    pub noise: Fixed64,
    pub motion: MotionState,
    /// Ideal (noise-free) board position.
    pub position: Point,
    /// The type hidden under a `Protected` wrapper.
    pub underlying: Option<SemanticType>,
    /// Group tag for `Bit` packets.
    pub bit: Option<BitTag>,
    /// Transient multiplier applied to wire speed by interactive effects.
    pub speed_factor: Fixed64,
    /// The source that generated this packet, if any.
    pub origin: Option<SystemId>,
}

impl Packet {
    pub fn new(shape: Shape, semantic: SemanticType, size: u32, position: Point) -> Self {
        Self {
            shape,
            semantic,
            size,
            noise: Fixed64::ZERO,
            motion: MotionState::NotYetGenerated,
            position,
            underlying: None,
            bit: None,
            speed_factor: Fixed64::ONE,
            origin: None,
        }
    }

    /// A fragment of `bulk_parent`.
    pub fn bit(tag: BitTag, shape: Shape, position: Point) -> Self {
        Self {
            bit: Some(tag),
            ..Self::new(shape, SemanticType::Bit, 1, position)
        }
    }

    /// A bulk packet reassembled from `size` bits.
    pub fn bulk(shape: Shape, size: u32, position: Point) -> Self {
        Self::new(shape, SemanticType::Bulk, size, position)
    }

    fn with_underlying(mut self, underlying: Option<SemanticType>) -> Self {
        self.underlying = underlying;
        self
    }

    /// Volumetric packets leave through any port regardless of shape.
    pub fn is_volumetric(&self) -> bool {
        matches!(
            self.semantic,
            SemanticType::Bulk | SemanticType::Secret | SemanticType::Messenger
        )
    }

    pub fn is_bulk(&self) -> bool {
        self.semantic == SemanticType::Bulk
    }

    pub fn is_bit(&self) -> bool {
        self.semantic == SemanticType::Bit
    }

    pub fn noise_exceeded(&self) -> bool {
        self.noise >= fixed_from_u32(self.size)
    }

    /// Add noise, clamped to the packet's size.
    pub fn add_noise(&mut self, amount: Fixed64) {
        let cap = fixed_from_u32(self.size);
        self.noise = self.noise.saturating_add(amount).clamp(Fixed64::ZERO, cap);
    }

    /// Strip a `Protected` wrapper. Returns whether anything changed.
    pub fn remove_protection(&mut self) -> bool {
        if self.semantic != SemanticType::Protected {
            return false;
        }
        self.semantic = self.underlying.take().unwrap_or(SemanticType::Normal);
        true
    }

    pub fn wire_motion(&self) -> Option<&WireMotion> {
        match &self.motion {
            MotionState::OnWire(motion) => Some(motion),
            _ => None,
        }
    }

    pub fn queued_at(&self) -> Option<SystemId> {
        match self.motion {
            MotionState::InQueue { system } => Some(system),
            _ => None,
        }
    }

    pub fn is_on_wire(&self) -> bool {
        matches!(self.motion, MotionState::OnWire(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64;

    #[test]
    fn default_sizes_by_shape() {
        let t = PacketTemplate::normal();
        assert_eq!(t.instantiate(Shape::Square, Point::ORIGIN).size, 2);
        assert_eq!(t.instantiate(Shape::Triangle, Point::ORIGIN).size, 3);
        assert_eq!(t.instantiate(Shape::Circle, Point::ORIGIN).size, 1);
    }

    #[test]
    fn any_port_defaults_to_square() {
        let p = PacketTemplate::normal().instantiate(Shape::Any, Point::ORIGIN);
        assert_eq!(p.shape, Shape::Square);
    }

    #[test]
    fn template_shape_overrides_port() {
        let t = PacketTemplate::of(SemanticType::Bulk).with_shape(Shape::Circle);
        let p = t.instantiate(Shape::Square, Point::ORIGIN);
        assert_eq!(p.shape, Shape::Circle);
        assert_eq!(p.size, 8);
    }

    #[test]
    fn volumetric_types() {
        let mk = |s| Packet::new(Shape::Square, s, 2, Point::ORIGIN);
        assert!(mk(SemanticType::Bulk).is_volumetric());
        assert!(mk(SemanticType::Secret).is_volumetric());
        assert!(mk(SemanticType::Messenger).is_volumetric());
        assert!(!mk(SemanticType::Normal).is_volumetric());
        assert!(!mk(SemanticType::Bit).is_volumetric());
        assert!(!mk(SemanticType::Protected).is_volumetric());
    }

    #[test]
    fn noise_clamps_to_size() {
        let mut p = Packet::new(Shape::Square, SemanticType::Normal, 2, Point::ORIGIN);
        p.add_noise(f64_to_fixed64(1.5));
        assert!(!p.noise_exceeded());
        p.add_noise(f64_to_fixed64(5.0));
        assert_eq!(p.noise, f64_to_fixed64(2.0));
        assert!(p.noise_exceeded());
    }

    #[test]
    fn protection_reverts_to_underlying() {
        let mut p = PacketTemplate::protected(SemanticType::Trojan)
            .instantiate(Shape::Triangle, Point::ORIGIN);
        assert_eq!(p.semantic, SemanticType::Protected);
        assert!(p.remove_protection());
        assert_eq!(p.semantic, SemanticType::Trojan);
        assert!(!p.remove_protection());
    }

    #[test]
    fn protected_secret_sized_as_secret() {
        let p = PacketTemplate::protected(SemanticType::Secret)
            .instantiate(Shape::Square, Point::ORIGIN);
        assert_eq!(p.size, 4);
        assert!(!p.is_volumetric());
    }

    #[test]
    fn terminal_states() {
        assert!(MotionState::Delivered.is_terminal());
        assert!(MotionState::Lost(LossReason::Noise).is_terminal());
        assert!(MotionState::Consumed.is_terminal());
        assert!(!MotionState::NotYetGenerated.is_terminal());
    }
}
