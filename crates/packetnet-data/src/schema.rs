//! Serde data file structs for level definitions.
//!
//! These structs define the on-disk format for a level: simulation
//! constants, systems with their ports and generator schedules, and the
//! wires between ports. They are deserialized from RON, JSON, or TOML data
//! files and then resolved into engine types by the loader.

use packetnet_core::config::SimConfig;
use packetnet_core::fixed::f64_to_fixed64;
use packetnet_core::packet::{PacketTemplate, SemanticType};
use packetnet_core::topology::{Shape, SystemType};
use serde::Deserialize;

// ===========================================================================
// Level
// ===========================================================================

/// A whole level file.
#[derive(Debug, Clone, Deserialize)]
pub struct LevelData {
    #[serde(default)]
    pub config: ConfigData,
    pub systems: Vec<SystemEntry>,
    #[serde(default)]
    pub wires: Vec<WireEntry>,
}

// ===========================================================================
// Config
// ===========================================================================

/// Overrides for [`SimConfig`]. Missing fields keep their defaults.
/// Fractional values are plain floats on disk and fixed-point in the
/// engine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigData {
    pub tick_ms: Option<u64>,
    pub seed: Option<u64>,
    pub base_speed: Option<f64>,
    pub compatible_speed_factor: Option<f64>,
    pub triangle_acceleration: Option<f64>,
    pub triangle_max_speed: Option<f64>,
    pub queue_capacity: Option<usize>,
    pub arrival_epsilon: Option<f64>,
    pub max_prediction_iterations: Option<u64>,
    pub system_width: Option<f64>,
    pub system_height: Option<f64>,
}

impl ConfigData {
    pub fn to_config(&self) -> SimConfig {
        let defaults = SimConfig::default();
        let fixed = |v: Option<f64>, d| v.map_or(d, f64_to_fixed64);
        SimConfig {
            tick_ms: self.tick_ms.unwrap_or(defaults.tick_ms),
            seed: self.seed.unwrap_or(defaults.seed),
            base_speed: fixed(self.base_speed, defaults.base_speed),
            compatible_speed_factor: fixed(
                self.compatible_speed_factor,
                defaults.compatible_speed_factor,
            ),
            triangle_acceleration: fixed(
                self.triangle_acceleration,
                defaults.triangle_acceleration,
            ),
            triangle_max_speed: fixed(self.triangle_max_speed, defaults.triangle_max_speed),
            queue_capacity: self.queue_capacity.unwrap_or(defaults.queue_capacity),
            arrival_epsilon: fixed(self.arrival_epsilon, defaults.arrival_epsilon),
            max_prediction_iterations: self
                .max_prediction_iterations
                .unwrap_or(defaults.max_prediction_iterations),
            system_width: fixed(self.system_width, defaults.system_width),
            system_height: fixed(self.system_height, defaults.system_height),
        }
    }
}

// ===========================================================================
// Systems
// ===========================================================================

/// A system placed on the board.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub system_type: SystemTypeData,
    pub position: (f64, f64),
    #[serde(default)]
    pub inputs: Vec<PortEntry>,
    #[serde(default)]
    pub outputs: Vec<PortEntry>,
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    #[serde(default)]
    pub generator: Option<GeneratorData>,
}

/// A named port. Names are local to their system.
#[derive(Debug, Clone, Deserialize)]
pub struct PortEntry {
    pub name: String,
    pub shape: ShapeData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorData {
    pub total: u32,
    pub period_ms: u64,
    #[serde(default)]
    pub packet: PacketData,
}

/// The packets a generator emits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PacketData {
    #[serde(default)]
    pub semantic: SemanticData,
    /// Fixed shape. Omit to take the shape of the exit port.
    #[serde(default)]
    pub shape: Option<ShapeData>,
    #[serde(default)]
    pub size: Option<u32>,
    /// For `protected` packets: what a spy reveals.
    #[serde(default)]
    pub underlying: Option<SemanticData>,
}

impl PacketData {
    pub fn to_template(&self) -> PacketTemplate {
        PacketTemplate {
            semantic: self.semantic.into(),
            shape: self.shape.map(Shape::from),
            size: self.size,
            underlying: self.underlying.map(SemanticType::from),
        }
    }
}

// ===========================================================================
// Wires
// ===========================================================================

/// A wire between two ports, each written as `"system.port"`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireEntry {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub waypoints: Vec<(f64, f64)>,
}

// ===========================================================================
// Enumerations
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemTypeData {
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

impl From<SystemTypeData> for SystemType {
    fn from(data: SystemTypeData) -> Self {
        match data {
            SystemTypeData::Source => SystemType::Source,
            SystemTypeData::Sink => SystemType::Sink,
            SystemTypeData::Node => SystemType::Node,
            SystemTypeData::AntiTrojan => SystemType::AntiTrojan,
            SystemTypeData::Distributor => SystemType::Distributor,
            SystemTypeData::Merger => SystemType::Merger,
            SystemTypeData::Spy => SystemType::Spy,
            SystemTypeData::Corruptor => SystemType::Corruptor,
            SystemTypeData::Vpn => SystemType::Vpn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeData {
    Square,
    Triangle,
    Circle,
    Any,
}

impl From<ShapeData> for Shape {
    fn from(data: ShapeData) -> Self {
        match data {
            ShapeData::Square => Shape::Square,
            ShapeData::Triangle => Shape::Triangle,
            ShapeData::Circle => Shape::Circle,
            ShapeData::Any => Shape::Any,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticData {
    #[default]
    Normal,
    Protected,
    Secret,
    Trojan,
    Bulk,
    Bit,
    Messenger,
    Wobble,
}

impl From<SemanticData> for SemanticType {
    fn from(data: SemanticData) -> Self {
        match data {
            SemanticData::Normal => SemanticType::Normal,
            SemanticData::Protected => SemanticType::Protected,
            SemanticData::Secret => SemanticType::Secret,
            SemanticData::Trojan => SemanticType::Trojan,
            SemanticData::Bulk => SemanticType::Bulk,
            SemanticData::Bit => SemanticType::Bit,
            SemanticData::Messenger => SemanticType::Messenger,
            SemanticData::Wobble => SemanticType::Wobble,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_gaps() {
        let data = ConfigData {
            seed: Some(7),
            base_speed: Some(3.0),
            ..ConfigData::default()
        };
        let config = data.to_config();
        assert_eq!(config.seed, 7);
        assert_eq!(config.base_speed, f64_to_fixed64(3.0));
        assert_eq!(config.tick_ms, SimConfig::default().tick_ms);
        assert_eq!(config.queue_capacity, 5);
    }

    #[test]
    fn packet_data_defaults_to_normal() {
        let template = PacketData::default().to_template();
        assert_eq!(template, PacketTemplate::normal());
    }

    #[test]
    fn protected_packet_template() {
        let data = PacketData {
            semantic: SemanticData::Protected,
            underlying: Some(SemanticData::Secret),
            ..PacketData::default()
        };
        assert_eq!(
            data.to_template(),
            PacketTemplate::protected(SemanticType::Secret)
        );
    }

    #[test]
    fn enums_use_snake_case() {
        let t: SystemTypeData = serde_json::from_str(r#""anti_trojan""#).unwrap();
        assert_eq!(t, SystemTypeData::AntiTrojan);
        let s: ShapeData = serde_json::from_str(r#""any""#).unwrap();
        assert_eq!(Shape::from(s), Shape::Any);
    }
}
