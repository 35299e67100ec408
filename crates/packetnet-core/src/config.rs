//! Tunable simulation constants.

use crate::fixed::{Fixed64, Millis, f64_to_fixed64};
use serde::{Deserialize, Serialize};

/// Every constant the tick algorithm depends on.
///
/// The prediction engine clones this alongside the topology, so a preview
/// and a live run always agree on speeds, capacities and the RNG seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Virtual milliseconds per tick.
    pub tick_ms: Millis,
    /// Seed for the routing RNG. Live runs and predictions both start here.
    pub seed: u64,
    /// Base packet speed in board units per tick.
    pub base_speed: Fixed64,
    /// Speed multiplier for a SQUARE packet leaving through a port of its
    /// own shape.
    pub compatible_speed_factor: Fixed64,
    /// Per-tick speed gain of a TRIANGLE packet that left through an
    /// incompatible port.
    pub triangle_acceleration: Fixed64,
    /// Cap on accelerating TRIANGLE packets.
    pub triangle_max_speed: Fixed64,
    /// Default inbound queue capacity for bounded system types.
    pub queue_capacity: usize,
    /// A packet has arrived once `progress >= 1 - arrival_epsilon`.
    pub arrival_epsilon: Fixed64,
    /// Hard cap on prediction ticks.
    pub max_prediction_iterations: u64,
    /// System footprint, used to lay out ports along the edges.
    pub system_width: Fixed64,
    pub system_height: Fixed64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_ms: 16,
            seed: 0x5EED_0001,
            base_speed: f64_to_fixed64(2.0),
            compatible_speed_factor: f64_to_fixed64(0.5),
            triangle_acceleration: f64_to_fixed64(0.05),
            triangle_max_speed: f64_to_fixed64(4.0),
            queue_capacity: 5,
            arrival_epsilon: f64_to_fixed64(0.000_001),
            max_prediction_iterations: 100_000,
            system_width: f64_to_fixed64(60.0),
            system_height: f64_to_fixed64(80.0),
        }
    }
}

impl SimConfig {
    /// Ticks needed to cover `target_ms`, rounded down.
    pub fn ticks_for(&self, target_ms: Millis) -> u64 {
        target_ms / self.tick_ms.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SimConfig::default();
        assert_eq!(config.tick_ms, 16);
        assert_eq!(config.queue_capacity, 5);
        assert_eq!(config.compatible_speed_factor, f64_to_fixed64(0.5));
    }

    #[test]
    fn ticks_for_rounds_down() {
        let config = SimConfig::default();
        assert_eq!(config.ticks_for(0), 0);
        assert_eq!(config.ticks_for(15), 0);
        assert_eq!(config.ticks_for(16), 1);
        assert_eq!(config.ticks_for(1000), 62);
    }

    #[test]
    fn zero_tick_ms_does_not_divide_by_zero() {
        let config = SimConfig {
            tick_ms: 0,
            ..SimConfig::default()
        };
        assert_eq!(config.ticks_for(10), 10);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SimConfig = serde_json::from_str(r#"{"seed": 9}"#).unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.tick_ms, 16);
    }
}
