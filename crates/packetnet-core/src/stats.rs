//! Run statistics: generated, delivered and lost units, and coins.

use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};

/// Aggregate counters for one run. Units are packet sizes; packet counts are
/// tracked alongside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub generated_units: u64,
    pub delivered_units: u64,
    pub lost_units: u64,
    pub coins: u64,
    pub generated_packets: u64,
    pub delivered_packets: u64,
    pub lost_packets: u64,
}

impl RunStats {
    pub(crate) fn record_generated(&mut self, size: u32) {
        self.generated_units += u64::from(size);
        self.generated_packets += 1;
    }

    pub(crate) fn record_delivered(&mut self, size: u32) {
        self.delivered_units += u64::from(size);
        self.delivered_packets += 1;
        self.coins += u64::from(size);
    }

    pub(crate) fn record_lost(&mut self, size: u32) {
        self.lost_units += u64::from(size);
        self.lost_packets += 1;
    }

    /// Lost units as a percentage of generated units. Zero before anything
    /// has been generated.
    pub fn loss_percent(&self) -> Fixed64 {
        if self.generated_units == 0 {
            return Fixed64::ZERO;
        }
        // Raw Q32.32 bits; the counters may exceed 32 integer bits.
        let bits = (u128::from(self.lost_units) * 100 << Fixed64::FRAC_NBITS)
            / u128::from(self.generated_units);
        Fixed64::from_bits(i64::try_from(bits).unwrap_or(i64::MAX))
    }
}
