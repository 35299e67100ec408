//! Virtual clock and state hashing.
//!
//! The clock counts whole ticks and banks the wall time handed to
//! `Engine::advance` until it covers another tick. The hash folds the
//! packet arena, queues, and counters into one `u64` so two runs of the
//! same level can be compared tick by tick.

use crate::fixed::{Fixed64, Millis, Ticks};
use crate::geom::Point;
use slotmap::Key;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Ticks completed since the run started.
    pub tick: Ticks,
    /// Banked wall milliseconds short of one tick.
    pub accumulator: Millis,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time at the start of the current tick.
    pub fn now_ms(&self, tick_ms: Millis) -> Millis {
        self.tick * tick_ms
    }

    pub fn bank(&mut self, dt_ms: Millis) {
        self.accumulator = self.accumulator.saturating_add(dt_ms);
    }

    /// Withdraw one tick's worth of banked time, if there is that much.
    pub fn take_tick(&mut self, tick_ms: Millis) -> bool {
        let step = tick_ms.max(1);
        if self.accumulator < step {
            return false;
        }
        self.accumulator -= step;
        true
    }

    /// Forget banked time once the run is over.
    pub fn drain(&mut self) {
        self.accumulator = 0;
    }
}

/// Outcome of one `Engine::advance` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceResult {
    pub steps_run: u64,
    /// The run reached FINISHED during or before this call.
    pub finished: bool,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// FNV-1a (64-bit) over little-endian encodings. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(u64);

impl StateHash {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    pub fn new() -> Self {
        Self(Self::OFFSET)
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = (self.0 ^ u64::from(b)).wrapping_mul(Self::PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn write_point(&mut self, p: Point) {
        self.write_fixed64(p.x);
        self.write_fixed64(p.y);
    }

    /// Arena keys hash by slot and version, so a recycled slot differs from
    /// the key it replaced.
    pub fn write_key<K: Key>(&mut self, key: K) {
        self.write_u64(key.data().as_ffi());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::PacketId;
    use slotmap::SlotMap;

    #[test]
    fn banked_time_yields_whole_ticks() {
        let mut clock = SimState::new();
        clock.bank(40);
        assert!(clock.take_tick(16));
        assert!(clock.take_tick(16));
        assert!(!clock.take_tick(16));
        assert_eq!(clock.accumulator, 8);
        clock.drain();
        assert_eq!(clock.accumulator, 0);
    }

    #[test]
    fn now_tracks_tick_length() {
        let clock = SimState {
            tick: 3,
            accumulator: 0,
        };
        assert_eq!(clock.now_ms(16), 48);
        assert_eq!(clock.now_ms(0), 0);
    }

    #[test]
    fn hash_is_order_sensitive() {
        let mut a = StateHash::new();
        a.write_u32(1);
        a.write_u32(2);
        let mut b = StateHash::new();
        b.write_u32(2);
        b.write_u32(1);
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn recycled_keys_hash_differently() {
        let mut arena: SlotMap<PacketId, ()> = SlotMap::with_key();
        let first = arena.insert(());
        arena.remove(first);
        let second = arena.insert(());

        let mut a = StateHash::new();
        a.write_key(first);
        let mut b = StateHash::new();
        b.write_key(second);
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn points_hash_both_axes() {
        let mut a = StateHash::new();
        a.write_point(Point::from_f64(1.0, 2.0));
        let mut b = StateHash::new();
        b.write_point(Point::from_f64(2.0, 1.0));
        assert_ne!(a.finish(), b.finish());
    }
}
