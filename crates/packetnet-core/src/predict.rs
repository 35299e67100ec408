//! Fast-forward previews of a run.
//!
//! A [`Predictor`] clones the topology and config (never live packets or
//! the live RNG) and replays the tick algorithm from time zero on a fresh
//! [`World`]. Because the fresh world is seeded exactly like a live run, a
//! prediction to `T` and a live run stopped at `T` report the same packets.

use crate::config::SimConfig;
use crate::fixed::{Millis, Ticks};
use crate::query::PacketSnapshot;
use crate::stats::RunStats;
use crate::topology::Topology;
use crate::world::World;

/// Result of one prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Ticks actually simulated. Less than requested if the run finished
    /// early or the iteration cap was hit.
    pub ticks_run: Ticks,
    pub elapsed_ms: Millis,
    /// One entry per packet instance, including `NotYetGenerated` ones.
    pub packets: Vec<PacketSnapshot>,
    pub stats: RunStats,
    /// Whether every packet was terminal and every generator exhausted.
    pub finished: bool,
}

#[derive(Debug, Clone)]
pub struct Predictor {
    topology: Topology,
    config: SimConfig,
}

impl Predictor {
    pub fn new(topology: &Topology, config: &SimConfig) -> Self {
        Self {
            topology: topology.clone(),
            config: config.clone(),
        }
    }

    /// Packet snapshots at `target_ms` of virtual time.
    pub fn predict(&self, target_ms: Millis) -> Vec<PacketSnapshot> {
        self.run(target_ms).packets
    }

    /// Simulate `min(target_ms / tick_ms, max_prediction_iterations)` ticks,
    /// stopping early if the run finishes.
    pub fn run(&self, target_ms: Millis) -> Prediction {
        let mut world = World::new(self.topology.clone(), self.config.clone());
        let ticks = self
            .config
            .ticks_for(target_ms)
            .min(self.config.max_prediction_iterations);

        let mut ticks_run = 0;
        while ticks_run < ticks && world.step() {
            ticks_run += 1;
        }
        if ticks_run == self.config.max_prediction_iterations && ticks_run > 0 {
            log::debug!("prediction stopped at the iteration cap ({ticks_run} ticks)");
        }

        Prediction {
            ticks_run,
            elapsed_ms: world.now_ms(),
            packets: world.packet_report(true),
            stats: *world.stats(),
            finished: world.is_finished(),
        }
    }
}
