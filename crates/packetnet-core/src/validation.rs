//! Topology checks and determinism tooling.
//!
//! The wiring checks are pure queries over a static topology, used by the
//! editor as a pre-run gate. The diff and determinism helpers compare two
//! runs packet by packet to find where they diverge.

use crate::config::SimConfig;
use crate::id::{PacketId, SystemId};
use crate::query::PacketSnapshot;
use crate::topology::Topology;
use crate::world::World;
use slotmap::SecondaryMap;
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Wiring checks
// ---------------------------------------------------------------------------

/// True iff every port on every system has a wire.
pub fn is_network_fully_wired(topology: &Topology) -> bool {
    topology.ports().all(|(_, port)| port.is_connected())
}

/// Breadth-first reachability over wires treated as undirected edges. An
/// empty or single-system topology is trivially connected.
pub fn is_topologically_connected(topology: &Topology) -> bool {
    let mut adjacency: SecondaryMap<SystemId, Vec<SystemId>> = SecondaryMap::new();
    for (id, _) in topology.systems() {
        adjacency.insert(id, Vec::new());
    }
    for (wire, _) in topology.wires() {
        let (Some(a), Some(b)) = (topology.wire_origin(wire), topology.wire_destination(wire))
        else {
            continue;
        };
        if let Some(list) = adjacency.get_mut(a) {
            list.push(b);
        }
        if let Some(list) = adjacency.get_mut(b) {
            list.push(a);
        }
    }

    let Some((start, _)) = topology.systems().next() else {
        return true;
    };
    let mut seen: SecondaryMap<SystemId, ()> = SecondaryMap::new();
    let mut frontier = VecDeque::from([start]);
    seen.insert(start, ());
    while let Some(system) = frontier.pop_front() {
        for &next in adjacency.get(system).into_iter().flatten() {
            if seen.insert(next, ()).is_none() {
                frontier.push_back(next);
            }
        }
    }
    seen.len() == topology.system_count()
}

impl Topology {
    /// See [`is_network_fully_wired`].
    pub fn is_network_fully_wired(&self) -> bool {
        is_network_fully_wired(self)
    }

    /// See [`is_topologically_connected`].
    pub fn is_topologically_connected(&self) -> bool {
        is_topologically_connected(self)
    }
}

// ---------------------------------------------------------------------------
// Packet diffs
// ---------------------------------------------------------------------------

/// One difference between two packet reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketDiff {
    /// The reports have different lengths.
    CountMismatch { a: usize, b: usize },
    /// The entries at `index` differ in the named fields.
    Mismatch {
        index: usize,
        id: Option<PacketId>,
        fields: Vec<&'static str>,
    },
}

/// Compare two packet reports entry by entry.
pub fn diff_snapshots(a: &[PacketSnapshot], b: &[PacketSnapshot]) -> Vec<PacketDiff> {
    let mut diffs = Vec::new();
    if a.len() != b.len() {
        diffs.push(PacketDiff::CountMismatch {
            a: a.len(),
            b: b.len(),
        });
    }
    for (index, (pa, pb)) in a.iter().zip(b).enumerate() {
        let mut fields = Vec::new();
        if pa.id != pb.id {
            fields.push("id");
        }
        if pa.shape != pb.shape {
            fields.push("shape");
        }
        if pa.semantic != pb.semantic {
            fields.push("semantic");
        }
        if pa.size != pb.size {
            fields.push("size");
        }
        if pa.status != pb.status {
            fields.push("status");
        }
        if pa.position != pb.position {
            fields.push("position");
        }
        if pa.progress != pb.progress {
            fields.push("progress");
        }
        if pa.noise != pb.noise {
            fields.push("noise");
        }
        if pa.queued_at != pb.queued_at {
            fields.push("queued_at");
        }
        if !fields.is_empty() {
            diffs.push(PacketDiff::Mismatch {
                index,
                id: pa.id,
                fields,
            });
        }
    }
    diffs
}

// ---------------------------------------------------------------------------
// Determinism validation
// ---------------------------------------------------------------------------

/// Result of a determinism validation run.
#[derive(Debug)]
pub struct DeterminismResult {
    /// Whether the two runs produced identical results.
    pub is_deterministic: bool,
    /// Tick at which divergence was first detected (if any).
    pub divergence_tick: Option<u64>,
    /// Hash log: (tick, hash_run1, hash_run2) for each tick.
    pub hash_log: Vec<(u64, u64, u64)>,
}

/// Run the same level twice for up to `ticks` ticks and compare state
/// hashes after every tick.
pub fn validate_determinism(topology: &Topology, config: &SimConfig, ticks: u64) -> DeterminismResult {
    let mut world_a = World::new(topology.clone(), config.clone());
    let mut world_b = World::new(topology.clone(), config.clone());

    let mut hash_log = Vec::new();
    let mut divergence_tick = None;

    for _ in 0..ticks {
        let ran_a = world_a.step();
        let ran_b = world_b.step();
        if !ran_a && !ran_b {
            break;
        }

        let hash_a = world_a.state_hash();
        let hash_b = world_b.state_hash();
        let tick = world_a.tick();

        hash_log.push((tick, hash_a, hash_b));

        if (hash_a != hash_b || ran_a != ran_b) && divergence_tick.is_none() {
            divergence_tick = Some(tick);
        }
    }

    DeterminismResult {
        is_deterministic: divergence_tick.is_none(),
        divergence_tick,
        hash_log,
    }
}

// ===========================================================================
// Tests
// ===========================================================================
