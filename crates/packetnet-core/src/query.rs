//! Read-only query API for inspecting simulation state.
//!
//! Provides snapshot types that aggregate world state into convenient views
//! for rendering, HUD and the timeline scrubber. All types are owned copies
//! with no references into internal storage. The engine publishes one
//! [`WorldSnapshot`] per tick through a [`SnapshotHandle`], so a reader on
//! another thread never observes a half-applied tick.

use crate::fixed::{Fixed64, Millis, Ticks};
use crate::geom::Point;
use crate::id::{PacketId, SystemId, WireId};
use crate::packet::{LossReason, SemanticType};
use crate::stats::RunStats;
use crate::topology::{Shape, SystemType};
use std::sync::{Arc, RwLock};

// ---------------------------------------------------------------------------
// Packet snapshot
// ---------------------------------------------------------------------------

/// Status reported for a packet in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketStatus {
    NotYetGenerated,
    OnWire,
    InQueue,
    Delivered,
    Lost(LossReason),
    Consumed,
}

impl PacketStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PacketStatus::Delivered | PacketStatus::Lost(_) | PacketStatus::Consumed
        )
    }
}

/// An immutable view of one packet instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketSnapshot {
    /// `None` for packets a source has not generated yet.
    pub id: Option<PacketId>,
    pub shape: Shape,
    pub semantic: SemanticType,
    pub size: u32,
    pub status: PacketStatus,
    /// Ideal position on the board.
    pub position: Point,
    /// Velocity vector in board units per tick. Zero unless on a wire.
    pub velocity: Point,
    /// Progress along the current wire, 0 when not on a wire.
    pub progress: Fixed64,
    pub noise: Fixed64,
    pub wire: Option<WireId>,
    /// The system holding the packet when queued.
    pub queued_at: Option<SystemId>,
    /// The source that generated (or will generate) the packet.
    pub origin: Option<SystemId>,
}

// ---------------------------------------------------------------------------
// System snapshot
// ---------------------------------------------------------------------------

/// An immutable view of one system for rendering and HUD indicators.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemSnapshot {
    pub id: SystemId,
    pub system_type: SystemType,
    pub position: Point,
    pub queue_depth: usize,
    /// Bits waiting in a merger's buffers.
    pub buffered_bits: usize,
    pub all_ports_connected: bool,
    pub disabled: bool,
}

// ---------------------------------------------------------------------------
// World snapshot
// ---------------------------------------------------------------------------

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorldSnapshot {
    pub tick: Ticks,
    pub elapsed_ms: Millis,
    /// Live packets only (on a wire or held by a system).
    pub packets: Vec<PacketSnapshot>,
    pub systems: Vec<SystemSnapshot>,
    pub stats: RunStats,
}

impl WorldSnapshot {
    pub fn system(&self, id: SystemId) -> Option<&SystemSnapshot> {
        self.systems.iter().find(|s| s.id == id)
    }

    pub fn packet(&self, id: PacketId) -> Option<&PacketSnapshot> {
        self.packets.iter().find(|p| p.id == Some(id))
    }
}

// ---------------------------------------------------------------------------
// Snapshot publication
// ---------------------------------------------------------------------------

/// Cloneable, thread-safe reader for the most recently published snapshot.
///
/// Publishing swaps an `Arc` under a short write lock; readers clone the
/// `Arc` and then read without holding any lock.
#[derive(Debug, Clone, Default)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<Arc<WorldSnapshot>>>,
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest published snapshot.
    pub fn load(&self) -> Arc<WorldSnapshot> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub(crate) fn publish(&self, snapshot: WorldSnapshot) {
        let next = Arc::new(snapshot);
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}
