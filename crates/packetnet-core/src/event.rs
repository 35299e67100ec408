//! Packet lifecycle events.
//!
//! The world records events while a tick runs; the engine moves them into
//! the [`EventBus`] and delivers them in one batch at the end of the tick.
//! Each kind is buffered separately and bounded, so a UI that never
//! registers a listener cannot grow memory without limit.
//!
//! Listeners are passive: they observe events (sound cues, HUD flashes)
//! and cannot reach the world. A kind switched off with
//! [`EventBus::suppress`] is discarded at emit time.

use std::collections::VecDeque;

use crate::fixed::Ticks;
use crate::id::{PacketId, SystemId};
use crate::packet::LossReason;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    PacketGenerated {
        packet: PacketId,
        source: SystemId,
        size: u32,
        tick: Ticks,
    },
    PacketDelivered {
        packet: PacketId,
        sink: SystemId,
        size: u32,
        tick: Ticks,
    },
    PacketLost {
        packet: PacketId,
        reason: LossReason,
        size: u32,
        tick: Ticks,
    },
    PacketQueued {
        packet: PacketId,
        system: SystemId,
        tick: Ticks,
    },
    BulkSplit {
        bulk: PacketId,
        system: SystemId,
        bits: u32,
        tick: Ticks,
    },
    BulkMerged {
        bulk: PacketId,
        system: SystemId,
        bits: u32,
        tick: Ticks,
    },
    PacketTeleported {
        packet: PacketId,
        from: SystemId,
        to: SystemId,
        tick: Ticks,
    },
    RunFinished {
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PacketGenerated,
    PacketDelivered,
    PacketLost,
    PacketQueued,
    BulkSplit,
    BulkMerged,
    PacketTeleported,
    RunFinished,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 8;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::PacketGenerated { .. } => EventKind::PacketGenerated,
            Event::PacketDelivered { .. } => EventKind::PacketDelivered,
            Event::PacketLost { .. } => EventKind::PacketLost,
            Event::PacketQueued { .. } => EventKind::PacketQueued,
            Event::BulkSplit { .. } => EventKind::BulkSplit,
            Event::BulkMerged { .. } => EventKind::BulkMerged,
            Event::PacketTeleported { .. } => EventKind::PacketTeleported,
            Event::RunFinished { .. } => EventKind::RunFinished,
        }
    }

    pub fn tick(&self) -> Ticks {
        match self {
            Event::PacketGenerated { tick, .. }
            | Event::PacketDelivered { tick, .. }
            | Event::PacketLost { tick, .. }
            | Event::PacketQueued { tick, .. }
            | Event::BulkSplit { tick, .. }
            | Event::BulkMerged { tick, .. }
            | Event::PacketTeleported { tick, .. }
            | Event::RunFinished { tick } => *tick,
        }
    }
}

impl EventKind {
    /// Convert to usize index for array lookups.
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// Bounded FIFO of undelivered events of one kind. Overflow evicts the
/// oldest event and counts it as dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: VecDeque<Event>,
    capacity: usize,
    dropped: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events evicted by overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Remove and return every buffered event, oldest first.
    pub fn take(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// The central event bus. Holds one ring buffer per event kind, listener
/// lists, and suppression flags.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    listeners: [Vec<PassiveListener>; EVENT_KIND_COUNT],
    default_capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Create a new event bus with the given default buffer capacity per kind.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: Default::default(),
            default_capacity,
        }
    }

    /// Suppress an event kind. Suppressed events are never allocated or buffered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Emit an event. No-ops if the event kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Register a listener for an event kind. Listeners run in registration
    /// order.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.listeners[kind.index()].push(listener);
    }

    /// Buffered events of one kind that have not been delivered yet.
    pub fn pending(&self, kind: EventKind) -> usize {
        self.buffers[kind.index()]
            .as_ref()
            .map_or(0, EventBuffer::len)
    }

    /// Deliver all buffered events to listeners, oldest first, then clear
    /// the buffers.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            let Some(buffer) = self.buffers[idx].as_mut() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }
            let events = buffer.take();
            for listener in &mut self.listeners[idx] {
                for event in &events {
                    listener(event);
                }
            }
        }
    }
}
