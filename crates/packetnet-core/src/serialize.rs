//! Level save/load and editor undo history.
//!
//! A level is a [`Topology`] plus the [`SimConfig`] it runs under, encoded
//! with `bitcode` behind a versioned header. Runtime state (packets,
//! queues, the RNG position) is never saved: a loaded level always starts
//! from the editing phase, which is also the only state a prediction or a
//! fresh run can start from.

use std::collections::VecDeque;

use crate::config::SimConfig;
use crate::engine::{Engine, EngineError};
use crate::topology::{Topology, TopologyError};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a saved packetnet level.
pub const LEVEL_MAGIC: u32 = 0x9AC7_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during serialization.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

/// Errors that can occur during deserialization.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", LEVEL_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("level from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("saved topology is inconsistent: {0}")]
    InvalidTopology(#[from] TopologyError),
}

// ---------------------------------------------------------------------------
// Level header
// ---------------------------------------------------------------------------

/// Header prepended to every saved level. Checked before the payload is
/// used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelHeader {
    pub magic: u32,
    pub version: u32,
}

impl LevelHeader {
    pub fn new() -> Self {
        Self {
            magic: LEVEL_MAGIC,
            version: FORMAT_VERSION,
        }
    }

    /// Validate the header. Returns `Ok(())` if valid.
    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != LEVEL_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

impl Default for LevelHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LevelFile {
    header: LevelHeader,
    config: SimConfig,
    topology: Topology,
}

/// Encode a level.
pub fn save_level(topology: &Topology, config: &SimConfig) -> Result<Vec<u8>, SerializeError> {
    let file = LevelFile {
        header: LevelHeader::new(),
        config: config.clone(),
        topology: topology.clone(),
    };
    bitcode::serialize(&file).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Decode a level saved by [`save_level`].
///
/// The decoded topology is checked for consistency, and every port
/// position and wire path is recomputed from the system positions.
pub fn load_level(data: &[u8]) -> Result<(Topology, SimConfig), DeserializeError> {
    let LevelFile {
        header,
        config,
        mut topology,
    } = bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    header.validate()?;
    topology.validate()?;
    topology.relayout_all();
    Ok((topology, config))
}

/// Read only the header of a saved level.
///
/// bitcode has no partial decoding, so this decodes the whole file.
pub fn read_level_header(data: &[u8]) -> Result<LevelHeader, DeserializeError> {
    let file: LevelFile =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    Ok(file.header)
}

// ---------------------------------------------------------------------------
// Undo history
// ---------------------------------------------------------------------------

/// Saved levels for editor undo, newest last. Pushing past capacity
/// forgets the oldest save.
#[derive(Debug)]
pub struct UndoHistory {
    levels: VecDeque<Vec<u8>>,
    capacity: usize,
    total_taken: u64,
}

impl UndoHistory {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            levels: VecDeque::new(),
            capacity: capacity.max(1),
            total_taken: 0,
        }
    }

    pub fn push(&mut self, level: Vec<u8>) {
        if self.levels.len() == self.capacity {
            self.levels.pop_front();
        }
        self.levels.push_back(level);
        self.total_taken += 1;
    }

    /// Remove and return the newest save.
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        self.levels.pop_back()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Checkpoints ever taken, including forgotten ones.
    pub fn total_taken(&self) -> u64 {
        self.total_taken
    }

    /// 0 is the oldest save still held.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.levels.get(index).map(Vec::as_slice)
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }
}

// ---------------------------------------------------------------------------
// Engine integration
// ---------------------------------------------------------------------------

impl Engine {
    /// Encode the current level. Works in any phase; runtime state is not
    /// included.
    pub fn save_level(&self) -> Result<Vec<u8>, SerializeError> {
        save_level(self.topology(), self.config())
    }

    /// Build an engine in the editing phase from a saved level.
    ///
    /// The event bus is fresh. Listeners must be re-registered.
    pub fn load_level(data: &[u8]) -> Result<Self, DeserializeError> {
        let (topology, config) = load_level(data)?;
        Ok(Engine::from_topology(topology, config))
    }

    /// Save the current level into `history` before an edit.
    pub fn checkpoint(&self, history: &mut UndoHistory) -> Result<(), SerializeError> {
        history.push(self.save_level()?);
        Ok(())
    }

    /// Restore the newest checkpoint in `history`. Returns `Ok(false)` when
    /// the history is empty. Only allowed while editing.
    pub fn undo(&mut self, history: &mut UndoHistory) -> Result<bool, UndoError> {
        if self.phase() != crate::engine::RunPhase::Editing {
            return Err(UndoError::Engine(EngineError::RunInProgress));
        }
        let Some(level) = history.pop() else {
            return Ok(false);
        };
        let restored = Engine::load_level(&level)?;
        self.restore_from(restored);
        log::info!("editor undo: {} checkpoints left", history.len());
        Ok(true)
    }
}

/// Errors from [`Engine::undo`].
#[derive(Debug, thiserror::Error)]
pub enum UndoError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Deserialize(#[from] DeserializeError),
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crate::topology::{PortDirection, Shape};
    use crate::world::World;

    #[test]
    fn level_round_trip_runs_identically() {
        let chain = distributor_merger_chain(6);
        let config = SimConfig {
            seed: 42,
            ..SimConfig::default()
        };
        let data = save_level(&chain.topology, &config).expect("save should succeed");
        let (topology, loaded_config) = load_level(&data).expect("load should succeed");
        assert_eq!(loaded_config, config);
        assert_eq!(topology.system_count(), 4);
        assert_eq!(topology.wire_count(), 3);

        let mut original = World::new(chain.topology.clone(), config.clone());
        let mut loaded = World::new(topology, loaded_config);
        run_world(&mut original, 2000);
        run_world(&mut loaded, 2000);
        assert_eq!(original.tick(), loaded.tick());
        assert_eq!(original.state_hash(), loaded.state_hash());
        assert_eq!(original.stats(), loaded.stats());
    }

    #[test]
    fn ids_survive_round_trip() {
        let line = source_to_sink(Shape::Circle, Shape::Any, 3, 100);
        let data = save_level(&line.topology, &SimConfig::default()).unwrap();
        let (topology, _) = load_level(&data).unwrap();
        assert!(topology.system(line.source).is_some());
        assert!(topology.system(line.sink).is_some());
        assert_eq!(
            topology.wire(line.wire).map(|w| w.length()),
            line.topology.wire(line.wire).map(|w| w.length())
        );
    }

    #[test]
    fn header_validation() {
        assert!(LevelHeader::new().validate().is_ok());
        let bad_magic = LevelHeader {
            magic: 0xDEAD_BEEF,
            version: FORMAT_VERSION,
        };
        assert!(matches!(
            bad_magic.validate(),
            Err(DeserializeError::InvalidMagic(0xDEAD_BEEF))
        ));
        let future = LevelHeader {
            magic: LEVEL_MAGIC,
            version: FORMAT_VERSION + 1,
        };
        assert!(matches!(
            future.validate(),
            Err(DeserializeError::FutureVersion(_))
        ));
        let old = LevelHeader {
            magic: LEVEL_MAGIC,
            version: 0,
        };
        assert!(matches!(
            old.validate(),
            Err(DeserializeError::UnsupportedVersion(0))
        ));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            load_level(&[1, 2, 3]),
            Err(DeserializeError::Decode(_))
        ));
        let data = save_level(&Topology::new(&SimConfig::default()), &SimConfig::default()).unwrap();
        assert_eq!(read_level_header(&data).unwrap(), LevelHeader::new());
    }

    /// Re-encode `topology` after editing its serde form directly.
    fn tampered(topology: &Topology, edit: impl FnOnce(&mut serde_json::Value)) -> Vec<u8> {
        let mut value = serde_json::to_value(topology).unwrap();
        edit(&mut value);
        let topology: Topology = serde_json::from_value(value).unwrap();
        save_level(&topology, &SimConfig::default()).unwrap()
    }

    /// The occupied slots of one arena in a serialized topology.
    fn live_slots<'a>(
        value: &'a mut serde_json::Value,
        arena: &str,
    ) -> impl Iterator<Item = &'a mut serde_json::Value> {
        value[arena]
            .as_array_mut()
            .into_iter()
            .flatten()
            .map(|slot| &mut slot["value"])
            .filter(|v| !v.is_null())
    }

    #[test]
    fn wire_joining_one_port_is_rejected() {
        let line = source_to_sink(Shape::Square, Shape::Square, 1, 1000);
        let data = tampered(&line.topology, |value| {
            for wire in live_slots(value, "wires") {
                wire["end"] = wire["start"].clone();
            }
        });
        assert!(matches!(
            load_level(&data),
            Err(DeserializeError::InvalidTopology(_))
        ));
        assert!(matches!(
            Engine::load_level(&data),
            Err(DeserializeError::InvalidTopology(_))
        ));
    }

    #[test]
    fn stale_wire_paths_are_recomputed() {
        let line = source_to_sink(Shape::Square, Shape::Square, 1, 1000);
        let data = tampered(&line.topology, |value| {
            let detour = live_slots(value, "systems")
                .next()
                .map(|system| system["position"].clone())
                .unwrap();
            for wire in live_slots(value, "wires") {
                wire["path"].as_array_mut().unwrap().insert(1, detour.clone());
            }
        });
        let (topology, config) = load_level(&data).unwrap();
        let length = |t: &Topology| t.wire(line.wire).map(|w| w.length());
        assert_eq!(length(&topology), length(&line.topology));
        assert_eq!(length(&topology), Some(fixed(100.0)));

        let mut original = World::new(line.topology.clone(), config.clone());
        let mut loaded = World::new(topology, config);
        assert_eq!(run_world(&mut original, 500), run_world(&mut loaded, 500));
        assert_eq!(original.state_hash(), loaded.state_hash());
    }

    #[test]
    fn undo_history_evicts_oldest() {
        let mut history = UndoHistory::new(2);
        assert!(history.is_empty());
        history.push(vec![1]);
        history.push(vec![2]);
        history.push(vec![3]);
        assert_eq!(history.len(), 2);
        assert_eq!(history.total_taken(), 3);
        assert_eq!(history.get(0), Some(&[2u8][..]));
        assert_eq!(history.get(1), Some(&[3u8][..]));
        assert_eq!(history.get(2), None);
        assert_eq!(history.pop(), Some(vec![3]));
        assert_eq!(history.pop(), Some(vec![2]));
        assert_eq!(history.pop(), None);
        history.push(vec![4]);
        assert_eq!(history.get(0), Some(&[4u8][..]));
        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn engine_undo_restores_previous_level() {
        let line = source_to_sink(Shape::Square, Shape::Square, 1, 1000);
        let mut engine = Engine::from_topology(line.topology, SimConfig::default());
        let mut history = UndoHistory::new(8);

        engine.checkpoint(&mut history).unwrap();
        engine
            .add_port(line.source, PortDirection::Out, Shape::Circle)
            .unwrap();
        assert_eq!(engine.topology().port_count(), 3);
        assert!(!engine.topology().is_network_fully_wired());

        assert!(engine.undo(&mut history).unwrap());
        assert_eq!(engine.topology().port_count(), 2);
        assert!(engine.topology().is_network_fully_wired());
        assert!(!engine.undo(&mut history).unwrap());
    }

    #[test]
    fn undo_rejected_while_running() {
        let line = source_to_sink(Shape::Square, Shape::Square, 1, 1000);
        let mut engine = started_engine(&line.topology);
        let mut history = UndoHistory::new(1);
        engine.checkpoint(&mut history).unwrap();
        assert!(matches!(
            engine.undo(&mut history),
            Err(UndoError::Engine(EngineError::RunInProgress))
        ));
        assert_eq!(history.len(), 1);
    }
}
