//! Level file loading.
//!
//! A level file is parsed into [`LevelData`], its `"system.port"`
//! references are resolved, and the result is replayed into a fresh
//! [`Engine`] through the editor commands an interactive editor would
//! issue. Anything the editor would refuse, the loader refuses too.

use crate::schema::LevelData;
use packetnet_core::engine::{Engine, EngineError};
use packetnet_core::geom::Point;
use packetnet_core::id::{PortId, SystemId};
use packetnet_core::topology::{GeneratorSchedule, PortDirection};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("level '{name}' not found in {dir}")]
    MissingLevel { name: String, dir: PathBuf },

    #[error("{file}: not a .ron, .toml or .json file")]
    UnknownExtension { file: PathBuf },

    /// More than one file in the directory carries the level's name.
    #[error("level '{name}' is ambiguous: {found:?}")]
    AmbiguousLevel { name: String, found: Vec<PathBuf> },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("{file}: wire refers to unknown port '{reference}'")]
    UnknownPort { file: PathBuf, reference: String },

    #[error("{file}: system '{name}' defined twice")]
    DuplicateSystem { file: PathBuf, name: String },

    #[error("{file}: port '{reference}' defined twice")]
    DuplicatePort { file: PathBuf, reference: String },

    /// The engine rejected a command built from the file.
    #[error("invalid level {file}: {source}")]
    Engine {
        file: PathBuf,
        #[source]
        source: EngineError,
    },

    #[error("cannot read {file}: {source}")]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ===========================================================================
// Formats
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }

    pub fn from_path(path: &Path) -> Option<Format> {
        let ext = path.extension()?.to_str()?;
        Format::ALL.into_iter().find(|f| f.extension() == ext)
    }

    fn parse(self, content: &str) -> Result<LevelData, String> {
        match self {
            Format::Ron => ron::from_str(content).map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

/// Parse level text. `file` only labels errors.
pub fn parse_level(content: &str, format: Format, file: &Path) -> Result<LevelData, DataLoadError> {
    format.parse(content).map_err(|detail| DataLoadError::Parse {
        file: file.to_path_buf(),
        detail,
    })
}

/// Read and parse a level file, picking the format from its extension.
pub fn read_level_file(path: &Path) -> Result<LevelData, DataLoadError> {
    let format = Format::from_path(path).ok_or_else(|| DataLoadError::UnknownExtension {
        file: path.to_path_buf(),
    })?;
    let content = std::fs::read_to_string(path).map_err(|source| DataLoadError::Io {
        file: path.to_path_buf(),
        source,
    })?;
    parse_level(&content, format, path)
}

/// The one file in `dir` named `{name}.ron`, `{name}.toml` or `{name}.json`.
pub fn find_level_file(dir: &Path, name: &str) -> Result<PathBuf, DataLoadError> {
    let mut found: Vec<PathBuf> = Format::ALL
        .iter()
        .map(|f| dir.join(format!("{name}.{}", f.extension())))
        .filter(|path| path.is_file())
        .collect();
    match found.len() {
        0 => Err(DataLoadError::MissingLevel {
            name: name.to_string(),
            dir: dir.to_path_buf(),
        }),
        1 => Ok(found.remove(0)),
        _ => Err(DataLoadError::AmbiguousLevel {
            name: name.to_string(),
            found,
        }),
    }
}

// ===========================================================================
// Level building
// ===========================================================================

/// Names from the file mapped to the ids the engine handed out.
#[derive(Debug, Default)]
pub struct LevelNames {
    pub systems: HashMap<String, SystemId>,
    /// Keyed by `"system.port"`.
    pub ports: HashMap<String, PortId>,
}

impl LevelNames {
    fn claim_system(&self, name: &str, file: &Path) -> Result<(), DataLoadError> {
        if self.systems.contains_key(name) {
            return Err(DataLoadError::DuplicateSystem {
                file: file.to_path_buf(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn add_port(&mut self, reference: String, id: PortId, file: &Path) -> Result<(), DataLoadError> {
        match self.ports.entry(reference) {
            Entry::Occupied(e) => Err(DataLoadError::DuplicatePort {
                file: file.to_path_buf(),
                reference: e.key().clone(),
            }),
            Entry::Vacant(e) => {
                e.insert(id);
                Ok(())
            }
        }
    }

    /// Resolve a `"system.port"` reference.
    pub fn port(&self, reference: &str) -> Option<PortId> {
        self.ports.get(reference).copied()
    }

    fn resolve(&self, reference: &str, file: &Path) -> Result<PortId, DataLoadError> {
        self.port(reference).ok_or_else(|| DataLoadError::UnknownPort {
            file: file.to_path_buf(),
            reference: reference.to_string(),
        })
    }
}

/// A built engine plus the names that resolve into it.
#[derive(Debug)]
pub struct LoadedLevel {
    pub engine: Engine,
    pub names: LevelNames,
}

/// Build an engine in the editing phase from parsed level data.
pub fn build_level(data: &LevelData, file: &Path) -> Result<LoadedLevel, DataLoadError> {
    let mut engine = Engine::new(data.config.to_config());
    let mut names = LevelNames::default();
    let rejected = |source: EngineError| DataLoadError::Engine {
        file: file.to_path_buf(),
        source,
    };

    for entry in &data.systems {
        names.claim_system(&entry.name, file)?;
        let position = Point::from_f64(entry.position.0, entry.position.1);
        let system = engine
            .add_system(entry.system_type.into(), position)
            .map_err(rejected)?;
        if let Some(capacity) = entry.queue_capacity {
            engine
                .set_queue_capacity(system, capacity)
                .map_err(rejected)?;
        }
        let ports = entry
            .inputs
            .iter()
            .map(|p| (PortDirection::In, p))
            .chain(entry.outputs.iter().map(|p| (PortDirection::Out, p)));
        for (direction, port) in ports {
            let id = engine
                .add_port(system, direction, port.shape.into())
                .map_err(rejected)?;
            names.add_port(format!("{}.{}", entry.name, port.name), id, file)?;
        }
        if let Some(generator) = &entry.generator {
            let schedule = GeneratorSchedule {
                total: generator.total,
                period_ms: generator.period_ms,
                template: generator.packet.to_template(),
            };
            engine.set_generator(system, schedule).map_err(rejected)?;
        }
        names.systems.insert(entry.name.clone(), system);
    }

    for wire in &data.wires {
        let from = names.resolve(&wire.from, file)?;
        let to = names.resolve(&wire.to, file)?;
        let id = engine.connect(from, to).map_err(rejected)?;
        for (index, &(x, y)) in wire.waypoints.iter().enumerate() {
            engine
                .insert_waypoint(id, index, Point::from_f64(x, y))
                .map_err(rejected)?;
        }
    }

    log::debug!(
        "built level from {}: {} systems, {} wires",
        file.display(),
        names.systems.len(),
        data.wires.len()
    );
    Ok(LoadedLevel { engine, names })
}

/// Read and build a level file.
pub fn load_level_file(path: &Path) -> Result<LoadedLevel, DataLoadError> {
    let data = read_level_file(path)?;
    build_level(&data, path)
}

/// Find `{name}.ron|toml|json` in `dir` and build it.
pub fn load_level(dir: &Path, name: &str) -> Result<LoadedLevel, DataLoadError> {
    load_level_file(&find_level_file(dir, name)?)
}

// ===========================================================================
// Tests
// ===========================================================================
