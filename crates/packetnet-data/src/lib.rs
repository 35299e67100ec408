//! Level loading for packetnet.
//!
//! Levels are data files in RON, TOML or JSON. [`loader::load_level`] finds
//! one by name, [`loader::build_level`] turns parsed [`schema::LevelData`]
//! into an [`Engine`](packetnet_core::engine::Engine) ready to edit or run.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, LoadedLevel, build_level, load_level, load_level_file};
pub use schema::LevelData;
