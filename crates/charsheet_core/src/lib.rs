//! Core domain logic for character sheets.
//! This crate is the single source of truth for sheet invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{process_config, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::character::Character;
pub use model::error::{SheetError, SheetResult};
pub use model::field::{Field, DEFAULT_FIELD_NAME};
pub use model::note::Note;
pub use model::{CharacterId, NoteId};
pub use repo::character_repo::{
    CharacterRepository, CharacterVersion, RepoError, RepoResult, SqliteCharacterRepository,
    StoredCharacter,
};
pub use service::character_service::{
    CharacterService, CharacterServiceError, CreateCharacterRequest, ServiceResult,
    MAX_SWAP_ATTEMPTS,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
