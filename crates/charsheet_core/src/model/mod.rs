//! Character sheet domain model.
//!
//! # Responsibility
//! - Define the Character -> Field -> Note ownership tree.
//! - Keep every value immutable; edits return new values.
//!
//! # Invariants
//! - Field names are unique within a character.
//! - Note ids are unique within a field.
//! - Note values are never empty.

pub mod character;
pub mod error;
pub mod field;
pub mod note;

use uuid::Uuid;

/// Opaque note identifier, stable across copies.
pub type NoteId = String;

/// Opaque character identifier, stable across versions.
pub type CharacterId = String;

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}
