//! Validation and lookup failures raised by the character aggregate.
//!
//! # Responsibility
//! - Provide one error taxonomy for Note, Field and Character operations.
//!
//! # Invariants
//! - Every variant is deterministic for the same inputs; none are retriable.
//! - An operation that returns an error leaves every existing value untouched.

use super::NoteId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SheetResult<T> = Result<T, SheetError>;

/// Rejected-input or rejected-state condition from the aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetError {
    /// Two fields in one character share this name.
    DuplicateFieldName(String),
    /// Two notes in one field share this id.
    DuplicateNoteId(NoteId),
    /// No note with this id exists in the searched scope.
    NoteNotFound(NoteId),
    /// No field with this name exists in the character.
    TargetFieldNotFound(String),
    /// Note value (or imported id) is missing or empty.
    InvalidValue,
    /// JSON input does not have the expected shape.
    MalformedJson(String),
}

impl Display for SheetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateFieldName(name) => {
                write!(f, "fields must have unique names: `{name}` repeats")
            }
            Self::DuplicateNoteId(id) => {
                write!(f, "field cannot store 2 notes with the same id: {id}")
            }
            Self::NoteNotFound(id) => write!(f, "note with id {id} not found"),
            Self::TargetFieldNotFound(name) => {
                write!(f, "target field with name `{name}` does not exist in character")
            }
            Self::InvalidValue => write!(f, "value cannot be null or empty"),
            Self::MalformedJson(message) => write!(f, "malformed json: {message}"),
        }
    }
}

impl Error for SheetError {}

impl From<serde_json::Error> for SheetError {
    fn from(value: serde_json::Error) -> Self {
        Self::MalformedJson(value.to_string())
    }
}
