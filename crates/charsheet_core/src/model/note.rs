//! Note leaf value.
//!
//! # Responsibility
//! - Hold one freeform entry with a stable identifier.
//! - Provide validated construction and copy-on-write edits.
//!
//! # Invariants
//! - `value` is never empty at any observable instant.
//! - `id` is assigned once and shared by every copy of the note.
//! - Deserialization re-runs the same validation as construction.

use super::error::{SheetError, SheetResult};
use super::{new_id, NoteId};
use serde::{Deserialize, Serialize};

/// One freeform entry owned by exactly one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "NoteJson")]
pub struct Note {
    id: NoteId,
    value: String,
}

/// Unvalidated wire shape `{id, value}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NoteJson {
    pub(crate) id: NoteId,
    pub(crate) value: Option<String>,
}

impl TryFrom<NoteJson> for Note {
    type Error = SheetError;

    fn try_from(wire: NoteJson) -> SheetResult<Self> {
        Self::with_id(wire.id, wire.value.ok_or(SheetError::InvalidValue)?)
    }
}

impl Note {
    /// Creates a note with a freshly generated id.
    ///
    /// # Errors
    /// - `InvalidValue` when `value` is empty.
    pub fn create(value: impl Into<String>) -> SheetResult<Self> {
        Self::with_id(new_id(), value)
    }

    /// Same as [`Note::create`], treating `None` as a null value.
    pub fn create_opt(value: Option<&str>) -> SheetResult<Self> {
        Self::create(value.ok_or(SheetError::InvalidValue)?)
    }

    /// Creates a note with a caller-provided id.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(id: impl Into<NoteId>, value: impl Into<String>) -> SheetResult<Self> {
        let id = id.into();
        let value = value.into();
        if id.is_empty() {
            return Err(SheetError::InvalidValue);
        }
        validate_value(&value)?;
        Ok(Self { id, value })
    }

    /// Returns a note with the same id and, when given, a replaced value.
    pub fn copy_with(&self, value: Option<&str>) -> SheetResult<Self> {
        match value {
            Some(value) => Self::with_id(self.id.clone(), value),
            None => Ok(self.clone()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Emits `{id, value}`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "id": self.id, "value": self.value })
    }

    /// Parses `{id, value}` and validates the value.
    pub fn from_json(value: &serde_json::Value) -> SheetResult<Self> {
        let wire: NoteJson = serde_json::from_value(value.clone())?;
        Self::try_from(wire)
    }
}

fn validate_value(value: &str) -> SheetResult<()> {
    if value.is_empty() {
        return Err(SheetError::InvalidValue);
    }
    Ok(())
}
