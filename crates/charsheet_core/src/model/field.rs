//! Field: a named, ordered group of notes.
//!
//! # Responsibility
//! - Own an ordered note sequence exclusively.
//! - Produce new field values for every note edit.
//!
//! # Invariants
//! - No two notes in `notes` share an `id`.
//! - Note order is insertion order; replacements keep their position.

use super::error::{SheetError, SheetResult};
use super::note::{Note, NoteJson};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Name used when a field is created without one.
pub const DEFAULT_FIELD_NAME: &str = "New Field";

/// Named collection of notes inside a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FieldJson")]
pub struct Field {
    name: String,
    notes: Vec<Note>,
}

/// Unvalidated wire shape `{name, notes}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FieldJson {
    pub(crate) name: String,
    pub(crate) notes: Vec<NoteJson>,
}

impl TryFrom<FieldJson> for Field {
    type Error = SheetError;

    fn try_from(wire: FieldJson) -> SheetResult<Self> {
        let notes = wire
            .notes
            .into_iter()
            .map(Note::try_from)
            .collect::<SheetResult<Vec<_>>>()?;
        Self::new(wire.name, notes)
    }
}

impl Field {
    /// Creates a field and checks note-id uniqueness.
    ///
    /// # Errors
    /// - `DuplicateNoteId` with the first repeated id.
    pub fn new(name: impl Into<String>, notes: Vec<Note>) -> SheetResult<Self> {
        validate_notes(&notes)?;
        Ok(Self {
            name: name.into(),
            notes,
        })
    }

    /// Creates a field, defaulting to [`DEFAULT_FIELD_NAME`] and no notes.
    ///
    /// An empty name counts as missing.
    pub fn create(name: Option<String>, notes: Option<Vec<Note>>) -> SheetResult<Self> {
        Self::new(
            name.filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_FIELD_NAME.to_string()),
            notes.unwrap_or_default(),
        )
    }

    /// Returns a new field substituting only the provided parts.
    pub fn copy_with(&self, name: Option<String>, notes: Option<Vec<Note>>) -> SheetResult<Self> {
        Self::new(
            name.unwrap_or_else(|| self.name.clone()),
            notes.unwrap_or_else(|| self.notes.clone()),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Returns the note with `id`, if present.
    pub fn note(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|note| note.id() == id)
    }

    pub fn contains_note(&self, id: &str) -> bool {
        self.position_of(id).is_some()
    }

    /// Returns the index of the note with `id`.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.notes.iter().position(|note| note.id() == id)
    }

    /// Replaces the note sharing `note.id()` in place, or appends it.
    pub fn with_note_upserted(&self, note: Note) -> SheetResult<Self> {
        let mut notes = self.notes.clone();
        match self.position_of(note.id()) {
            Some(index) => notes[index] = note,
            None => notes.push(note),
        }
        self.copy_with(None, Some(notes))
    }

    /// Appends `note` to the end; fails if its id is already present.
    pub fn with_note_appended(&self, note: Note) -> SheetResult<Self> {
        let mut notes = self.notes.clone();
        notes.push(note);
        self.copy_with(None, Some(notes))
    }

    /// Removes the note with `id`.
    ///
    /// # Errors
    /// - `NoteNotFound` when no note carries `id`.
    pub fn without_note(&self, id: &str) -> SheetResult<Self> {
        let index = self
            .position_of(id)
            .ok_or_else(|| SheetError::NoteNotFound(id.to_string()))?;
        let mut notes = self.notes.clone();
        notes.remove(index);
        self.copy_with(None, Some(notes))
    }

    /// Emits `{name, notes: [...]}` preserving note order.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "notes": self.notes.iter().map(Note::to_json).collect::<Vec<_>>(),
        })
    }

    /// Parses `{name, notes}` and re-runs every note and field check.
    pub fn from_json(value: &serde_json::Value) -> SheetResult<Self> {
        let wire: FieldJson = serde_json::from_value(value.clone())?;
        Self::try_from(wire)
    }
}

fn validate_notes(notes: &[Note]) -> SheetResult<()> {
    let mut seen = HashSet::with_capacity(notes.len());
    for note in notes {
        if !seen.insert(note.id()) {
            return Err(SheetError::DuplicateNoteId(note.id().to_string()));
        }
    }
    Ok(())
}
