//! Character aggregate root.
//!
//! # Responsibility
//! - Own an ordered field sequence exclusively.
//! - Implement the copy-on-write mutation algebra over fields and notes.
//!
//! # Invariants
//! - No two fields share a `name`.
//! - Every operation returns a new, fully validated character or an error;
//!   the receiver is never modified.
//! - Fields are located by name and replaced by index, never by structural
//!   equality.
//!
//! # Concurrency
//! Values carry no interior mutability and perform no I/O. Callers that
//! persist characters must serialize read-compute-write cycles per `id`
//! (see `CharacterRepository::compare_and_swap`).

use super::error::{SheetError, SheetResult};
use super::field::{Field, FieldJson};
use super::note::Note;
use super::{new_id, CharacterId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Versioned record made of uniquely named fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CharacterJson")]
pub struct Character {
    id: CharacterId,
    fields: Vec<Field>,
}

/// Unvalidated wire shape `{id, fields}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CharacterJson {
    pub(crate) id: CharacterId,
    pub(crate) fields: Vec<FieldJson>,
}

impl TryFrom<CharacterJson> for Character {
    type Error = SheetError;

    fn try_from(wire: CharacterJson) -> SheetResult<Self> {
        let fields = wire
            .fields
            .into_iter()
            .map(Field::try_from)
            .collect::<SheetResult<Vec<_>>>()?;
        Self::with_id(wire.id, fields)
    }
}

impl Character {
    /// Creates a character with a freshly generated id.
    ///
    /// # Errors
    /// - `DuplicateFieldName` with the first repeated name.
    pub fn create(fields: Vec<Field>) -> SheetResult<Self> {
        Self::with_id(new_id(), fields)
    }

    /// Creates a character with a caller-provided id.
    ///
    /// # Errors
    /// - `InvalidValue` when `id` is empty.
    /// - `DuplicateFieldName` with the first repeated name.
    pub fn with_id(id: impl Into<CharacterId>, fields: Vec<Field>) -> SheetResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(SheetError::InvalidValue);
        }
        validate_fields(&fields)?;
        Ok(Self { id, fields })
    }

    /// Returns a character with the same id, keeping fields when `None`.
    pub fn copy_with(&self, fields: Option<Vec<Field>>) -> SheetResult<Self> {
        Self::with_id(
            self.id.clone(),
            fields.unwrap_or_else(|| self.fields.clone()),
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the field named `name`, if present.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name() == name)
    }

    /// Returns the first field, in sequence order, holding note `note_id`.
    pub fn field_containing(&self, note_id: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.contains_note(note_id))
    }

    /// Total number of notes across all fields.
    pub fn note_count(&self) -> usize {
        self.fields.iter().map(Field::len).sum()
    }

    /// Appends `field` to the end of the sequence.
    pub fn add_new_field(&self, field: Field) -> SheetResult<Self> {
        let mut fields = self.fields.clone();
        fields.push(field);
        self.copy_with(Some(fields))
    }

    /// Renames one field, keeping its notes and position.
    pub fn rename_field(&self, name: &str, new_name: impl Into<String>) -> SheetResult<Self> {
        let index = self.field_index(name)?;
        let renamed = self.fields[index].copy_with(Some(new_name.into()), None)?;
        self.with_field_replaced(index, renamed)
    }

    /// Removes one field and every note it holds.
    pub fn remove_field(&self, name: &str) -> SheetResult<Self> {
        let index = self.field_index(name)?;
        let mut fields = self.fields.clone();
        fields.remove(index);
        self.copy_with(Some(fields))
    }

    /// Moves note `note_id` to the end of field `target_field_name`.
    ///
    /// Returns an unchanged copy when the note already lives in the target.
    ///
    /// # Errors
    /// - `NoteNotFound` when no field holds the note (checked first).
    /// - `TargetFieldNotFound` when the target name is absent.
    pub fn move_note_between_fields(
        &self,
        target_field_name: &str,
        note_id: &str,
    ) -> SheetResult<Self> {
        let source_index = self
            .fields
            .iter()
            .position(|field| field.contains_note(note_id))
            .ok_or_else(|| SheetError::NoteNotFound(note_id.to_string()))?;
        let target_index = self.field_index(target_field_name)?;

        if source_index == target_index {
            return Ok(self.clone());
        }

        let source = &self.fields[source_index];
        let moved = source
            .note(note_id)
            .cloned()
            .ok_or_else(|| SheetError::NoteNotFound(note_id.to_string()))?;

        let mut fields = self.fields.clone();
        fields[source_index] = source.without_note(note_id)?;
        fields[target_index] = self.fields[target_index].with_note_appended(moved)?;
        self.copy_with(Some(fields))
    }

    /// Replaces the note with the same id in `field_name`, or appends it.
    pub fn add_or_update_note_in_field(&self, field_name: &str, note: Note) -> SheetResult<Self> {
        let index = self.field_index(field_name)?;
        let updated = self.fields[index].with_note_upserted(note)?;
        self.with_field_replaced(index, updated)
    }

    /// Removes `note` from the character's current field named like `field`.
    ///
    /// The lookup uses `field.name()` only; the content of `field` may be a
    /// stale copy.
    pub fn delete_note_in_field(&self, field: &Field, note: &Note) -> SheetResult<Self> {
        self.delete_note_by_id(field.name(), note.id())
    }

    /// Removes note `note_id` from field `field_name`.
    ///
    /// # Errors
    /// - `TargetFieldNotFound` when the field name is absent.
    /// - `NoteNotFound` when that field has no such note.
    pub fn delete_note_by_id(&self, field_name: &str, note_id: &str) -> SheetResult<Self> {
        let index = self.field_index(field_name)?;
        let updated = self.fields[index].without_note(note_id)?;
        self.with_field_replaced(index, updated)
    }

    /// Emits `{id, fields: [...]}` preserving field order.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "fields": self.fields.iter().map(Field::to_json).collect::<Vec<_>>(),
        })
    }

    /// Parses `{id, fields}` and re-runs every nested check.
    pub fn from_json(value: &serde_json::Value) -> SheetResult<Self> {
        let wire: CharacterJson = serde_json::from_value(value.clone())?;
        Self::try_from(wire)
    }

    fn field_index(&self, name: &str) -> SheetResult<usize> {
        self.fields
            .iter()
            .position(|field| field.name() == name)
            .ok_or_else(|| SheetError::TargetFieldNotFound(name.to_string()))
    }

    fn with_field_replaced(&self, index: usize, field: Field) -> SheetResult<Self> {
        let mut fields = self.fields.clone();
        fields[index] = field;
        self.copy_with(Some(fields))
    }
}

fn validate_fields(fields: &[Field]) -> SheetResult<()> {
    let mut seen = HashSet::with_capacity(fields.len());
    for field in fields {
        if !seen.insert(field.name()) {
            return Err(SheetError::DuplicateFieldName(field.name().to_string()));
        }
    }
    Ok(())
}
