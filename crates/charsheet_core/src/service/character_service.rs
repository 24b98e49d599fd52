//! Character use-case service.
//!
//! # Responsibility
//! - Run every aggregate mutation as read, compute, compare-and-swap.
//! - Translate store and aggregate failures into one service error.
//!
//! # Invariants
//! - A mutation is persisted only if the stored version did not move since
//!   it was read; otherwise it is recomputed from the newer version.
//! - A rejected mutation never reaches the store.
//! - No-op results (e.g. moving a note into its own field) skip the write.

use crate::model::character::Character;
use crate::model::error::{SheetError, SheetResult};
use crate::model::field::{Field, FieldJson};
use crate::model::note::Note;
use crate::model::CharacterId;
use crate::repo::character_repo::{CharacterRepository, RepoError, StoredCharacter};
use log::{debug, info, warn};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Attempts per mutation before giving up on concurrent writers.
pub const MAX_SWAP_ATTEMPTS: u32 = 3;

/// Service error for character use-cases.
#[derive(Debug)]
pub enum CharacterServiceError {
    /// Aggregate rejected the input or the resulting state.
    Sheet(SheetError),
    /// Target character does not exist.
    CharacterNotFound(CharacterId),
    /// Every attempt lost the race against another writer.
    ConflictRetriesExhausted { id: CharacterId, attempts: u32 },
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for CharacterServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sheet(err) => write!(f, "{err}"),
            Self::CharacterNotFound(id) => write!(f, "character not found: {id}"),
            Self::ConflictRetriesExhausted { id, attempts } => write!(
                f,
                "character {id} kept changing; gave up after {attempts} attempts"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CharacterServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sheet(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SheetError> for CharacterServiceError {
    fn from(value: SheetError) -> Self {
        Self::Sheet(value)
    }
}

impl From<RepoError> for CharacterServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::CharacterNotFound(id),
            other => Self::Repo(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, CharacterServiceError>;

/// Body of a create request: `{"fields": [Field, ...]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCharacterRequest {
    pub fields: Vec<Field>,
}

#[derive(Debug, Deserialize)]
struct CreateCharacterJson {
    fields: Vec<FieldJson>,
}

impl CreateCharacterRequest {
    /// Parses the request body and validates every field in it.
    pub fn from_json(value: &serde_json::Value) -> SheetResult<Self> {
        let wire: CreateCharacterJson = serde_json::from_value(value.clone())?;
        let fields = wire
            .fields
            .into_iter()
            .map(Field::try_from)
            .collect::<SheetResult<Vec<_>>>()?;
        Ok(Self { fields })
    }
}

/// Character service facade over repository implementations.
pub struct CharacterService<R: CharacterRepository> {
    repo: R,
}

impl<R: CharacterRepository> CharacterService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates and stores a character with a generated id.
    pub fn create_character(&self, fields: Vec<Field>) -> ServiceResult<StoredCharacter> {
        let character = Character::create(fields)?;
        let stored = self.repo.create_character(&character)?;
        info!(
            "event=character_create module=service status=ok character_id={} fields={}",
            stored.character.id(),
            stored.character.fields().len()
        );
        Ok(stored)
    }

    /// Creates a character from a `{"fields": [...]}` request body.
    pub fn create_from_request(&self, body: &serde_json::Value) -> ServiceResult<StoredCharacter> {
        let request = CreateCharacterRequest::from_json(body)?;
        self.create_character(request.fields)
    }

    /// Loads one character.
    pub fn get_character(&self, id: &str) -> ServiceResult<StoredCharacter> {
        self.repo
            .get_character(id)?
            .ok_or_else(|| CharacterServiceError::CharacterNotFound(id.to_string()))
    }

    /// Lists every stored character.
    pub fn list_characters(&self) -> ServiceResult<Vec<StoredCharacter>> {
        Ok(self.repo.list_characters()?)
    }

    /// Deletes one character.
    pub fn delete_character(&self, id: &str) -> ServiceResult<()> {
        self.repo.delete_character(id)?;
        info!("event=character_delete module=service status=ok character_id={id}");
        Ok(())
    }

    /// Replaces the whole field sequence.
    pub fn replace_fields(&self, id: &str, fields: Vec<Field>) -> ServiceResult<StoredCharacter> {
        self.mutate(id, "replace_fields", |character| {
            character.copy_with(Some(fields.clone()))
        })
    }

    pub fn add_field(&self, id: &str, field: Field) -> ServiceResult<StoredCharacter> {
        self.mutate(id, "add_field", |character| {
            character.add_new_field(field.clone())
        })
    }

    pub fn rename_field(
        &self,
        id: &str,
        field_name: &str,
        new_name: &str,
    ) -> ServiceResult<StoredCharacter> {
        self.mutate(id, "rename_field", |character| {
            character.rename_field(field_name, new_name)
        })
    }

    pub fn remove_field(&self, id: &str, field_name: &str) -> ServiceResult<StoredCharacter> {
        self.mutate(id, "remove_field", |character| {
            character.remove_field(field_name)
        })
    }

    pub fn move_note(
        &self,
        id: &str,
        target_field_name: &str,
        note_id: &str,
    ) -> ServiceResult<StoredCharacter> {
        self.mutate(id, "move_note", |character| {
            character.move_note_between_fields(target_field_name, note_id)
        })
    }

    pub fn upsert_note(
        &self,
        id: &str,
        field_name: &str,
        note: Note,
    ) -> ServiceResult<StoredCharacter> {
        self.mutate(id, "upsert_note", |character| {
            character.add_or_update_note_in_field(field_name, note.clone())
        })
    }

    pub fn delete_note(
        &self,
        id: &str,
        field_name: &str,
        note_id: &str,
    ) -> ServiceResult<StoredCharacter> {
        self.mutate(id, "delete_note", |character| {
            character.delete_note_by_id(field_name, note_id)
        })
    }

    fn mutate(
        &self,
        id: &str,
        operation: &'static str,
        apply: impl Fn(&Character) -> SheetResult<Character>,
    ) -> ServiceResult<StoredCharacter> {
        for attempt in 1..=MAX_SWAP_ATTEMPTS {
            let current = self.get_character(id)?;
            let next = apply(&current.character).map_err(|err| {
                debug!(
                    "event=character_mutate module=service status=rejected op={} character_id={} error={}",
                    operation, id, err
                );
                err
            })?;

            if next == current.character {
                return Ok(current);
            }

            match self.repo.compare_and_swap(id, current.version, &next) {
                Ok(version) => {
                    info!(
                        "event=character_mutate module=service status=ok op={} character_id={} version={}",
                        operation, id, version
                    );
                    return Ok(StoredCharacter {
                        character: next,
                        version,
                    });
                }
                Err(RepoError::VersionConflict { actual, .. }) => {
                    warn!(
                        "event=character_mutate module=service status=conflict op={} character_id={} attempt={} expected_version={} actual_version={}",
                        operation, id, attempt, current.version, actual
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(CharacterServiceError::ConflictRetriesExhausted {
            id: id.to_string(),
            attempts: MAX_SWAP_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::CreateCharacterRequest;
    use crate::model::error::SheetError;
    use serde_json::json;

    #[test]
    fn request_rejects_duplicate_note_ids() {
        let body = json!({
            "fields": [{
                "name": "Stats",
                "notes": [{"id": "n1", "value": "a"}, {"id": "n1", "value": "b"}]
            }]
        });
        assert_eq!(
            CreateCharacterRequest::from_json(&body),
            Err(SheetError::DuplicateNoteId("n1".to_string()))
        );
    }

    #[test]
    fn request_requires_fields_key() {
        let err = CreateCharacterRequest::from_json(&json!({})).unwrap_err();
        assert!(matches!(err, SheetError::MalformedJson(_)));
    }
}
