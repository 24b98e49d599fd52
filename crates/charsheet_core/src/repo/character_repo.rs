//! Versioned character store and its SQLite implementation.
//!
//! # Responsibility
//! - Persist whole character documents keyed by character id.
//! - Provide compare-and-swap replacement so concurrent writers to one id
//!   cannot lose each other's updates.
//!
//! # Invariants
//! - `version` starts at 1 and grows by exactly 1 per successful swap.
//! - Read paths re-validate persisted documents and reject invalid state.
//! - Multi-step writes run inside one `IMMEDIATE` transaction.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::character::Character;
use crate::model::error::SheetError;
use crate::model::CharacterId;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Monotonic per-character version counter.
pub type CharacterVersion = i64;

pub type RepoResult<T> = Result<T, RepoError>;

const CHARACTER_SELECT_SQL: &str = "SELECT id, version, document FROM characters";

/// Errors from character persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// No character with this id is stored.
    NotFound(CharacterId),
    /// A character with this id is already stored.
    AlreadyExists(CharacterId),
    /// Stored version differs from the caller's expectation.
    VersionConflict {
        id: CharacterId,
        expected: CharacterVersion,
        actual: CharacterVersion,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required column is missing from `characters`.
    MissingRequiredColumn(&'static str),
    /// Persisted document decodes but breaks an aggregate invariant.
    Sheet(SheetError),
    /// Persisted row cannot be decoded or does not match its key.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "character not found: {id}"),
            Self::AlreadyExists(id) => write!(f, "character already exists: {id}"),
            Self::VersionConflict {
                id,
                expected,
                actual,
            } => write!(
                f,
                "character {id} is at version {actual}, expected {expected}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "character repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredColumn(column) => write!(
                f,
                "character repository requires column `{column}` in table `characters`"
            ),
            Self::Sheet(err) => write!(f, "persisted character violates invariant: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted character: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Sheet(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<SheetError> for RepoError {
    fn from(value: SheetError) -> Self {
        Self::Sheet(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One persisted character together with its store version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCharacter {
    pub character: Character,
    pub version: CharacterVersion,
}

/// Key-value store contract for character documents.
///
/// Implementations must make `compare_and_swap` atomic per id.
pub trait CharacterRepository {
    /// Inserts a new character at version 1.
    fn create_character(&self, character: &Character) -> RepoResult<StoredCharacter>;
    /// Loads one character by id.
    fn get_character(&self, id: &str) -> RepoResult<Option<StoredCharacter>>;
    /// Lists every stored character in creation order.
    fn list_characters(&self) -> RepoResult<Vec<StoredCharacter>>;
    /// Replaces the document if the stored version equals `expected_version`.
    ///
    /// Returns the new version.
    fn compare_and_swap(
        &self,
        id: &str,
        expected_version: CharacterVersion,
        character: &Character,
    ) -> RepoResult<CharacterVersion>;
    /// Removes one character.
    fn delete_character(&self, id: &str) -> RepoResult<()>;
}

/// SQLite-backed character repository.
pub struct SqliteCharacterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCharacterRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl CharacterRepository for SqliteCharacterRepository<'_> {
    fn create_character(&self, character: &Character) -> RepoResult<StoredCharacter> {
        let document = encode_document(character)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if stored_version(&tx, character.id())?.is_some() {
            return Err(RepoError::AlreadyExists(character.id().to_string()));
        }
        tx.execute(
            "INSERT INTO characters (id, version, document) VALUES (?1, 1, ?2);",
            params![character.id(), document],
        )?;
        tx.commit()?;

        debug!(
            "event=character_insert module=repo status=ok character_id={} fields={}",
            character.id(),
            character.fields().len()
        );
        Ok(StoredCharacter {
            character: character.clone(),
            version: 1,
        })
    }

    fn get_character(&self, id: &str) -> RepoResult<Option<StoredCharacter>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CHARACTER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_character_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_characters(&self) -> RepoResult<Vec<StoredCharacter>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CHARACTER_SELECT_SQL} ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut characters = Vec::new();
        while let Some(row) = rows.next()? {
            characters.push(parse_character_row(row)?);
        }
        Ok(characters)
    }

    fn compare_and_swap(
        &self,
        id: &str,
        expected_version: CharacterVersion,
        character: &Character,
    ) -> RepoResult<CharacterVersion> {
        if character.id() != id {
            return Err(RepoError::InvalidData(format!(
                "document id `{}` does not match key `{id}`",
                character.id()
            )));
        }
        let document = encode_document(character)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let actual =
            stored_version(&tx, id)?.ok_or_else(|| RepoError::NotFound(id.to_string()))?;
        if actual != expected_version {
            return Err(RepoError::VersionConflict {
                id: id.to_string(),
                expected: expected_version,
                actual,
            });
        }

        let next_version = actual + 1;
        tx.execute(
            "UPDATE characters
             SET
                version = ?1,
                document = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?3;",
            params![next_version, document, id],
        )?;
        tx.commit()?;

        debug!(
            "event=character_swap module=repo status=ok character_id={} version={}",
            id, next_version
        );
        Ok(next_version)
    }

    fn delete_character(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM characters WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn stored_version(conn: &Connection, id: &str) -> RepoResult<Option<CharacterVersion>> {
    let version = conn
        .query_row(
            "SELECT version FROM characters WHERE id = ?1;",
            [id],
            |row| row.get::<_, CharacterVersion>(0),
        )
        .optional()?;
    Ok(version)
}

fn encode_document(character: &Character) -> RepoResult<String> {
    serde_json::to_string(&character.to_json())
        .map_err(|err| RepoError::InvalidData(format!("cannot encode character: {err}")))
}

fn parse_character_row(row: &Row<'_>) -> RepoResult<StoredCharacter> {
    let id: String = row.get("id")?;
    let version: CharacterVersion = row.get("version")?;
    let document: String = row.get("document")?;

    let value: serde_json::Value = serde_json::from_str(&document)
        .map_err(|err| RepoError::InvalidData(format!("character {id}: {err}")))?;
    let character = Character::from_json(&value).map_err(|err| match err {
        SheetError::MalformedJson(message) => {
            RepoError::InvalidData(format!("character {id}: {message}"))
        }
        other => RepoError::Sheet(other),
    })?;
    if character.id() != id {
        return Err(RepoError::InvalidData(format!(
            "character {id}: document carries id `{}`",
            character.id()
        )));
    }

    Ok(StoredCharacter { character, version })
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let mut stmt = conn.prepare("PRAGMA table_info(characters);")?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }
    for column in ["id", "version", "document", "created_at", "updated_at"] {
        if !columns.iter().any(|existing| existing == column) {
            return Err(RepoError::MissingRequiredColumn(column));
        }
    }
    Ok(())
}
