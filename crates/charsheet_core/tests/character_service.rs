use charsheet_core::db::open_db_in_memory;
use charsheet_core::{
    Character, CharacterRepository, CharacterService, CharacterServiceError, CharacterVersion,
    Field, Note, RepoResult, SheetError, SqliteCharacterRepository, StoredCharacter,
    MAX_SWAP_ATTEMPTS,
};
use charsheet_core::RepoError;
use rusqlite::params;
use serde_json::json;
use std::cell::Cell;
use std::error::Error;

fn note(id: &str, value: &str) -> Note {
    Note::with_id(id, value).unwrap()
}

fn fields_a_b() -> Vec<Field> {
    vec![
        Field::new("A", vec![note("n1", "x")]).unwrap(),
        Field::new("B", Vec::new()).unwrap(),
    ]
}

#[test]
fn create_get_and_list() {
    let conn = open_db_in_memory().unwrap();
    let service = CharacterService::new(SqliteCharacterRepository::try_new(&conn).unwrap());

    let created = service.create_character(fields_a_b()).unwrap();
    assert_eq!(created.version, 1);

    let loaded = service.get_character(created.character.id()).unwrap();
    assert_eq!(loaded, created);
    assert_eq!(service.list_characters().unwrap(), vec![created]);
}

#[test]
fn create_from_request_validates_fields() {
    let conn = open_db_in_memory().unwrap();
    let service = CharacterService::new(SqliteCharacterRepository::try_new(&conn).unwrap());

    let created = service
        .create_from_request(&json!({
            "fields": [{ "name": "Stats", "notes": [{ "id": "n1", "value": "x" }] }]
        }))
        .unwrap();
    assert_eq!(created.character.field("Stats").unwrap().len(), 1);

    let err = service
        .create_from_request(&json!({
            "fields": [{ "name": "Stats", "notes": [] }, { "name": "Stats", "notes": [] }]
        }))
        .unwrap_err();
    assert!(matches!(
        err,
        CharacterServiceError::Sheet(SheetError::DuplicateFieldName(name)) if name == "Stats"
    ));
    assert_eq!(service.list_characters().unwrap().len(), 1);
}

#[test]
fn mutations_persist_new_versions() {
    let conn = open_db_in_memory().unwrap();
    let service = CharacterService::new(SqliteCharacterRepository::try_new(&conn).unwrap());
    let id = service
        .create_character(fields_a_b())
        .unwrap()
        .character
        .id()
        .to_string();

    let moved = service.move_note(&id, "B", "n1").unwrap();
    assert_eq!(moved.version, 2);
    assert_eq!(moved.character.field("B").unwrap().notes(), [note("n1", "x")]);

    let upserted = service.upsert_note(&id, "B", note("n1", "y")).unwrap();
    assert_eq!(upserted.version, 3);

    let added = service.add_field(&id, Field::create(None, None).unwrap()).unwrap();
    assert_eq!(added.version, 4);

    let renamed = service.rename_field(&id, "New Field", "Notes").unwrap();
    let removed = service.remove_field(&id, "Notes").unwrap();
    assert_eq!(renamed.version, 5);
    assert_eq!(removed.version, 6);

    let deleted = service.delete_note(&id, "B", "n1").unwrap();
    assert_eq!(deleted.version, 7);
    assert_eq!(deleted.character.note_count(), 0);

    assert_eq!(service.get_character(&id).unwrap(), deleted);
}

#[test]
fn no_op_move_skips_write() {
    let conn = open_db_in_memory().unwrap();
    let service = CharacterService::new(SqliteCharacterRepository::try_new(&conn).unwrap());
    let id = service
        .create_character(fields_a_b())
        .unwrap()
        .character
        .id()
        .to_string();

    let unchanged = service.move_note(&id, "A", "n1").unwrap();
    assert_eq!(unchanged.version, 1);
}

#[test]
fn rejected_mutation_leaves_store_untouched() {
    let conn = open_db_in_memory().unwrap();
    let service = CharacterService::new(SqliteCharacterRepository::try_new(&conn).unwrap());
    let created = service.create_character(fields_a_b()).unwrap();
    let id = created.character.id();

    let err = service.move_note(id, "Nonexistent", "n1").unwrap_err();
    assert!(matches!(
        err,
        CharacterServiceError::Sheet(SheetError::TargetFieldNotFound(name)) if name == "Nonexistent"
    ));
    let err = service.replace_fields(id, vec![
        Field::new("A", Vec::new()).unwrap(),
        Field::new("A", Vec::new()).unwrap(),
    ]);
    assert!(matches!(
        err,
        Err(CharacterServiceError::Sheet(SheetError::DuplicateFieldName(_)))
    ));

    assert_eq!(service.get_character(id).unwrap(), created);
}

#[test]
fn missing_character_maps_to_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = CharacterService::new(SqliteCharacterRepository::try_new(&conn).unwrap());

    let err = service.move_note("ghost", "B", "n1").unwrap_err();
    assert!(matches!(err, CharacterServiceError::CharacterNotFound(id) if id == "ghost"));
    let err = service.delete_character("ghost").unwrap_err();
    assert!(matches!(err, CharacterServiceError::CharacterNotFound(_)));
}

/// Repository wrapper that lets another writer win the next `races` swaps.
struct RacingRepository<'conn> {
    inner: SqliteCharacterRepository<'conn>,
    races: Cell<u32>,
}

impl CharacterRepository for RacingRepository<'_> {
    fn create_character(&self, character: &Character) -> RepoResult<StoredCharacter> {
        self.inner.create_character(character)
    }

    fn get_character(&self, id: &str) -> RepoResult<Option<StoredCharacter>> {
        self.inner.get_character(id)
    }

    fn list_characters(&self) -> RepoResult<Vec<StoredCharacter>> {
        self.inner.list_characters()
    }

    fn compare_and_swap(
        &self,
        id: &str,
        expected_version: CharacterVersion,
        character: &Character,
    ) -> RepoResult<CharacterVersion> {
        if self.races.get() > 0 {
            self.races.set(self.races.get() - 1);
            let current = self.inner.get_character(id)?.unwrap();
            let concurrent = current
                .character
                .add_or_update_note_in_field("A", Note::create("concurrent").unwrap())
                .unwrap();
            self.inner
                .compare_and_swap(id, current.version, &concurrent)?;
        }
        self.inner.compare_and_swap(id, expected_version, character)
    }

    fn delete_character(&self, id: &str) -> RepoResult<()> {
        self.inner.delete_character(id)
    }
}

#[test]
fn conflicting_writer_is_retried_without_lost_update() {
    let conn = open_db_in_memory().unwrap();
    let service = CharacterService::new(RacingRepository {
        inner: SqliteCharacterRepository::try_new(&conn).unwrap(),
        races: Cell::new(1),
    });
    let id = service
        .create_character(fields_a_b())
        .unwrap()
        .character
        .id()
        .to_string();

    let stored = service.upsert_note(&id, "B", note("n2", "mine")).unwrap();
    assert_eq!(stored.version, 3);
    assert_eq!(stored.character.field("A").unwrap().len(), 2);
    assert_eq!(stored.character.field("B").unwrap().notes(), [note("n2", "mine")]);
}

#[test]
fn persistent_conflicts_exhaust_retries() {
    let conn = open_db_in_memory().unwrap();
    let service = CharacterService::new(RacingRepository {
        inner: SqliteCharacterRepository::try_new(&conn).unwrap(),
        races: Cell::new(MAX_SWAP_ATTEMPTS),
    });
    let id = service
        .create_character(fields_a_b())
        .unwrap()
        .character
        .id()
        .to_string();

    let err = service.upsert_note(&id, "B", note("n2", "mine")).unwrap_err();
    assert!(matches!(
        err,
        CharacterServiceError::ConflictRetriesExhausted { attempts, .. } if attempts == MAX_SWAP_ATTEMPTS
    ));
    let stored = service.get_character(&id).unwrap();
    assert!(stored.character.field("B").unwrap().is_empty());
}

#[test]
fn corrupted_stored_character_exposes_sheet_error_source() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO characters (id, version, document) VALUES (?1, 1, ?2);",
        params![
            "c1",
            r#"{"id":"c1","fields":[{"name":"A","notes":[]},{"name":"A","notes":[]}]}"#
        ],
    )
    .unwrap();
    let service = CharacterService::new(SqliteCharacterRepository::try_new(&conn).unwrap());

    let err = service.get_character("c1").unwrap_err();
    let sheet_err = err
        .source()
        .and_then(|repo_err| repo_err.source())
        .and_then(|inner| inner.downcast_ref::<SheetError>());
    assert_eq!(
        sheet_err,
        Some(&SheetError::DuplicateFieldName("A".to_string()))
    );
    assert!(matches!(
        err,
        CharacterServiceError::Repo(RepoError::Sheet(SheetError::DuplicateFieldName(_)))
    ));
}
