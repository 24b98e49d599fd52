//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `charsheet_core` linkage and storage bootstrap end to end.
//! - Walk one demo character through create, edit and move, printing JSON.
//!
//! Settings come from `CHARSHEET_LOG_LEVEL`, `CHARSHEET_LOG_DIR` and
//! `CHARSHEET_DB_PATH`.

use charsheet_core::db::open_db;
use charsheet_core::{
    core_version, init_logging, ping, process_config, CharacterService, Field, Note,
    SqliteCharacterRepository,
};
use log::error;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("charsheet_core ping={}", ping());
    println!("charsheet_core version={}", core_version());

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("charsheet demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = process_config();
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, &log_dir.to_string_lossy())?;
    }

    let conn = open_db(&config.db_path)?;
    let service = CharacterService::new(SqliteCharacterRepository::try_new(&conn)?);

    let stats = Field::new("Stats", vec![Note::create("Strength 14")?])?;
    let inventory = Field::create(Some("Inventory".to_string()), None)?;
    let stored = service.create_character(vec![stats, inventory])?;
    let id = stored.character.id().to_string();

    let rope = Note::create("50ft of rope")?;
    let rope_id = rope.id().to_string();
    service.upsert_note(&id, "Stats", rope)?;
    let moved = service.move_note(&id, "Inventory", &rope_id)?;

    println!("characters stored={}", service.list_characters()?.len());
    println!("version={}", moved.version);
    println!("{:#}", moved.character.to_json());
    Ok(())
}
