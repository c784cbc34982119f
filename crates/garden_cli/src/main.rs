//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `garden_core` linkage, configuration loading and store bootstrap.
//! - Keep output line-oriented (`key=value`) for quick local sanity checks.
//!
//! Usage: `garden_cli [config.json]`

use garden_core::db::migrations::latest_version;
use garden_core::{
    core_version, init_from_config, is_quiet_time, load_config, open_db, open_db_in_memory, ping,
    GardenConfig,
};
use log::info;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("garden_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(&path).map_err(|err| format!("{path}: {err}"))?,
        None => GardenConfig::default(),
    };
    let logging = init_from_config(&config)?;

    println!("garden_core ping={}", ping());
    println!("garden_core version={}", core_version());
    println!("logging active={logging}");

    let conn = match &config.database_path {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    }
    .map_err(|err| err.to_string())?;
    let schema_version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .map_err(|err| err.to_string())?;
    println!("schema version={schema_version} latest={}", latest_version());
    println!("circle max_members={}", config.circle_max_members);

    if let Some(schedule) = &config.quiet_hours {
        let now = chrono::Local::now();
        println!("quiet_hours active={}", is_quiet_time(schedule, &now));
    }

    info!("event=cli_probe module=cli status=ok schema_version={schema_version}");
    Ok(())
}
