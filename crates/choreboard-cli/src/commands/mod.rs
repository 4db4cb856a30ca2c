pub mod achievements;
pub mod config;
pub mod history;
pub mod household;
pub mod rotate;
pub mod task;

use std::error::Error;
use std::future::Future;

use choreboard_core::{data_dir, Config, HouseholdDb, HouseholdSession};
use serde::Serialize;

pub type CliResult = Result<(), Box<dyn Error>>;

/// Open the store in the data directory with the saved config.
pub fn open_db() -> Result<HouseholdDb, Box<dyn Error>> {
    let config = Config::load()?;
    let dir = data_dir()?;
    tracing::debug!(data_dir = %dir.display(), "opening store");
    Ok(HouseholdDb::open(&config)?)
}

pub fn open_session() -> Result<HouseholdSession, Box<dyn Error>> {
    let config = Config::load()?;
    let dir = data_dir()?;
    tracing::debug!(data_dir = %dir.display(), "opening session");
    Ok(HouseholdSession::open(config)?)
}

/// Drive one session future to completion.
pub fn block_on<F: Future>(future: F) -> Result<F::Output, Box<dyn Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
