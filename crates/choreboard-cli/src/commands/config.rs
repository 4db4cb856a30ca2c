//! Engine settings in `config.toml`.

use clap::Subcommand;
use choreboard_core::{Config, ConfigError};
use serde_json::json;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one setting
    Get {
        /// Dot-path key, e.g. "reward.momentum_multiplier" or "utc_offset_minutes"
        key: String,
    },
    /// Change one setting and save it
    Set {
        key: String,
        value: String,
    },
    /// Print every setting as JSON
    List,
    /// Overwrite the file with the defaults
    Reset,
}

pub fn run(action: ConfigAction) -> CliResult {
    match action {
        ConfigAction::Get { key } => get(&key),
        ConfigAction::Set { key, value } => set(&key, &value),
        ConfigAction::List => print_json(&Config::load_or_default()),
        ConfigAction::Reset => reset(),
    }
}

fn get(key: &str) -> CliResult {
    let value = Config::load_or_default()
        .get(key)
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
    println!("{value}");
    Ok(())
}

fn set(key: &str, value: &str) -> CliResult {
    let mut config = Config::load()?;
    let previous = config.get(key);
    config.set(key, value)?;
    config.save()?;
    tracing::info!(key, value, "config updated");
    print_json(&json!({
        "key": key,
        "previous": previous,
        "value": config.get(key),
    }))
}

fn reset() -> CliResult {
    let config = Config::default();
    config.save()?;
    print_json(&config)
}
