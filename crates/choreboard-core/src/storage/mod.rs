mod config;
pub mod household_db;
pub mod migrations;

pub use config::{AchievementsConfig, CompletionConfig, Config, RewardConfig, RotationConfig};
pub use household_db::{CompletionReceipt, DeleteSummary, HouseholdDb, Reversion, StoreOptions, UnlockRecord};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `CHOREBOARD_DATA_DIR` wins when set; otherwise `~/.config/choreboard[-dev]/`
/// depending on `CHOREBOARD_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("CHOREBOARD_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("CHOREBOARD_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("choreboard-dev")
            } else {
                base_dir.join("choreboard")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
