//! TOML-based engine configuration.
//!
//! Stores tunables for:
//! - Reward multipliers and the momentum window
//! - Retry behaviour of the completion transaction
//! - Achievement debounce window
//! - Rotation purge policy
//! - The household's local UTC offset
//!
//! Configuration is stored at `<data dir>/config.toml`.

use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::calendar::offset_from_minutes;
use crate::error::ConfigError;

/// Reward multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    #[serde(default = "default_momentum_multiplier")]
    pub momentum_multiplier: f64,
    #[serde(default = "default_momentum_window_minutes")]
    pub momentum_window_minutes: u32,
    #[serde(default = "default_momentum_min_completions")]
    pub momentum_min_completions: u32,
    #[serde(default = "default_affinity_multiplier")]
    pub affinity_multiplier: f64,
    #[serde(default = "default_first_of_day_multiplier")]
    pub first_of_day_multiplier: f64,
}

/// Upper bound for `achievements.debounce_ms` (one hour).
pub const MAX_DEBOUNCE_MS: u64 = 60 * 60 * 1000;
/// Upper bound for `completion.retry_backoff_ms`.
pub const MAX_RETRY_BACKOFF_MS: u64 = 60 * 1000;
/// Upper bound for `completion.busy_timeout_ms`.
pub const MAX_BUSY_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// Completion transaction retry behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Attempts of the whole read-decide-write before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// How long a connection waits for the write lock.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementsConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Remove archived completions from the live history.
    #[serde(default)]
    pub purge_archived_events: bool,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reward: RewardConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub achievements: AchievementsConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
    /// Minutes east of UTC defining the household's calendar day.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

// Default functions
fn default_momentum_multiplier() -> f64 {
    1.5
}
fn default_momentum_window_minutes() -> u32 {
    120
}
fn default_momentum_min_completions() -> u32 {
    2
}
fn default_affinity_multiplier() -> f64 {
    1.25
}
fn default_first_of_day_multiplier() -> f64 {
    2.0
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    25
}
fn default_busy_timeout_ms() -> u64 {
    2_000
}
fn default_debounce_ms() -> u64 {
    1_000
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            momentum_multiplier: default_momentum_multiplier(),
            momentum_window_minutes: default_momentum_window_minutes(),
            momentum_min_completions: default_momentum_min_completions(),
            affinity_multiplier: default_affinity_multiplier(),
            first_of_day_multiplier: default_first_of_day_multiplier(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for AchievementsConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reward: RewardConfig::default(),
            completion: CompletionConfig::default(),
            achievements: AchievementsConfig::default(),
            rotation: RotationConfig::default(),
            utc_offset_minutes: 0,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current
                    .get_mut(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                continue;
            }

            let obj = current
                .as_object_mut()
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
            let existing = obj
                .get(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<i64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(serde_json::Value::Number)
                            .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as number")));
                    }
                }
                serde_json::Value::Object(_) => {
                    return Err(invalid("cannot replace a whole section".into()));
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(err) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: err.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!("falling back to default config: {err}");
                Self::default()
            }
        }
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without persisting.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse or
    /// fails validation; `self` is unchanged in that case.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Reject values that would break reward or retry semantics.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let multipliers = [
            ("reward.momentum_multiplier", self.reward.momentum_multiplier),
            ("reward.affinity_multiplier", self.reward.affinity_multiplier),
            ("reward.first_of_day_multiplier", self.reward.first_of_day_multiplier),
        ];
        for (key, value) in multipliers {
            if !value.is_finite() || value < 1.0 {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: format!("multiplier must be a finite number >= 1.0, got {value}"),
                });
            }
        }
        if self.completion.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "completion.max_attempts".into(),
                message: "at least one attempt is required".into(),
            });
        }
        let windows = [
            ("completion.retry_backoff_ms", self.completion.retry_backoff_ms, MAX_RETRY_BACKOFF_MS),
            ("completion.busy_timeout_ms", self.completion.busy_timeout_ms, MAX_BUSY_TIMEOUT_MS),
            ("achievements.debounce_ms", self.achievements.debounce_ms, MAX_DEBOUNCE_MS),
        ];
        for (key, value, max) in windows {
            if value > max {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: format!("must be at most {max} ms, got {value}"),
                });
            }
        }
        Ok(())
    }

    pub fn utc_offset(&self) -> FixedOffset {
        offset_from_minutes(self.utc_offset_minutes)
    }

    pub fn busy_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.completion.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: Config = toml::from_str("utc_offset_minutes = 60\n[reward]\naffinity_multiplier = 1.5\n").unwrap();
        assert_eq!(parsed.utc_offset_minutes, 60);
        assert_eq!(parsed.reward.affinity_multiplier, 1.5);
        assert_eq!(parsed.reward.momentum_multiplier, 1.5);
        assert_eq!(parsed.completion.max_attempts, 3);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("reward.momentum_window_minutes").as_deref(), Some("120"));
        assert_eq!(cfg.get("rotation.purge_archived_events").as_deref(), Some("false"));
        assert!(cfg.get("reward.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("reward.first_of_day_multiplier", "3").unwrap();
        cfg.set("rotation.purge_archived_events", "true").unwrap();
        cfg.set("utc_offset_minutes", "-300").unwrap();
        assert_eq!(cfg.reward.first_of_day_multiplier, 3.0);
        assert!(cfg.rotation.purge_archived_events);
        assert_eq!(cfg.utc_offset_minutes, -300);
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_type() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("reward.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(cfg.set("rotation.purge_archived_events", "maybe").is_err());
        assert!(cfg.set("reward", "1").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn set_rejects_multiplier_below_one() {
        let mut cfg = Config::default();
        assert!(cfg.set("reward.momentum_multiplier", "0.5").is_err());
        assert_eq!(cfg.reward.momentum_multiplier, 1.5);
    }

    #[test]
    fn set_rejects_out_of_range_windows() {
        let mut cfg = Config::default();
        assert!(cfg.set("achievements.debounce_ms", "9223372036854775807").is_err());
        assert!(cfg.set("achievements.debounce_ms", &(MAX_DEBOUNCE_MS + 1).to_string()).is_err());
        assert_eq!(cfg.achievements.debounce_ms, 1000);
        cfg.set("achievements.debounce_ms", &MAX_DEBOUNCE_MS.to_string()).unwrap();
        assert_eq!(cfg.achievements.debounce_ms, MAX_DEBOUNCE_MS);

        assert!(cfg.set("completion.retry_backoff_ms", "18446744073709551615").is_err());
        assert!(cfg.set("completion.busy_timeout_ms", "18446744073709551615").is_err());
    }

    #[test]
    fn load_from_rejects_out_of_range_debounce() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[achievements]\ndebounce_ms = 9223372036854775807\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set("completion.max_attempts", "5").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().completion.max_attempts, 5);
    }
}
