//! TOML-based application configuration.
//!
//! Stores engine tuning and first-run preferences:
//! - Debounce delay for record writes
//! - Poll interval of the cross-tab fallback
//! - Render frame interval of the `watch` loop
//! - Last-seconds tick window
//! - Signal defaults for brand-new records
//!
//! Configuration is stored at `<data_dir>/config.toml`. Out-of-range values
//! are clamped on load rather than rejected.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::timer::SignalPrefs;

/// Signal defaults applied when a timer page is opened for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalsConfig {
    #[serde(default = "default_true")]
    pub sound: bool,
    #[serde(default = "default_true")]
    pub flash: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default = "default_last_seconds_window_ms")]
    pub last_seconds_window_ms: u64,
    #[serde(default)]
    pub signals: SignalsConfig,
}

// Default functions
fn default_debounce_ms() -> u64 {
    150
}
fn default_poll_interval_ms() -> u64 {
    200
}
fn default_frame_interval_ms() -> u64 {
    50
}
fn default_last_seconds_window_ms() -> u64 {
    10_000
}
fn default_true() -> bool {
    true
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            sound: true,
            flash: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            frame_interval_ms: default_frame_interval_ms(),
            last_seconds_window_ms: default_last_seconds_window_ms(),
            signals: SignalsConfig::default(),
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
        let unknown = || ConfigError::InvalidValue {
            key: key.to_string(),
            message: "unknown config key".into(),
        };
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => value
                        .parse::<bool>()
                        .map(serde_json::Value::Bool)
                        .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) => return Err(invalid("not a leaf key".into())),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location, `<data_dir>/config.toml`.
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the default location, writing defaults if nothing exists yet.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// default config cannot be written.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content)
                    .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                Ok(cfg.clamped())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "using default config");
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

    /// Set a config value by dot-separated key. The result is clamped; call
    /// [`save`](Config::save) to persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let cfg: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        *self = cfg.clamped();
        Ok(())
    }

    /// Clamp every value into its working range.
    pub fn clamped(mut self) -> Self {
        self.debounce_ms = self.debounce_ms.min(5_000);
        self.poll_interval_ms = self.poll_interval_ms.clamp(20, 10_000);
        self.frame_interval_ms = self.frame_interval_ms.clamp(10, 1_000);
        self.last_seconds_window_ms = self.last_seconds_window_ms.min(60_000);
        self
    }

    pub fn first_run_signal(&self) -> SignalPrefs {
        SignalPrefs {
            sound: self.signals.sound,
            flash: self.signals.flash,
        }
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
        assert_eq!(parsed.debounce_ms, 150);
        assert_eq!(parsed.poll_interval_ms, 200);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("debounce_ms = 300\n[signals]\nsound = false\n").unwrap();
        assert_eq!(parsed.debounce_ms, 300);
        assert_eq!(parsed.frame_interval_ms, 50);
        assert!(!parsed.signals.sound);
        assert!(parsed.signals.flash);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("signals.sound").as_deref(), Some("true"));
        assert_eq!(cfg.get("poll_interval_ms").as_deref(), Some("200"));
        assert!(cfg.get("signals.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_nested_bool_and_number() {
        let mut cfg = Config::default();
        cfg.set("signals.flash", "false").unwrap();
        cfg.set("debounce_ms", "400").unwrap();
        assert!(!cfg.signals.flash);
        assert_eq!(cfg.debounce_ms, 400);
        assert_eq!(
            cfg.first_run_signal(),
            SignalPrefs {
                sound: true,
                flash: false
            }
        );
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_type() {
        let mut cfg = Config::default();
        assert!(cfg.set("signals.volume", "3").is_err());
        assert!(cfg.set("signals.sound", "loud").is_err());
        assert!(cfg.set("signals", "true").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn set_clamps_out_of_range_values() {
        let mut cfg = Config::default();
        cfg.set("frame_interval_ms", "1").unwrap();
        assert_eq!(cfg.frame_interval_ms, 10);
    }

    #[test]
    fn load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        std::fs::write(&path, "poll_interval_ms = 999999\n").unwrap();
        assert_eq!(Config::load_from(&path).unwrap().poll_interval_ms, 10_000);

        std::fs::write(&path, "poll_interval_ms = \"fast\"\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseFailed(_))
        ));
    }
}
