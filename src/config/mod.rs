//! Configuration module for simsession-rs
//!
//! This module handles session configuration including:
//! - Ring buffer sizing and record cadence
//! - Tick timing (simulation step, real-time lock, playback rate)
//! - Publish and reporting periods
//! - Logging and chart refresh settings
//!
//! # Config Location
//!
//! The default config file is stored in the platform-appropriate location:
//! - **Linux**: `~/.config/dev.simsession/session.toml`
//! - **macOS**: `~/Library/Application Support/dev.simsession/session.toml`
//! - **Windows**: `%APPDATA%\dev.simsession\session.toml`
//!
//! Every field has a default, so a partial file (or none at all) is valid.
//! Environment variables prefixed with `SIMSESSION_` override file values.
//!
//! # Example
//!
//! ```ignore
//! use simsession_rs::config::SessionConfig;
//!
//! let mut config = SessionConfig::load_or_default(None);
//! config.apply_env_overrides();
//! config.validate()?;
//! ```

use crate::error::{Result, ResultExt, SessionError};
use crate::session::{SessionMode, SessionTiming};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "dev.simsession";

/// Config filename
pub const CONFIG_FILE: &str = "session.toml";

/// Default ring buffer size in samples
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Default simulation time per run tick (1e-4 s)
pub const DEFAULT_SESSION_DT_NS: u64 = 100_000;

/// Default minimum time between snapshot publishes (30 Hz)
pub const DEFAULT_PUBLISH_PERIOD_NS: u64 = 1_000_000_000 / 30;

/// Get the path of the default config file
pub fn default_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Complete session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session name, used in log output
    pub name: String,
    /// Ring buffer size in samples
    pub initial_buffer_size: usize,
    /// Run ticks per recorded sample
    pub buffer_record_tick_period: u32,
    /// Lock running ticks to wall-clock time
    pub run_at_real_time_rate: bool,
    /// Playback speed relative to real time
    pub playback_real_time_rate: f64,
    /// Simulated time advanced by one run tick, in nanoseconds
    pub session_dt_ns: u64,
    /// Minimum time between snapshot publishes, in nanoseconds
    pub buffer_publish_period_ns: u64,
    /// Tick period while paused
    pub pause_tick_period_ms: u64,
    /// Interval between periodic session-properties reports
    pub session_properties_period_ms: u64,
    /// Mode entered right after start
    pub initial_mode: SessionMode,
    pub logging: LoggingConfig,
    pub chart: ChartConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "session".to_string(),
            initial_buffer_size: DEFAULT_BUFFER_SIZE,
            buffer_record_tick_period: 1,
            run_at_real_time_rate: false,
            playback_real_time_rate: 1.0,
            session_dt_ns: DEFAULT_SESSION_DT_NS,
            buffer_publish_period_ns: DEFAULT_PUBLISH_PERIOD_NS,
            pause_tick_period_ms: 10,
            session_properties_period_ms: 500,
            initial_mode: SessionMode::Pause,
            logging: LoggingConfig::default(),
            chart: ChartConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        toml::from_str(&content)
            .map_err(SessionError::from)
            .with_context(|| format!("Failed to parse config file {:?}", path))
    }

    /// Load from `path`, or the default location when `None`.
    ///
    /// A missing or unreadable file yields defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(default_path) {
            Some(path) => path,
            None => return Self::default(),
        };
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory {:?}", parent))?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(SessionError::from)
            .context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {:?}", path))
    }

    /// Override fields from `SIMSESSION_*` environment variables.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(size) = env_value("SIMSESSION_BUFFER_SIZE") {
            self.initial_buffer_size = size;
        }
        if let Some(period) = env_value("SIMSESSION_RECORD_TICK_PERIOD") {
            self.buffer_record_tick_period = period;
        }
        if let Some(realtime) = env_value("SIMSESSION_RUN_REALTIME") {
            self.run_at_real_time_rate = realtime;
        }
        if let Some(rate) = env_value("SIMSESSION_PLAYBACK_RATE") {
            self.playback_real_time_rate = rate;
        }
        if let Some(period) = env_value("SIMSESSION_PUBLISH_PERIOD_NS") {
            self.buffer_publish_period_ns = period;
        }
    }

    /// Check that every value the scheduler divides by or sizes with is positive.
    pub fn validate(&self) -> Result<()> {
        if self.initial_buffer_size == 0 {
            return Err(SessionError::Config(
                "initial_buffer_size must be positive".to_string(),
            ));
        }
        if self.buffer_record_tick_period == 0 {
            return Err(SessionError::Config(
                "buffer_record_tick_period must be positive".to_string(),
            ));
        }
        if self.session_dt_ns == 0 {
            return Err(SessionError::Config("session_dt_ns must be positive".to_string()));
        }
        if !self.playback_real_time_rate.is_finite() || self.playback_real_time_rate <= 0.0 {
            return Err(SessionError::Config(format!(
                "playback_real_time_rate must be positive, got {}",
                self.playback_real_time_rate
            )));
        }
        if self.pause_tick_period_ms == 0 {
            return Err(SessionError::Config(
                "pause_tick_period_ms must be positive".to_string(),
            ));
        }
        if self.chart.refresh_period_ms == 0 {
            return Err(SessionError::Config(
                "chart.refresh_period_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timing(&self) -> SessionTiming {
        SessionTiming {
            session_dt: Duration::from_nanos(self.session_dt_ns),
            buffer_record_tick_period: self.buffer_record_tick_period,
            run_at_real_time_rate: self.run_at_real_time_rate,
            playback_real_time_rate: self.playback_real_time_rate,
            pause_tick_period: Duration::from_millis(self.pause_tick_period_ms),
        }
    }

    pub fn publish_period(&self) -> Duration {
        Duration::from_nanos(self.buffer_publish_period_ns)
    }

    pub fn session_properties_period(&self) -> Duration {
        Duration::from_millis(self.session_properties_period_ms)
    }
}

fn env_value<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}

/// Logging output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Optional log file, written in addition to stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            file: None,
        }
    }
}

/// Chart executor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Time between pipeline update cycles
    pub refresh_period_ms: u64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            refresh_period_ms: 33,
        }
    }
}

impl ChartConfig {
    pub fn refresh_period(&self) -> Duration {
        Duration::from_millis(self.refresh_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.initial_buffer_size, 8192);
        assert_eq!(config.buffer_record_tick_period, 1);
        assert_eq!(config.initial_mode, SessionMode::Pause);
        assert_eq!(config.publish_period(), Duration::from_nanos(33_333_333));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = SessionConfig::default();
        config.name = "pendulum".to_string();
        config.initial_buffer_size = 1024;
        config.initial_mode = SessionMode::Running;
        config.logging.file = Some(PathBuf::from("session.log"));
        config.save(&path).unwrap();

        let loaded = SessionConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "initial_buffer_size = 64\n[chart]\nrefresh_period_ms = 10\n")
            .unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.initial_buffer_size, 64);
        assert_eq!(config.chart.refresh_period_ms, 10);
        assert_eq!(config.session_dt_ns, DEFAULT_SESSION_DT_NS);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_load_or_default_on_missing_or_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert_eq!(SessionConfig::load_or_default(Some(&missing)), SessionConfig::default());

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "initial_buffer_size = \"lots\"").unwrap();
        assert!(SessionConfig::load(&bad).is_err());
        assert_eq!(SessionConfig::load_or_default(Some(&bad)), SessionConfig::default());
    }

    #[test]
    fn test_validate_rejects_non_positive() {
        let mut config = SessionConfig::default();
        config.initial_buffer_size = 0;
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.playback_real_time_rate = -1.0;
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.buffer_record_tick_period = 0;
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.session_dt_ns = 0;
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.pause_tick_period_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pause_tick_period_ms"));

        let mut config = SessionConfig::default();
        config.chart.refresh_period_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = SessionConfig::load(&missing).unwrap_err();
        assert!(err.to_string().starts_with("Failed to read config file"));
        assert!(matches!(
            err,
            SessionError::WithContext { ref source, .. } if matches!(**source, SessionError::Io(_))
        ));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "initial_buffer_size = [").unwrap();
        let err = SessionConfig::load(&bad).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse config file"));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_save_into_file_path_fails_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let err = SessionConfig::default()
            .save(blocker.join(CONFIG_FILE))
            .unwrap_err();
        assert!(err.to_string().contains("blocker"));
    }

    #[test]
    fn test_timing_conversion() {
        let mut config = SessionConfig::default();
        config.session_dt_ns = 1_000_000;
        config.buffer_record_tick_period = 4;
        let timing = config.timing();
        assert_eq!(timing.session_dt, Duration::from_millis(1));
        assert_eq!(timing.time_increment(), Duration::from_millis(4));
        assert_eq!(timing.pause_tick_period, Duration::from_millis(10));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("SIMSESSION_BUFFER_SIZE", "256");
        std::env::set_var("SIMSESSION_RUN_REALTIME", "true");
        std::env::set_var("SIMSESSION_PLAYBACK_RATE", "not-a-number");

        let mut config = SessionConfig::default();
        config.apply_env_overrides();

        std::env::remove_var("SIMSESSION_BUFFER_SIZE");
        std::env::remove_var("SIMSESSION_RUN_REALTIME");
        std::env::remove_var("SIMSESSION_PLAYBACK_RATE");

        assert_eq!(config.initial_buffer_size, 256);
        assert!(config.run_at_real_time_rate);
        assert_eq!(config.playback_real_time_rate, 1.0);
    }

    #[test]
    #[serial]
    fn test_env_overrides_absent() {
        std::env::remove_var("SIMSESSION_BUFFER_SIZE");
        let mut config = SessionConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.initial_buffer_size, DEFAULT_BUFFER_SIZE);
    }
}
