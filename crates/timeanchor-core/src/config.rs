//! TOML-based anchoring configuration.
//!
//! Covers:
//! - Working hours and the wall-clock offset gaps are classified in
//! - Gap thresholds and optional slot partitioning
//! - Scoring mode, top-N, concurrency and oracle timeout
//! - Oracle endpoint settings
//!
//! Configuration is stored at `~/.config/timeanchor/config.toml`.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::coordinator::ScoringMode;
use crate::error::{ConfigError, Result};
use crate::timeline::{GapFinder, WorkingHours};

/// Returns `~/.config/timeanchor[-dev]/` based on TIMEANCHOR_ENV.
///
/// Set TIMEANCHOR_ENV=dev to use the development directory.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir().ok_or(ConfigError::NoConfigDir)?.join(".config");

    let env = std::env::var("TIMEANCHOR_ENV").unwrap_or_else(|_| "production".to_string());
    let dir = if env == "dev" {
        base_dir.join("timeanchor-dev")
    } else {
        base_dir.join("timeanchor")
    };
    Ok(dir)
}

/// Working-hours configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingHoursConfig {
    /// HH:MM
    #[serde(default = "default_start")]
    pub start: String,
    /// HH:MM; at or before `start` wraps past midnight
    #[serde(default = "default_end")]
    pub end: String,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

/// Gap detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapsConfig {
    #[serde(default = "default_min_gap")]
    pub min_gap_minutes: i64,
    /// Split longer gaps into slots of at most this many minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_slot_minutes: Option<i64>,
}

/// Scoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub mode: ScoringMode,
    #[serde(default = "default_true")]
    pub cost_optimized: bool,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_oracle_timeout")]
    pub oracle_timeout_secs: u64,
    /// Adjacent events on each side of a slot sent to the oracle
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

/// Scoring oracle connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Anchoring configuration.
///
/// Serialized to/from TOML at `~/.config/timeanchor/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnchorConfig {
    #[serde(default)]
    pub working_hours: WorkingHoursConfig,
    #[serde(default)]
    pub gaps: GapsConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
}

// Default functions
fn default_start() -> String {
    "06:00".into()
}
fn default_end() -> String {
    "22:00".into()
}
fn default_min_gap() -> i64 {
    15
}
fn default_true() -> bool {
    true
}
fn default_top_n() -> usize {
    3
}
fn default_max_concurrency() -> usize {
    4
}
fn default_oracle_timeout() -> u64 {
    20
}
fn default_context_window() -> usize {
    2
}
fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_temperature() -> f32 {
    0.2
}

impl Default for WorkingHoursConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: default_end(),
            utc_offset_minutes: 0,
        }
    }
}

impl Default for GapsConfig {
    fn default() -> Self {
        Self {
            min_gap_minutes: default_min_gap(),
            max_slot_minutes: None,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            mode: ScoringMode::default(),
            cost_optimized: true,
            top_n: default_top_n(),
            max_concurrency: default_max_concurrency(),
            oracle_timeout_secs: default_oracle_timeout(),
            context_window: default_context_window(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
        }
    }
}

impl FromStr for AnchorConfig {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }
}

impl AnchorConfig {
    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load and validate a config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: AnchorConfig = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Persist to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Check value ranges and the working-hours format.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        self.working_hours()?;
        self.utc_offset()?;

        if self.gaps.min_gap_minutes < 1 {
            return Err(invalid("gaps.min_gap_minutes", "must be at least 1".into()));
        }
        if let Some(max) = self.gaps.max_slot_minutes {
            if max < self.gaps.min_gap_minutes {
                return Err(invalid(
                    "gaps.max_slot_minutes",
                    format!("{max} is below min_gap_minutes ({})", self.gaps.min_gap_minutes),
                ));
            }
        }
        if self.scoring.top_n < 1 {
            return Err(invalid("scoring.top_n", "must be at least 1".into()));
        }
        if self.scoring.max_concurrency < 1 {
            return Err(invalid("scoring.max_concurrency", "must be at least 1".into()));
        }
        if self.scoring.oracle_timeout_secs == 0 {
            return Err(invalid("scoring.oracle_timeout_secs", "must be positive".into()));
        }
        if !(0.0..=2.0).contains(&self.oracle.temperature) {
            return Err(invalid("oracle.temperature", "must be within 0.0-2.0".into()));
        }
        Ok(())
    }

    pub fn working_hours(&self) -> Result<WorkingHours, ConfigError> {
        WorkingHours::parse(&self.working_hours.start, &self.working_hours.end).map_err(|e| {
            ConfigError::InvalidValue {
                key: "working_hours".into(),
                message: e.to_string(),
            }
        })
    }

    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        let minutes = self.working_hours.utc_offset_minutes;
        FixedOffset::east_opt(minutes * 60).ok_or_else(|| ConfigError::InvalidValue {
            key: "working_hours.utc_offset_minutes".into(),
            message: format!("{minutes} is out of range"),
        })
    }

    /// Gap finder configured from the `[gaps]` and offset settings.
    pub fn gap_finder(&self) -> Result<GapFinder, ConfigError> {
        Ok(GapFinder::new()
            .with_min_gap(self.gaps.min_gap_minutes)
            .with_max_slot(self.gaps.max_slot_minutes)
            .with_offset(self.utc_offset()?))
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.scoring.oracle_timeout_secs)
    }
}
