//! Process configuration.
//!
//! Loaded once at startup from a JSON file and handed to every component by
//! reference. The API token may live in the file or in `SPTRANS_TOKEN`
//! (a `.env` file is honoured by the binary); the environment wins.

use chrono::NaiveTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::analyzers::bunching::BunchingStrategy;

pub const TOKEN_ENV_VAR: &str = "SPTRANS_TOKEN";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "Config::default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "Config::default_line_catalog_path")]
    pub line_catalog_path: PathBuf,
    /// Numeric line ids (`cl` in the API, `id_linha` in the catalog).
    #[serde(default)]
    pub target_line_ids: Vec<i64>,
    /// Per-cycle collection summaries are appended here when set.
    #[serde(default)]
    pub stats_csv: Option<PathBuf>,
    #[serde(default)]
    pub positions: PositionsConfig,
    #[serde(default)]
    pub predictions: PredictionsConfig,
    #[serde(default)]
    pub detectors: DetectorConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Position collector schedule
#[derive(Debug, Clone, Deserialize)]
pub struct PositionsConfig {
    #[serde(default = "PositionsConfig::default_interval_secs")]
    pub interval_secs: u64,
    /// Cycles starting before this local time are skipped
    #[serde(default = "PositionsConfig::default_active_from")]
    pub active_from: NaiveTime,
    /// Cycles starting after this local time are skipped
    #[serde(default = "PositionsConfig::default_active_until")]
    pub active_until: NaiveTime,
    #[serde(default = "PositionsConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PositionsConfig {
    fn default() -> Self {
        Self {
            interval_secs: Self::default_interval_secs(),
            active_from: Self::default_active_from(),
            active_until: Self::default_active_until(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl PositionsConfig {
    fn default_interval_secs() -> u64 {
        30 * 60
    }
    fn default_active_from() -> NaiveTime {
        NaiveTime::from_hms_opt(5, 0, 0).unwrap_or(NaiveTime::MIN)
    }
    fn default_active_until() -> NaiveTime {
        NaiveTime::from_hms_opt(23, 0, 0).unwrap_or(NaiveTime::MIN)
    }
    fn default_timeout_secs() -> u64 {
        45
    }

    /// Whether a cycle starting at `now` falls inside the collection window (inclusive).
    ///
    /// `active_from` later than `active_until` is an overnight window.
    pub fn is_active(&self, now: NaiveTime) -> bool {
        if self.active_from <= self.active_until {
            self.active_from <= now && now <= self.active_until
        } else {
            now >= self.active_from || now <= self.active_until
        }
    }
}

/// Prediction collector schedule
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionsConfig {
    #[serde(default = "PredictionsConfig::default_interval_secs")]
    pub interval_secs: u64,
    /// Wait before retrying after a failed authentication
    #[serde(default = "PredictionsConfig::default_auth_retry_secs")]
    pub auth_retry_secs: u64,
    #[serde(default = "PredictionsConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PredictionsConfig {
    fn default() -> Self {
        Self {
            interval_secs: Self::default_interval_secs(),
            auth_retry_secs: Self::default_auth_retry_secs(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl PredictionsConfig {
    fn default_interval_secs() -> u64 {
        300
    }
    fn default_auth_retry_secs() -> u64 {
        60
    }
    fn default_timeout_secs() -> u64 {
        30
    }
}

/// Thresholds for the stuck-vehicle and bunching detectors
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "DetectorConfig::default_stuck_min_elapsed_minutes")]
    pub stuck_min_elapsed_minutes: f64,
    #[serde(default = "DetectorConfig::default_stuck_max_displacement_km")]
    pub stuck_max_displacement_km: f64,
    #[serde(default = "DetectorConfig::default_bunching_threshold_meters")]
    pub bunching_threshold_meters: f64,
    #[serde(default)]
    pub bunching_strategy: BunchingStrategy,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            stuck_min_elapsed_minutes: Self::default_stuck_min_elapsed_minutes(),
            stuck_max_displacement_km: Self::default_stuck_max_displacement_km(),
            bunching_threshold_meters: Self::default_bunching_threshold_meters(),
            bunching_strategy: BunchingStrategy::default(),
        }
    }
}

impl DetectorConfig {
    fn default_stuck_min_elapsed_minutes() -> f64 {
        10.0
    }
    fn default_stuck_max_displacement_km() -> f64 {
        0.1
    }
    fn default_bunching_threshold_meters() -> f64 {
        200.0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "MonitorConfig::default_stale_after_minutes")]
    pub stale_after_minutes: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            stale_after_minutes: Self::default_stale_after_minutes(),
        }
    }
}

impl MonitorConfig {
    fn default_stale_after_minutes() -> i64 {
        60
    }
}

impl Config {
    fn default_base_url() -> String {
        "http://api.olhovivo.sptrans.com.br/v2.1".to_string()
    }
    fn default_database_path() -> PathBuf {
        PathBuf::from("data/sptrans_data.db")
    }
    fn default_line_catalog_path() -> PathBuf {
        PathBuf::from("data/todas_as_linhas.csv")
    }

    /// Reads and parses the config file, then applies `SPTRANS_TOKEN` if set.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadError(format!("{}: {}", path.as_ref().display(), e))
        })?;

        let config = Self::from_json(&content)?;
        Ok(config.with_env_token(std::env::var(TOKEN_ENV_VAR).ok()))
    }

    /// A non-blank `env_token` replaces the file token.
    pub fn with_env_token(mut self, env_token: Option<String>) -> Self {
        if let Some(token) = env_token.filter(|t| !t.trim().is_empty()) {
            self.token = Some(token);
        }
        self
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)
    }

    /// Collector roles cannot run without target lines.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_line_ids.is_empty() {
            return Err(ConfigError::NoTargetLines);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("No API token configured (set `token` or {TOKEN_ENV_VAR})")]
    MissingToken,
    #[error("`target_line_ids` is empty")]
    NoTargetLines,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_document() {
        let config = Config::from_json(r#"{"target_line_ids": [1273]}"#).unwrap();

        assert_eq!(config.base_url, "http://api.olhovivo.sptrans.com.br/v2.1");
        assert_eq!(config.positions.interval_secs, 1800);
        assert_eq!(config.predictions.interval_secs, 300);
        assert_eq!(config.detectors.stuck_min_elapsed_minutes, 10.0);
        assert_eq!(config.detectors.stuck_max_displacement_km, 0.1);
        assert_eq!(config.detectors.bunching_threshold_meters, 200.0);
        assert_eq!(config.detectors.bunching_strategy, BunchingStrategy::Exhaustive);
        assert_eq!(config.monitor.stale_after_minutes, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_are_read() {
        let config = Config::from_json(
            r#"{
                "token": "abc",
                "target_line_ids": [1, 2],
                "positions": {"active_from": "06:30:00"},
                "detectors": {"bunching_strategy": "adjacent_by_latitude"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.require_token().unwrap(), "abc");
        assert_eq!(
            config.positions.active_from,
            NaiveTime::from_hms_opt(6, 30, 0).unwrap()
        );
        assert_eq!(
            config.detectors.bunching_strategy,
            BunchingStrategy::AdjacentByLatitude
        );
    }

    #[test]
    fn test_missing_token_and_lines_are_errors() {
        let config = Config::from_json(r#"{"token": "  "}"#).unwrap();
        assert!(matches!(config.require_token(), Err(ConfigError::MissingToken)));
        assert!(matches!(config.validate(), Err(ConfigError::NoTargetLines)));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        assert!(matches!(
            Config::from_json("{not json"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let path = std::env::temp_dir().join("olhovivo_monitor_missing_config.json");
        let _ = std::fs::remove_file(&path);
        assert!(matches!(Config::load(&path), Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_collection_window_is_inclusive() {
        let positions = PositionsConfig::default();
        assert!(positions.is_active(NaiveTime::from_hms_opt(5, 0, 0).unwrap()));
        assert!(positions.is_active(NaiveTime::from_hms_opt(23, 0, 0).unwrap()));
        assert!(!positions.is_active(NaiveTime::from_hms_opt(23, 0, 1).unwrap()));
        assert!(!positions.is_active(NaiveTime::from_hms_opt(4, 59, 59).unwrap()));
    }

    #[test]
    fn test_overnight_window_wraps_midnight() {
        let positions = PositionsConfig {
            active_from: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            active_until: NaiveTime::from_hms_opt(2, 0, 0).unwrap(),
            ..Default::default()
        };
        assert!(positions.is_active(NaiveTime::from_hms_opt(22, 0, 0).unwrap()));
        assert!(positions.is_active(NaiveTime::from_hms_opt(23, 30, 0).unwrap()));
        assert!(positions.is_active(NaiveTime::MIN));
        assert!(positions.is_active(NaiveTime::from_hms_opt(2, 0, 0).unwrap()));
        assert!(!positions.is_active(NaiveTime::from_hms_opt(2, 0, 1).unwrap()));
        assert!(!positions.is_active(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
    }

    #[test]
    fn test_env_token_wins_over_file() {
        let config = Config::from_json(r#"{"token": "from-file"}"#)
            .unwrap()
            .with_env_token(Some("from-env".to_string()));
        assert_eq!(config.require_token().unwrap(), "from-env");
    }

    #[test]
    fn test_blank_env_token_is_ignored() {
        let config = Config::from_json(r#"{"token": "from-file"}"#)
            .unwrap()
            .with_env_token(Some("   ".to_string()));
        assert_eq!(config.require_token().unwrap(), "from-file");

        let config = Config::from_json(r#"{"token": "from-file"}"#)
            .unwrap()
            .with_env_token(None);
        assert_eq!(config.require_token().unwrap(), "from-file");
    }

    #[test]
    fn test_env_token_alone() {
        let config = Config::from_json("{}")
            .unwrap()
            .with_env_token(Some("from-env".to_string()));
        assert_eq!(config.require_token().unwrap(), "from-env");
    }
}
