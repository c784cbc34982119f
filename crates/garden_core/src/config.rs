//! Runtime configuration for garden hosts.
//!
//! # Responsibility
//! - Deserialize JSON configuration with every field defaulted.
//! - Reject values the engine cannot honour before anything is opened.

use crate::insight::quiet_hours::{QuietHoursError, QuietHoursSchedule};
use crate::model::circle::DEFAULT_CIRCLE_MAX_MEMBERS;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Configuration loading error.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    /// Parsed but semantically unusable.
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(reason) => write!(f, "invalid config: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<QuietHoursError> for ConfigError {
    fn from(value: QuietHoursError) -> Self {
        Self::Invalid(value.to_string())
    }
}

/// Host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GardenConfig {
    /// SQLite file; `None` opens an in-memory store.
    pub database_path: Option<PathBuf>,
    /// `None` falls back to [`crate::logging::default_log_level`].
    pub log_level: Option<String>,
    /// Absolute directory; `None` leaves logging uninitialized.
    pub log_dir: Option<PathBuf>,
    pub circle_max_members: u32,
    pub quiet_hours: Option<QuietHoursSchedule>,
}

impl Default for GardenConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            log_level: None,
            log_dir: None,
            circle_max_members: DEFAULT_CIRCLE_MAX_MEMBERS,
            quiet_hours: None,
        }
    }
}

impl GardenConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.circle_max_members == 0 {
            return Err(ConfigError::Invalid(
                "circle_max_members must be at least 1".to_string(),
            ));
        }
        if let Some(schedule) = &self.quiet_hours {
            schedule.validate()?;
        }
        Ok(())
    }

    /// Level to hand to `init_logging`.
    pub fn effective_log_level(&self) -> &str {
        self.log_level
            .as_deref()
            .unwrap_or(crate::logging::default_log_level())
    }
}

/// Reads and validates a JSON config file.
pub fn load_config(path: impl AsRef<Path>) -> Result<GardenConfig, ConfigError> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    GardenConfig::from_json_str(&raw)
}

#[cfg(test)]
mod tests {
    use super::{load_config, ConfigError, GardenConfig};
    use std::io::Write;

    #[test]
    fn empty_object_uses_defaults() {
        let config = GardenConfig::from_json_str("{}").unwrap();
        assert_eq!(config, GardenConfig::default());
        assert_eq!(config.circle_max_members, 12);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn explicit_values_are_kept() {
        let config = GardenConfig::from_json_str(
            r#"{
                "database_path": "/tmp/garden.sqlite3",
                "log_level": "warn",
                "circle_max_members": 4,
                "quiet_hours": {
                    "enabled": true,
                    "start_time": "22:00",
                    "end_time": "07:00",
                    "days_of_week": [0, 6]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.circle_max_members, 4);
        assert_eq!(config.effective_log_level(), "warn");
        assert_eq!(config.quiet_hours.unwrap().days_of_week, vec![0, 6]);
    }

    #[test]
    fn missing_log_level_falls_back_to_build_default() {
        let config = GardenConfig::default();
        assert_eq!(
            config.effective_log_level(),
            crate::logging::default_log_level()
        );
    }

    #[test]
    fn zero_capacity_is_invalid() {
        let err = GardenConfig::from_json_str(r#"{"circle_max_members": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_quiet_day_is_invalid() {
        let err = GardenConfig::from_json_str(
            r#"{"quiet_hours": {"enabled": true, "start_time": "22:00", "end_time": "07:00", "days_of_week": [9]}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("day of week"));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            GardenConfig::from_json_str("{"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_config_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"circle_max_members": 3}}"#).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.circle_max_members, 3);

        let missing = load_config(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
