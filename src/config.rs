//! Configuration for the compliance tracker.
//!
//! The on-disk [`Config`] holds raw values. [`Config::study_settings`] validates
//! them into a [`StudySettings`], which is the only form the compliance engine
//! accepts.

use crate::core::study_day::CutoffHour;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Longest accepted window, roughly ten years of study days.
pub const MAX_WINDOW_DAYS: u32 = 3660;

/// Name of the requirements block merged under every study.
pub const DEFAULTS_BLOCK: &str = "defaults";

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IANA timezone used for all study-day boundaries
    pub timezone: String,

    /// Maximum length of the rolling window, in study days
    pub window_days: u32,

    /// Active days needed within the window
    pub required_active_days: u32,

    /// Local hour at which a study day starts (0-23)
    pub cutoff_hour_local: u32,

    /// Minimum feed retrievals for a day to count as active
    pub min_retrievals: u32,

    /// Minimum engagements for a day to count as active
    pub min_engagement: u32,

    /// Path to the compliance activity database
    pub database_path: PathBuf,

    /// Per-study requirement overrides, keyed by study label
    pub requirements: BTreeMap<String, StudyRequirements>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("compliance-tracker");

        Self {
            timezone: "Europe/Amsterdam".to_string(),
            window_days: 14,
            required_active_days: 10,
            cutoff_hour_local: 5,
            min_retrievals: 1,
            min_engagement: 3,
            database_path: data_dir.join("compliance.db"),
            requirements: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it is absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("compliance-tracker")
            .join("config.json")
    }

    /// Check the base settings and every requirements block.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.study_settings(None)?;
        for label in self.study_labels() {
            self.study_settings(Some(label))?;
        }
        if let Some(defaults) = self.requirements.get(DEFAULTS_BLOCK) {
            defaults.cutoff_hour()?;
        }
        Ok(())
    }

    /// Study labels defined in `requirements`, excluding the defaults block.
    pub fn study_labels(&self) -> impl Iterator<Item = &str> {
        self.requirements
            .keys()
            .map(String::as_str)
            .filter(|label| *label != DEFAULTS_BLOCK)
    }

    /// Resolve validated settings, optionally applying a study's requirements.
    ///
    /// Requirements merge in order: base fields, the `defaults` block, then the
    /// named study block.
    pub fn study_settings(&self, study: Option<&str>) -> Result<StudySettings, ConfigError> {
        let mut required_active_days = self.required_active_days;
        let mut cutoff_hour = CutoffHour::new(self.cutoff_hour_local).map_err(|_| {
            ConfigError::invalid(
                "cutoff_hour_local",
                format!("must be between 0 and 23 (got {})", self.cutoff_hour_local),
            )
        })?;
        let mut min_retrievals = self.min_retrievals;
        let mut min_engagement = self.min_engagement;

        if let Some(label) = study {
            let study_block = self.requirements.get(label).filter(|_| label != DEFAULTS_BLOCK);
            let Some(study_block) = study_block else {
                return Err(ConfigError::UnknownStudy {
                    label: label.to_string(),
                    available: self.study_labels().map(str::to_string).collect(),
                });
            };

            let blocks = self.requirements.get(DEFAULTS_BLOCK).into_iter().chain([study_block]);
            for block in blocks {
                if let Some(days) = block.min_active_days {
                    required_active_days = days;
                }
                if let Some(cutoff) = block.cutoff_hour()? {
                    cutoff_hour = cutoff;
                }
                if let Some(value) = block.min_retrievals {
                    min_retrievals = value;
                }
                if let Some(value) = block.min_engagement {
                    min_engagement = value;
                }
            }
        }

        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|e| ConfigError::invalid("timezone", format!("{e}")))?;

        StudySettings::new(
            timezone,
            self.window_days,
            required_active_days,
            cutoff_hour,
            min_retrievals,
            min_engagement,
        )
    }
}

/// Requirement overrides for one study (or the shared defaults block).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyRequirements {
    /// Overrides `required_active_days`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_active_days: Option<u32>,

    /// Clock string such as `"05:00"`; overrides `cutoff_hour_local`.
    /// Must fall on the hour.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_cut_off: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_retrievals: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_engagement: Option<u32>,
}

impl StudyRequirements {
    fn cutoff_hour(&self) -> Result<Option<CutoffHour>, ConfigError> {
        let Some(raw) = self.day_cut_off.as_deref().filter(|raw| !raw.trim().is_empty()) else {
            return Ok(None);
        };
        CutoffHour::parse_clock(raw)
            .map(Some)
            .map_err(|e| ConfigError::invalid("day_cut_off", e.to_string()))
    }
}

/// Validated parameters for one compliance computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudySettings {
    pub timezone: Tz,
    pub window_days: u32,
    pub required_active_days: u32,
    pub cutoff_hour_local: CutoffHour,
    pub min_retrievals: u32,
    pub min_engagement: u32,
}

impl StudySettings {
    pub fn new(
        timezone: Tz,
        window_days: u32,
        required_active_days: u32,
        cutoff_hour_local: CutoffHour,
        min_retrievals: u32,
        min_engagement: u32,
    ) -> Result<Self, ConfigError> {
        if window_days == 0 {
            return Err(ConfigError::invalid("window_days", "must be at least 1"));
        }
        if window_days > MAX_WINDOW_DAYS {
            return Err(ConfigError::invalid(
                "window_days",
                format!("must be at most {MAX_WINDOW_DAYS} (got {window_days})"),
            ));
        }
        if required_active_days > window_days {
            tracing::warn!(
                required_active_days,
                window_days,
                "required active days exceed the window length; no participant can be on track"
            );
        }

        Ok(Self {
            timezone,
            window_days,
            required_active_days,
            cutoff_hour_local,
            min_retrievals,
            min_engagement,
        })
    }

    /// Whether a day with these counts meets the activity thresholds.
    pub fn is_active(&self, retrievals: u32, engagements: u32) -> bool {
        retrievals >= self.min_retrievals && engagements >= self.min_engagement
    }
}

impl Default for StudySettings {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::Amsterdam,
            window_days: 14,
            required_active_days: 10,
            cutoff_hour_local: CutoffHour::new(5).unwrap_or(CutoffHour::MIDNIGHT),
            min_retrievals: 1,
            min_engagement: 3,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Study '{label}' not found in requirements (available: {})", display_labels(.available))]
    UnknownStudy { label: String, available: Vec<String> },
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

fn display_labels(labels: &[String]) -> String {
    if labels.is_empty() {
        "none".to_string()
    } else {
        labels.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_studies() -> Config {
        let mut config = Config {
            timezone: "UTC".to_string(),
            ..Config::default()
        };
        config.requirements.insert(
            DEFAULTS_BLOCK.to_string(),
            StudyRequirements {
                min_retrievals: Some(2),
                ..Default::default()
            },
        );
        config.requirements.insert(
            "pilot".to_string(),
            StudyRequirements {
                min_active_days: Some(5),
                day_cut_off: Some("04:00".to_string()),
                ..Default::default()
            },
        );
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        let settings = config.study_settings(None).unwrap();
        assert_eq!(settings.timezone, chrono_tz::Europe::Amsterdam);
        assert_eq!(settings.window_days, 14);
        assert_eq!(settings.required_active_days, 10);
        assert_eq!(settings.cutoff_hour_local.hour(), 5);
        assert_eq!(settings, StudySettings::default());
    }

    #[test]
    fn test_cutoff_hour_out_of_range_is_rejected() {
        let config = Config {
            cutoff_hour_local: 24,
            ..Config::default()
        };
        assert!(matches!(
            config.study_settings(None),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "cutoff_hour_local"
        ));
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let config = Config {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.study_settings(None),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "timezone"
        ));
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let config = Config {
            window_days: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_window_is_rejected() {
        let config = Config {
            window_days: 200_000_000,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "window_days"
        ));

        let config = Config {
            window_days: MAX_WINDOW_DAYS,
            required_active_days: 10,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_study_requirements_merge() {
        let config = config_with_studies();
        let settings = config.study_settings(Some("pilot")).unwrap();
        assert_eq!(settings.required_active_days, 5);
        assert_eq!(settings.cutoff_hour_local.hour(), 4);
        assert_eq!(settings.min_retrievals, 2);
        assert_eq!(settings.min_engagement, 3);

        let base = config.study_settings(None).unwrap();
        assert_eq!(base.min_retrievals, 1);
    }

    #[test]
    fn test_unknown_study_lists_available() {
        let config = config_with_studies();
        let err = config.study_settings(Some("main")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Study 'main' not found in requirements (available: pilot)"
        );
        assert!(config.study_settings(Some(DEFAULTS_BLOCK)).is_err());
    }

    #[test]
    fn test_invalid_day_cut_off_is_rejected() {
        let mut config = config_with_studies();
        config.requirements.insert(
            "late".to_string(),
            StudyRequirements {
                day_cut_off: Some("25:00".to_string()),
                ..Default::default()
            },
        );
        assert!(config.validate().is_err());

        config.requirements.insert(
            "late".to_string(),
            StudyRequirements {
                day_cut_off: Some("05:30".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(
            config.study_settings(Some("late")).unwrap_err().to_string(),
            "Invalid configuration value for 'day_cut_off': cutoff '05:30' does not fall on the hour"
        );
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = config_with_studies();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.timezone, "UTC");
        assert_eq!(loaded.requirements, config.requirements);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded.window_days, 14);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "timezone": "UTC", "window_days": 7 }"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.window_days, 7);
        assert_eq!(loaded.required_active_days, 10);
    }

    #[test]
    fn test_is_active_thresholds() {
        let settings = StudySettings::default();
        assert!(settings.is_active(1, 3));
        assert!(!settings.is_active(0, 10));
        assert!(!settings.is_active(5, 2));
    }
}
