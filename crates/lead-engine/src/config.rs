use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::enquiry::Priority;
use crate::error::{LeadError, Result};

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Intake and duplicate detection settings
    pub intake: IntakeConfig,

    /// Assignment pipeline settings
    pub assignment: AssignmentConfig,

    /// Notification settings
    pub notifications: NotificationConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Intake configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Sliding window, in days, for duplicate mobile numbers
    pub duplicate_window_days: u32,

    /// Priority given to enquiries that arrive without one
    pub default_priority: Priority,
}

/// Assignment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    /// Offset from UTC, in minutes, that defines local midnight for daily caps
    pub utc_offset_minutes: i32,

    /// Actor recorded for transitions the engine makes on its own
    pub system_actor: String,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Send a notification to each newly assigned handler
    pub enabled: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    pub url: String,

    /// Maximum pooled connections
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl EngineConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| LeadError::config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            LeadError::config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        if self.intake.duplicate_window_days == 0 {
            return Err(LeadError::config("duplicate_window_days must be greater than 0"));
        }

        // Real-world offsets stay within -12:00..+14:00
        if self.assignment.utc_offset_minutes.abs() > 14 * 60 {
            return Err(LeadError::config(format!(
                "utc_offset_minutes out of range: {}",
                self.assignment.utc_offset_minutes
            )));
        }

        if self.assignment.system_actor.trim().is_empty() {
            return Err(LeadError::config("system_actor cannot be empty"));
        }

        if self.database.url.trim().is_empty() {
            return Err(LeadError::config("database url cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(LeadError::config("max_connections must be greater than 0"));
        }

        Ok(())
    }
}

impl IntakeConfig {
    /// Duplicate window as a chrono duration
    pub fn duplicate_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.duplicate_window_days))
    }
}

impl AssignmentConfig {
    /// Offset that defines the local calendar day
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Local calendar day of an instant, used to key daily assignment counters
    pub fn local_day(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.local_offset()).date_naive()
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            duplicate_window_days: 7,
            default_priority: Priority::Medium,
        }
    }
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            system_actor: "system".to_string(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://leadroute.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
