//! Configuration validation.
//!
//! Checks thresholds, schedules, pacing and mail settings before the
//! service starts, so a broken config fails fast instead of at the first
//! scheduled run.

use thiserror::Error;

use crate::config::{
    parse_cron, AlertConfig, Config, FetchConfig, ObservabilityConfig, ServerConfig,
};

/// Smallest allowed spacing between two fetches, in milliseconds.
pub const MIN_FETCH_INTERVAL_MS: u64 = 1000;

/// Longest allowed alert interval: one year.
pub const MAX_ALERT_INTERVAL_MINUTES: u64 = 366 * 24 * 60;

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.alert.validate() {
            errors.push(e);
        }

        if let Err(e) = self.fetch.validate() {
            errors.push(e);
        }

        if let Err(e) = self.server.validate() {
            errors.push(e);
        }

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        if let Err(e) = self.check_mail_settings() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Recipients without a usable SMTP section would silently drop digests.
    fn check_mail_settings(&self) -> ValidationResult<()> {
        if self.alert.mails.is_empty() {
            return Ok(());
        }

        if self.smtp.host.is_empty() {
            return Err(ValidationError::MissingField {
                field: "smtp.host (required when alert.mails is set)".into(),
            });
        }

        if self.smtp.from.is_empty() {
            return Err(ValidationError::MissingField {
                field: "smtp.from (required when alert.mails is set)".into(),
            });
        }

        Ok(())
    }

    /// Load and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for AlertConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !self.low.is_finite() || !self.high.is_finite() || self.low >= self.high {
            return Err(ValidationError::InvalidValue {
                field: "alert.low / alert.high".into(),
                reason: format!("low ({}) must be below high ({})", self.low, self.high),
            });
        }

        if self.alert_interval_minutes > MAX_ALERT_INTERVAL_MINUTES {
            return Err(ValidationError::InvalidValue {
                field: "alert.alert_interval_minutes".into(),
                reason: format!(
                    "{} exceeds the maximum of {} minutes",
                    self.alert_interval_minutes, MAX_ALERT_INTERVAL_MINUTES
                ),
            });
        }

        let schedules = [
            ("alert.cron_domestic", &self.cron_domestic),
            ("alert.cron_foreign_primary", &self.cron_foreign_primary),
            ("alert.cron_foreign_secondary", &self.cron_foreign_secondary),
        ];

        for (field, expression) in schedules {
            if expression.trim().is_empty() {
                return Err(ValidationError::MissingField {
                    field: field.into(),
                });
            }
            if let Err(e) = parse_cron(expression) {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    reason: format!("invalid cron expression '{}': {}", expression, e),
                });
            }
        }

        if let Some(bad) = self.mails.iter().find(|m| !m.contains('@')) {
            return Err(ValidationError::InvalidValue {
                field: "alert.mails".into(),
                reason: format!("'{}' is not an email address", bad),
            });
        }

        Ok(())
    }
}

impl Validate for FetchConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.interval_ms < MIN_FETCH_INTERVAL_MS {
            return Err(ValidationError::InvalidValue {
                field: "fetch.interval_ms".into(),
                reason: format!("must be at least {}", MIN_FETCH_INTERVAL_MS),
            });
        }

        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "fetch.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "server.port".into(),
            });
        }

        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}
