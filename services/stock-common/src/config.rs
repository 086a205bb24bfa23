//! Configuration management for the stock alert service.
//!
//! The service reads a single JSON document at `~/.stockalert/config.json`
//! (or `$STOCKALERT_CONFIG_DIR/config.json`). Credentials may live in a
//! sibling `secrets.json`, which is merged over the `smtp` section at load
//! time and never written back.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (STOCKALERT_* prefix)
//! 2. `secrets.json` values
//! 3. `config.json` values
//! 4. Default values
//!
//! # Environment Variable Mapping
//!
//! - `STOCKALERT_CONFIG_DIR` → location of `config.json` / `secrets.json`
//! - `STOCKALERT_PORT` → server.port
//! - `STOCKALERT_BIND_ADDRESS` → server.host
//! - `STOCKALERT_LOG_LEVEL` → observability.log_level
//! - `STOCKALERT_SMTP_PASSWORD` → smtp.password

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config_loader::load_layered_config;

/// Environment variable that relocates the configuration directory.
pub const CONFIG_DIR_ENV: &str = "STOCKALERT_CONFIG_DIR";

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".stockalert"),
        |dirs| dirs.home_dir().join(".stockalert"),
    )
}

// ============================================================================
// Cron helpers
// ============================================================================

/// Normalize a cron expression for the `cron` crate.
///
/// Administrators usually write classic 5-field expressions
/// (`min hour dom mon dow`); the parser expects a leading seconds field.
pub fn normalize_cron(expr: &str) -> String {
    let expr = expr.trim();
    if expr.split_whitespace().count() == 5 {
        format!("0 {}", expr)
    } else {
        expr.to_string()
    }
}

/// Parse a (possibly 5-field) cron expression.
pub fn parse_cron(expr: &str) -> std::result::Result<Schedule, cron::error::Error> {
    Schedule::from_str(&normalize_cron(expr))
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP admin surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host (default: 127.0.0.1)
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port (default: 4435)
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ============================================================================
// SMTP Configuration
// ============================================================================

/// Transport security for the SMTP connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    /// Implicit TLS (port 465)
    #[default]
    Tls,
    /// STARTTLS upgrade (port 587)
    Starttls,
    /// Plain text, local relays only
    None,
}

/// Outbound mail configuration for alert digests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// SMTP server hostname
    #[serde(default)]
    pub host: String,
    /// SMTP server port (default: 465)
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Connection security
    #[serde(default)]
    pub tls: SmtpTls,
    /// Login user name
    #[serde(default)]
    pub username: String,
    /// Login password (prefer secrets.json or STOCKALERT_SMTP_PASSWORD)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// From address for digests
    #[serde(default)]
    pub from: String,
}

impl SmtpConfig {
    /// Whether enough is configured to attempt a send.
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && !self.from.is_empty()
    }
}

// ============================================================================
// Alert Configuration
// ============================================================================

/// Valuation thresholds, recipients and schedules.
///
/// Legacy keys from older deployments (`cronCH`, `cronUS1`, `cronUS2`,
/// `alarmIntervalTime`) are accepted as aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Digest recipients
    #[serde(default)]
    pub mails: Vec<String>,
    /// Domestic recompute schedule
    #[serde(default = "default_cron_domestic", alias = "cronCH")]
    pub cron_domestic: String,
    /// First foreign recompute schedule
    #[serde(default = "default_cron_foreign_primary", alias = "cronUS1")]
    pub cron_foreign_primary: String,
    /// Second foreign recompute schedule
    #[serde(default = "default_cron_foreign_secondary", alias = "cronUS2")]
    pub cron_foreign_secondary: String,
    /// Values below this are undervalued
    #[serde(default = "default_low")]
    pub low: f64,
    /// Values above this are overvalued
    #[serde(default = "default_high")]
    pub high: f64,
    /// Minimum minutes between two alerts for the same stock
    #[serde(
        default = "default_alert_interval",
        alias = "alarmIntervalTime",
        deserialize_with = "deserialize_minutes"
    )]
    pub alert_interval_minutes: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            mails: Vec::new(),
            cron_domestic: default_cron_domestic(),
            cron_foreign_primary: default_cron_foreign_primary(),
            cron_foreign_secondary: default_cron_foreign_secondary(),
            low: default_low(),
            high: default_high(),
            alert_interval_minutes: default_alert_interval(),
        }
    }
}

// ============================================================================
// Fetch Configuration
// ============================================================================

/// Politeness and transport settings for the scraped sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Minimum spacing between two valuations in a batch, in milliseconds
    #[serde(default = "default_fetch_interval_ms")]
    pub interval_ms: u64,
    /// Per-request timeout in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    /// User agent sent to the sources
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_fetch_interval_ms(),
            timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets forced to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

// ============================================================================
// Persisted watch-list records
// ============================================================================

/// One persisted watch-list entry.
///
/// Only identity and administrator state are stored; valuation figures are
/// recomputed after every restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub ticker: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true", alias = "alertmail")]
    pub alert_enabled: bool,
    /// Market tag written by the last run ("ch" / "us")
    #[serde(default, alias = "chus", skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_alert_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub smtp: SmtpConfig,

    #[serde(default)]
    pub alert: AlertConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Watch-list in display order
    #[serde(default)]
    pub stocks: Vec<StockRecord>,
}

impl Config {
    /// Load configuration from the default directory, with env overrides.
    pub fn load() -> Result<Self> {
        Self::load_from_dir(&config_dir())
    }

    /// Load `config.json` + `secrets.json` from a directory, with env overrides.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let value = load_layered_config(dir)?;
        let mut config: Self = serde_json::from_value(value)
            .with_context(|| format!("Failed to parse config in {}", dir.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load a single configuration file, without secrets or env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("STOCKALERT_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        if let Ok(bind) = std::env::var("STOCKALERT_BIND_ADDRESS") {
            self.server.host = bind;
        }

        if let Ok(level) = std::env::var("STOCKALERT_LOG_LEVEL") {
            self.observability.log_level = level;
        }

        if let Ok(password) = std::env::var("STOCKALERT_SMTP_PASSWORD") {
            self.smtp.password = password;
        }
    }

    /// Socket address string for the admin surface.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    4435
}
fn default_smtp_port() -> u16 {
    465
}
fn default_cron_domestic() -> String {
    "30 15 * * MON-FRI".into()
}
fn default_cron_foreign_primary() -> String {
    "30 5 * * TUE-SAT".into()
}
fn default_cron_foreign_secondary() -> String {
    "0 22 * * MON-FRI".into()
}
fn default_low() -> f64 {
    1.0
}
fn default_high() -> f64 {
    2.0
}
fn default_alert_interval() -> u64 {
    24 * 60
}

/// Whole minutes from a JSON number; older configs store fractions.
fn deserialize_minutes<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let minutes = f64::deserialize(deserializer)?;
    if !minutes.is_finite() || minutes < 0.0 {
        return Err(serde::de::Error::custom(format!(
            "alert interval must be a non-negative number of minutes, got {}",
            minutes
        )));
    }
    Ok(minutes.round() as u64)
}

fn default_fetch_interval_ms() -> u64 {
    1000
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko)".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_true() -> bool {
    true
}
