//! Stock Common - Shared configuration, persistence and logging for the
//! stock valuation alert service.
//!
//! This crate provides:
//! - Configuration types and layered loading (`config.json` + `secrets.json`)
//! - Configuration validation
//! - The JSON config store that persists the watch-list
//! - Error types and handling utilities
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod config_loader;
pub mod error;
pub mod logging;
pub mod store;
pub mod validation;

pub use config::{
    AlertConfig, Config, FetchConfig, ObservabilityConfig, ServerConfig, SmtpConfig, SmtpTls,
    StockRecord,
};
pub use error::{Error, Result};
pub use store::{ConfigStore, JsonConfigStore};
pub use validation::{Validate, ValidationError, ValidationResult};
