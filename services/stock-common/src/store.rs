//! Config store with whole-document replace semantics.
//!
//! The watch-list lives inside `config.json`. Saving rewrites the complete
//! document (temp file + rename) with the `stocks` array replaced; every
//! other key is carried through untouched, including keys this build does
//! not know about. Secrets merged in from `secrets.json` are never written.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::{Config, StockRecord};
use crate::config_loader::load_json_file;
use crate::error::{Error, Result, ResultExt};

/// Persistence boundary for the configuration document.
pub trait ConfigStore: Send + Sync {
    /// Load the effective configuration.
    fn load(&self) -> Result<Config>;

    /// Replace the persisted watch-list. Idempotent.
    fn save_stocks(&self, stocks: &[StockRecord]) -> Result<()>;
}

/// JSON file store rooted at a configuration directory.
#[derive(Debug)]
pub struct JsonConfigStore {
    dir: PathBuf,
    /// Raw `config.json` document as last read or written
    document: Mutex<Value>,
}

impl JsonConfigStore {
    /// Open the store, reading the current `config.json` if present.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let document = load_json_file(&dir.join("config.json"))
            .map_err(|e| Error::Config(format!("{:#}", e)))?
            .unwrap_or_else(|| Value::Object(Default::default()));

        if !document.is_object() {
            return Err(Error::Config(format!(
                "{} must contain a JSON object",
                dir.join("config.json").display()
            )));
        }

        Ok(Self {
            dir,
            document: Mutex::new(document),
        })
    }

    /// Directory holding `config.json`.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn config_file(&self) -> PathBuf {
        self.dir.join("config.json")
    }

    fn write_document(&self, document: &Value) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)
                .context(format!("Failed to create config directory {}", self.dir.display()))?;
        }

        let content = serde_json::to_string_pretty(document)?;
        let target = self.config_file();
        let tmp = self.dir.join("config.json.tmp");

        fs::write(&tmp, content).context(format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &target).context(format!("Failed to replace {}", target.display()))?;

        Ok(())
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> Result<Config> {
        Config::load_from_dir(&self.dir).map_err(|e| Error::Config(format!("{:#}", e)))
    }

    fn save_stocks(&self, stocks: &[StockRecord]) -> Result<()> {
        let mut document = self.document.lock().unwrap_or_else(|e| e.into_inner());

        let mut next = document.clone();
        if let Some(obj) = next.as_object_mut() {
            obj.insert("stocks".to_string(), serde_json::to_value(stocks)?);
        }

        self.write_document(&next)?;
        *document = next;

        tracing::debug!(count = stocks.len(), path = %self.config_file().display(), "Watch-list saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ticker: &str) -> StockRecord {
        StockRecord {
            ticker: ticker.to_string(),
            name: format!("{} name", ticker),
            alert_enabled: true,
            market: Some("us".into()),
            last_alert_at: None,
        }
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"web": {"port": "8080"}, "alert": {"low": 0.5, "high": 3.0}, "stocks": []}"#,
        )
        .unwrap();

        let store = JsonConfigStore::open(dir.path()).unwrap();
        store.save_stocks(&[record("AAPL"), record("MSFT")]).unwrap();

        let raw: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("config.json")).unwrap())
                .unwrap();
        assert_eq!(raw["web"]["port"], "8080");
        assert_eq!(raw["stocks"].as_array().map(|a| a.len()), Some(2));

        let config = store.load().unwrap();
        assert_eq!(config.alert.low, 0.5);
        assert_eq!(config.stocks[1].ticker, "MSFT");
    }

    #[test]
    fn test_save_does_not_leak_secrets() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), r#"{"smtp": {"host": "mail"}}"#).unwrap();
        fs::write(dir.path().join("secrets.json"), r#"{"smtp": {"password": "s3cret"}}"#).unwrap();

        let store = JsonConfigStore::open(dir.path()).unwrap();
        assert_eq!(store.load().unwrap().smtp.password, "s3cret");

        store.save_stocks(&[record("AAPL")]).unwrap();
        let raw = fs::read_to_string(dir.path().join("config.json")).unwrap();
        assert!(!raw.contains("s3cret"));
    }

    #[test]
    fn test_save_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        let store = JsonConfigStore::open(&nested).unwrap();

        store.save_stocks(&[record("AAPL")]).unwrap();
        assert!(nested.join("config.json").exists());
        assert!(!nested.join("config.json.tmp").exists());
    }

    #[test]
    fn test_open_rejects_non_object_document() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "[1, 2, 3]").unwrap();
        assert!(matches!(
            JsonConfigStore::open(dir.path()),
            Err(Error::Config(_))
        ));
    }
}
