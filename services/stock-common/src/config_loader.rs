//! Layered configuration loader.
//!
//! Supports loading configuration from multiple files:
//! - `config.json` - Core configuration and the persisted watch-list
//! - `secrets.json` - SMTP credentials, merged over the `smtp` section
//!
//! Only `config.json` is ever written back by the store.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Configuration file names
pub const CONFIG_FILES: &[&str] = &["config.json", "secrets.json"];

/// Load a JSON file and return its contents as a Value.
/// Returns None if file doesn't exist.
pub(crate) fn load_json_file(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(Some(value))
}

/// Deep merge two JSON values.
/// Source values override target values, with object merging at each level.
fn merge_json(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(&key) {
                    Some(target_value) => merge_json(target_value, source_value),
                    None => {
                        target_map.insert(key, source_value);
                    }
                }
            }
        }
        (target, source) => {
            *target = source;
        }
    }
}

/// Load `config.json` and merge `secrets.json` into it.
///
/// `secrets.json` may either hold an `smtp` object or the SMTP fields at
/// top level.
pub fn load_layered_config(dir: &Path) -> Result<Value> {
    let mut config = load_json_file(&dir.join("config.json"))?
        .unwrap_or_else(|| Value::Object(Default::default()));

    tracing::debug!(dir = %dir.display(), "Loading layered config");

    if let Some(mut secrets) = load_json_file(&dir.join("secrets.json"))? {
        let smtp_secrets = match secrets.get_mut("smtp") {
            Some(smtp) => smtp.take(),
            None => secrets,
        };

        if let Some(config_obj) = config.as_object_mut() {
            match config_obj.get_mut("smtp") {
                Some(existing) => merge_json(existing, smtp_secrets),
                None => {
                    config_obj.insert("smtp".to_string(), smtp_secrets);
                }
            }
        }
        tracing::debug!("Loaded secrets.json");
    }

    Ok(config)
}

/// Check which configuration files exist.
pub fn check_config_files(dir: &Path) -> Vec<(String, bool)> {
    CONFIG_FILES
        .iter()
        .map(|file| (file.to_string(), dir.join(file).exists()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_json_objects() {
        let mut target = json!({
            "a": 1,
            "b": {
                "x": 10,
                "y": 20
            }
        });

        let source = json!({
            "b": {
                "y": 25,
                "z": 30
            },
            "c": 3
        });

        merge_json(&mut target, source);

        assert_eq!(target["a"], 1);
        assert_eq!(target["b"]["x"], 10);
        assert_eq!(target["b"]["y"], 25);
        assert_eq!(target["b"]["z"], 30);
        assert_eq!(target["c"], 3);
    }

    #[test]
    fn test_secrets_merged_into_smtp() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"smtp": {"host": "smtp.example.com", "username": "alerts"}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("secrets.json"), r#"{"password": "hunter2"}"#).unwrap();

        let value = load_layered_config(dir.path()).unwrap();
        assert_eq!(value["smtp"]["host"], "smtp.example.com");
        assert_eq!(value["smtp"]["password"], "hunter2");
    }

    #[test]
    fn test_missing_files_yield_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let value = load_layered_config(dir.path()).unwrap();
        assert!(value.as_object().map(|o| o.is_empty()).unwrap_or(false));

        let files = check_config_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|(_, exists)| !exists));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "{ not json").unwrap();
        assert!(load_layered_config(dir.path()).is_err());
    }
}
