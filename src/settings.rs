use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BankSyncError, Result};
use crate::models::HbciVersion;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Client product registration sent to the bank with every dialog.
    #[serde(default = "default_product_id")]
    pub product_id: String,
    #[serde(default)]
    pub default_hbci_version: HbciVersion,
    /// Bank definition file for the offline sandbox backend.
    #[serde(default)]
    pub sandbox: Option<String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_product_id() -> String {
    "36792786FA12F235F04647689".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            log_level: default_log_level(),
            product_id: default_product_id(),
            default_hbci_version: HbciVersion::default(),
            sandbox: None,
        }
    }
}

impl Settings {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_path().join("banksync.db")
    }

    pub fn passport_dir(&self) -> PathBuf {
        self.data_path().join("passports")
    }

    pub fn challenge_dir(&self) -> PathBuf {
        self.data_path().join("challenges")
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("banksync")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join("banksync")
}

fn read_settings(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| BankSyncError::Settings(format!("{}: {e}", path.display())))
}

/// Settings from disk, or the defaults when none have been saved yet.
pub fn load_settings() -> Result<Settings> {
    let path = settings_path();
    if path.exists() {
        read_settings(&path)
    } else {
        Ok(Settings::default())
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    std::fs::create_dir_all(config_dir())?;
    let json = serde_json::to_string_pretty(settings).map_err(|e| BankSyncError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(!s.data_dir.is_empty());
        assert_eq!(s.log_level, "warn");
        assert_eq!(s.default_hbci_version, HbciVersion::Hbci300);
        assert!(s.sandbox.is_none());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/banksync", "default_hbci_version": "220"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.default_hbci_version, HbciVersion::Hbci220);
        assert_eq!(s.log_level, "warn");
        assert_eq!(s.product_id, default_product_id());
    }

    #[test]
    fn test_derived_paths() {
        let s = Settings {
            data_dir: "/tmp/banksync".into(),
            ..Settings::default()
        };
        assert_eq!(s.db_path(), PathBuf::from("/tmp/banksync/banksync.db"));
        assert_eq!(s.passport_dir(), PathBuf::from("/tmp/banksync/passports"));
        assert_eq!(s.challenge_dir(), PathBuf::from("/tmp/banksync/challenges"));
    }

    #[test]
    fn test_read_reports_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(read_settings(&path), Err(BankSyncError::Settings(_))));

        let saved = Settings {
            sandbox: Some("/tmp/bank.json".into()),
            ..Settings::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&saved).unwrap()).unwrap();
        assert_eq!(read_settings(&path).unwrap().sandbox.as_deref(), Some("/tmp/bank.json"));
    }
}
