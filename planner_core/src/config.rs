//! Configuration file support for the workout planner.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/wplan/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub journal: JournalConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Identity resolution configuration
///
/// `tokens` maps bearer credentials to user ids. `default_user` is used
/// when the caller supplies neither a token nor an explicit user.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct IdentityConfig {
    #[serde(default)]
    pub default_user: Option<String>,

    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
}

/// Operation journal configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_journal_enabled")]
    pub enabled: bool,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: default_journal_enabled(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|_| PathBuf::from("."))
    });
    base.join("wplan")
}

fn default_journal_enabled() -> bool {
    true
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|_| PathBuf::from("."))
        });
        base.join("wplan").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Reject token entries that map to an empty user id
    fn validate(&self) -> Result<()> {
        for (token, user) in &self.identity.tokens {
            if token.trim().is_empty() || user.trim().is_empty() {
                return Err(Error::Config(
                    "identity.tokens entries must have non-empty token and user".into(),
                ));
            }
        }
        Ok(())
    }

    /// Path of the plan store snapshot
    pub fn store_path(&self) -> PathBuf {
        self.data.data_dir.join("plans.json")
    }

    /// Path of the operation journal
    pub fn journal_path(&self) -> PathBuf {
        self.data.data_dir.join("journal.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.journal.enabled);
        assert!(config.identity.tokens.is_empty());
        assert!(config.data.data_dir.ends_with("wplan"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config
            .identity
            .tokens
            .insert("secret-1".into(), "coach-anna".into());
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.identity.tokens.get("secret-1").unwrap(), "coach-anna");
        assert_eq!(config.data.data_dir, parsed.data.data_dir);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[journal]
enabled = false
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(!config.journal.enabled);
        assert!(config.identity.default_user.is_none()); // default
    }

    #[test]
    fn test_load_rejects_empty_user() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[identity.tokens]\nabc = \"\"\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_store_paths_follow_data_dir() {
        let mut config = Config::default();
        config.data.data_dir = PathBuf::from("/tmp/wplan-test");
        assert_eq!(config.store_path(), PathBuf::from("/tmp/wplan-test/plans.json"));
        assert_eq!(
            config.journal_path(),
            PathBuf::from("/tmp/wplan-test/journal.jsonl")
        );
    }
}
