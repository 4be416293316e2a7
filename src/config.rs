use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "kickstart-store";
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_PORT: u16 = 3000;

/// Server settings.
///
/// Read from `config.json` in the user config directory, then overridden by
/// `KICKSTART_API_KEY` and `KICKSTART_CORS_ORIGINS`. Command-line flags win
/// over both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file. Defaults to the platform data directory.
    pub database_path: Option<PathBuf>,
    pub port: Option<u16>,
    /// Bearer token required by the HTTP API. No auth when unset.
    pub api_key: Option<String>,
    pub cors_origins: Option<Vec<String>>,
}

impl Config {
    /// Load the config file and apply environment overrides.
    ///
    /// A missing file yields defaults; an unreadable one is logged and ignored.
    pub fn load() -> Self {
        let mut config = match Self::try_load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {e:#}");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn try_load() -> Result<Self> {
        let config_path = config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&config_path)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Overlay values from the environment, looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("KICKSTART_API_KEY").filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(origins) = var("KICKSTART_CORS_ORIGINS") {
            self.cors_origins = Some(
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn database_path(&self) -> crate::Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => crate::db::default_path(),
        }
    }
}

fn config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_port_3000_without_auth() {
        let config = Config::default();
        assert_eq!(config.port(), 3000);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config {
            api_key: Some("from-file".into()),
            ..Default::default()
        };
        config.apply_env(env(&[
            ("KICKSTART_API_KEY", "from-env"),
            ("KICKSTART_CORS_ORIGINS", "http://a.example, http://b.example,"),
        ]));

        assert_eq!(config.api_key.as_deref(), Some("from-env"));
        assert_eq!(
            config.cors_origins,
            Some(vec!["http://a.example".into(), "http://b.example".into()])
        );
    }

    #[test]
    fn empty_api_key_is_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[("KICKSTART_API_KEY", "")]));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn reads_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "port": 8080, "database_path": "/tmp/ks.db" }"#).unwrap();

        let config = Config::from_file(&path).unwrap();

        assert_eq!(config.port(), 8080);
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/ks.db")));
        assert!(config.cors_origins.is_none());
    }
}
