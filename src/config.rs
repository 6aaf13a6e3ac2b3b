use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::{CostEngineerError, Result};

pub const ENV_BACKEND_URL: &str = "COST_ENGINEER_BACKEND_URL";
pub const ENV_API_KEY: &str = "COST_ENGINEER_API_KEY";
pub const ENV_USER_ID: &str = "COST_ENGINEER_USER_ID";
pub const ENV_REGION: &str = "COST_ENGINEER_REGION";

const CONFIG_FILE_NAME: &str = "config.json";

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("uk.co", "Elec-Mate", "cost-engineer")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the hosted job service. The in-memory backend is used when unset.
    pub backend_url: Option<String>,
    pub api_key: Option<String>,
    /// Settings are stored under `guest` when no user is signed in.
    pub user_id: Option<String>,
    pub region: String,
    pub poll_interval_ms: u64,
    pub max_poll_errors: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            api_key: None,
            user_id: None,
            region: "UK".to_string(),
            poll_interval_ms: 2000,
            max_poll_errors: 3,
        }
    }
}

impl AppConfig {
    /// Loads `config.json` from the platform config directory and applies
    /// environment overrides on top.
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| CostEngineerError::Config(format!("{}: {e}", path.display())))
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_BACKEND_URL) {
            self.backend_url = Some(url);
        }
        if let Some(key) = non_empty(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(user) = non_empty(ENV_USER_ID) {
            self.user_id = Some(user);
        }
        if let Some(region) = non_empty(ENV_REGION) {
            self.region = region;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig::load_from(&dir.path().join("nope.json")).expect("load");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{ "region": "Scotland", "poll_interval_ms": 500 }"#).expect("write");
        let config = AppConfig::load_from(&path).expect("load");
        assert_eq!(config.region, "Scotland");
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.max_poll_errors, 3);
        assert!(config.backend_url.is_none());
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").expect("write");
        let err = AppConfig::load_from(&path).expect_err("should fail");
        assert!(matches!(err, CostEngineerError::Config(_)));
    }

    #[test]
    fn env_overrides_ignore_blank_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_BACKEND_URL, "https://example.supabase.co"),
            (ENV_USER_ID, "   "),
            (ENV_REGION, "Wales"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(
            config.backend_url.as_deref(),
            Some("https://example.supabase.co")
        );
        assert!(config.user_id.is_none());
        assert_eq!(config.region, "Wales");
    }
}
