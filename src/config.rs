use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::KnapsackError;
use crate::query::{DEFAULT_BASE_URL, QueryBuilder};

pub const DEFAULT_CONFIG_FILE: &str = "knapsack.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_PAGES: usize = 50;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_pages: Option<usize>,
    #[serde(default)]
    pub request_delay_ms: Option<u64>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    pub schema_version: u32,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_pages: usize,
    pub request_delay_ms: u64,
    pub user_agent: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            schema_version: 1,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_pages: DEFAULT_MAX_PAGES,
            request_delay_ms: 0,
            user_agent: default_user_agent(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads settings from `path`, or from the first default location that
    /// exists. No file at all yields the defaults.
    pub fn resolve(path: Option<&str>) -> Result<SearchSettings, KnapsackError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => default_locations().into_iter().find(|path| path.exists()),
        };

        let Some(config_path) = config_path else {
            debug!("no config file found, using defaults");
            return Self::resolve_config(Config::default());
        };

        debug!(path = %config_path.display(), "loading config");
        let content = fs::read_to_string(&config_path)
            .map_err(|_| KnapsackError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KnapsackError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<SearchSettings, KnapsackError> {
        let defaults = SearchSettings::default();
        let settings = SearchSettings {
            schema_version: config.schema_version.unwrap_or(defaults.schema_version),
            base_url: config.base_url.unwrap_or(defaults.base_url),
            timeout_secs: config.timeout_secs.unwrap_or(defaults.timeout_secs),
            max_pages: config.max_pages.unwrap_or(defaults.max_pages),
            request_delay_ms: config.request_delay_ms.unwrap_or(defaults.request_delay_ms),
            user_agent: config.user_agent.unwrap_or(defaults.user_agent),
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl SearchSettings {
    pub fn validate(&self) -> Result<(), KnapsackError> {
        if self.max_pages == 0 {
            return Err(KnapsackError::InvalidConfig(
                "max_pages must be at least 1".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(KnapsackError::InvalidConfig(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(KnapsackError::InvalidConfig(
                "user_agent must not be empty".to_string(),
            ));
        }
        QueryBuilder::new(&self.base_url)
            .map_err(|err| KnapsackError::InvalidConfig(format!("base_url: {err}")))?;
        Ok(())
    }
}

pub fn default_user_agent() -> String {
    format!("knapsack-search/{}", env!("CARGO_PKG_VERSION"))
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
    if let Some(dirs) = ProjectDirs::from("", "", "knapsack-search") {
        locations.push(dirs.config_dir().join("config.json"));
    }
    locations
}
