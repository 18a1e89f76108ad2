use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use leaders_engine::{ClientSettings, HarvestSettings};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LogDestination;

pub const BASE_URL_ENV: &str = "LEADERS_BASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

/// Settings read from an optional RON file; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub output_path: PathBuf,
    pub log_destination: LogDestination,
    pub log_file: PathBuf,
    pub verbose: bool,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: Option<String>,
    pub profile_url_field: String,
    pub intro_field: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        let harvest = HarvestSettings::default();
        Self {
            base_url: "https://country-leaders.onrender.com".to_string(),
            output_path: PathBuf::from("leaders.json"),
            log_destination: LogDestination::Terminal,
            log_file: PathBuf::from("leaders.log"),
            verbose: false,
            connect_timeout_secs: client.connect_timeout.as_secs(),
            request_timeout_secs: client.request_timeout.as_secs(),
            user_agent: None,
            profile_url_field: harvest.profile_url_field,
            intro_field: harvest.intro_field,
        }
    }
}

impl AppConfig {
    pub fn client_settings(&self) -> ClientSettings {
        let defaults = ClientSettings::default();
        ClientSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            user_agent: self.user_agent.clone().unwrap_or_else(|| defaults.user_agent.clone()),
            ..defaults
        }
    }

    pub fn harvest_settings(&self) -> HarvestSettings {
        HarvestSettings {
            profile_url_field: self.profile_url_field.clone(),
            intro_field: self.intro_field.clone(),
        }
    }
}

/// Loads the config file if one is given, then applies the environment
/// override for the base url.
pub fn load(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => AppConfig::default(),
    };
    if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
        if !base_url.trim().is_empty() {
            config.base_url = base_url.trim().to_string();
        }
    }
    Ok(config)
}

fn parse_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
