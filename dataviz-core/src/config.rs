use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Default upload ceiling: 50 MB.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DashboardConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub downloads: DownloadConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RegistryConfig {
    pub poll_interval_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UploadConfig {
    pub max_file_bytes: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            allowed_extensions: ["csv", "xlsx", "xls", "json"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub store_path: String,
    pub token_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_path: "~/.dataviz/session.json".to_string(),
            token_key: "token".to_string(),
        }
    }
}

impl SessionConfig {
    /// Store path with `~` expanded.
    pub fn resolved_store_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.store_path).into_owned())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DownloadConfig {
    pub output_dir: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: ".".to_string(),
        }
    }
}

impl DashboardConfig {
    /// Load from an optional TOML file, overridden by `DATAVIZ__SECTION__KEY`
    /// environment variables.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("DATAVIZ").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}
