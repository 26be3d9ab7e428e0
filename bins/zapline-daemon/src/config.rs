use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zapline_core::config::BridgeConfig;

#[derive(Clone, Debug, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Directory of the local credential fallback, used when no
    /// `[supabase]` table is configured.
    #[serde(default = "default_auth_dir")]
    pub auth_dir: PathBuf,
    #[serde(default)]
    pub supabase: Option<SupabaseConfig>,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            auth_dir: default_auth_dir(),
            supabase: None,
            bridge: BridgeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SupabaseConfig {
    pub url: String,
    pub key: String,
    #[serde(default = "default_sessions_table")]
    pub sessions_table: String,
    #[serde(default = "default_leads_table")]
    pub leads_table: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:3001".to_string()
}

fn default_auth_dir() -> PathBuf {
    PathBuf::from("auth_info")
}

fn default_sessions_table() -> String {
    "whatsapp_sessions".to_string()
}

fn default_leads_table() -> String {
    "leads".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io")]
    Io,
    #[error("parse")]
    Parse,
}

pub fn load_config(path: &Path) -> Result<DaemonConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|_| ConfigError::Io)?;
    toml::from_str(&content).map_err(|_| ConfigError::Parse)
}
