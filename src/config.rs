use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8402".to_string()
}

/// Download and decode ceilings plus fetch timeouts.
#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Hard ceiling on downloaded bytes, enforced after every stream chunk.
    #[serde(default = "default_max_bytes")]
    pub max_file_size_bytes: u64,
    /// Ceiling on the raw base64 text length, checked before decoding.
    #[serde(default = "default_max_bytes")]
    pub max_base64_bytes: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_bytes(),
            max_base64_bytes: default_max_bytes(),
            connect_timeout_secs: default_connect_timeout(),
            total_timeout_secs: default_total_timeout(),
        }
    }
}

fn default_max_bytes() -> u64 {
    100 * 1024 * 1024
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_total_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SecurityConfig {
    /// Exempts loopback addresses (and only loopback) from the address
    /// deny-list. Intended for local development and integration tests;
    /// private, link-local, and metadata ranges stay blocked regardless.
    #[serde(default)]
    pub allow_loopback: bool,
}

/// Loads and validates the TOML config. A missing file yields the defaults,
/// so `mdgate` runs without any configuration on disk.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.limits.max_file_size_bytes == 0 {
        anyhow::bail!("limits.max_file_size_bytes must be > 0");
    }
    if config.limits.max_base64_bytes == 0 {
        anyhow::bail!("limits.max_base64_bytes must be > 0");
    }
    if config.limits.connect_timeout_secs == 0 || config.limits.total_timeout_secs == 0 {
        anyhow::bail!("limits timeouts must be > 0");
    }
    if config.limits.connect_timeout_secs > config.limits.total_timeout_secs {
        anyhow::bail!("limits.connect_timeout_secs must not exceed limits.total_timeout_secs");
    }

    Ok(config)
}
