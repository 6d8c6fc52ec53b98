use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::bridge::DEFAULT_BRIDGE_PORT;
use crate::domain::RestoreTier;
use crate::error::PortalError;
use crate::locator::{DEFAULT_CACHE_CAPACITY, DEFAULT_PRESIGN_TTL};
use crate::reconcile::AccessPolicy;

pub const CONFIG_FILE: &str = "portal-tracks.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub htsget_base_url: Option<String>,
    #[serde(default)]
    pub presign_cache_ttl_secs: Option<u64>,
    #[serde(default)]
    pub presign_cache_capacity: Option<usize>,
    #[serde(default)]
    pub restore_gated: Option<bool>,
    #[serde(default)]
    pub bridge_port: Option<u16>,
    #[serde(default)]
    pub restore_days: Option<u32>,
    #[serde(default)]
    pub restore_tier: Option<RestoreTier>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub api_base_url: String,
    pub htsget_base_url: Option<String>,
    pub presign_cache_ttl: Duration,
    pub presign_cache_capacity: usize,
    pub restore_gated: bool,
    pub bridge_port: u16,
    pub restore_days: u32,
    pub restore_tier: RestoreTier,
}

impl ResolvedConfig {
    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy {
            htsget_base_url: self.htsget_base_url.clone(),
            restore_gated: self.restore_gated,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Explicit path, else `portal-tracks.json` in the working directory,
    /// else the same file in the user config directory.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, PortalError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => Self::default_path().ok_or(PortalError::MissingConfig)?,
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| PortalError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| PortalError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("org", "umccr", "portal-tracks")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
            .filter(|path| path.exists())
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, PortalError> {
        let api_base_url = config
            .api_base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| PortalError::InvalidConfig("api_base_url is required".to_string()))?;
        let htsget_base_url = config
            .htsget_base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        let restore_days = config.restore_days.unwrap_or(7);
        if restore_days == 0 {
            return Err(PortalError::InvalidConfig(
                "restore_days must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            api_base_url,
            htsget_base_url,
            presign_cache_ttl: config
                .presign_cache_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_PRESIGN_TTL),
            presign_cache_capacity: config
                .presign_cache_capacity
                .unwrap_or(DEFAULT_CACHE_CAPACITY),
            restore_gated: config.restore_gated.unwrap_or(true),
            bridge_port: config.bridge_port.unwrap_or(DEFAULT_BRIDGE_PORT),
            restore_days,
            restore_tier: config.restore_tier.unwrap_or(RestoreTier::Bulk),
        })
    }
}
