//! Configuration Management
//!
//! Handles persistent configuration storage for slsctl.

use crate::sls::client::{Endpoint, DEFAULT_REGION};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default deadline for tag updates
pub const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const REGION_VARS: &[&str] = &["ALIBABA_CLOUD_REGION", "ALICLOUD_REGION"];

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Last used region
    #[serde(default)]
    pub region: Option<String>,
    /// `public`, `intranet`, or a URL template
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Deadline for tag updates, in seconds
    #[serde(default)]
    pub update_timeout_secs: Option<u64>,
}

/// Region from the environment, if set
fn env_region() -> Option<String> {
    REGION_VARS
        .iter()
        .filter_map(|v| std::env::var(v).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("slsctl").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Get effective region (CLI > config > environment > default)
    pub fn effective_region(&self, cli: Option<&str>) -> String {
        cli.map(|s| s.to_string())
            .or_else(|| self.region.clone())
            .or_else(env_region)
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    /// Get effective endpoint (CLI > config > public)
    pub fn effective_endpoint(&self, cli: Option<&str>) -> Result<Endpoint> {
        let raw = cli.or(self.endpoint.as_deref()).unwrap_or("public");
        Endpoint::parse(raw).with_context(|| format!("Invalid endpoint '{}'", raw))
    }

    /// Get effective update timeout (CLI > config > default)
    pub fn effective_update_timeout(&self, cli: Option<u64>) -> Duration {
        cli.or(self.update_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_UPDATE_TIMEOUT)
    }

    /// Set region and save
    pub fn set_region(&mut self, region: &str) -> Result<()> {
        self.region = Some(region.to_string());
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let config = Config {
            region: Some("cn-beijing".to_string()),
            endpoint: Some("intranet".to_string()),
            update_timeout_secs: Some(30),
        };
        assert_eq!(config.effective_region(Some("cn-shanghai")), "cn-shanghai");
        assert_eq!(config.effective_region(None), "cn-beijing");
        assert_eq!(config.effective_endpoint(None).unwrap(), Endpoint::Intranet);
        assert_eq!(
            config.effective_update_timeout(None),
            Duration::from_secs(30)
        );
        assert_eq!(
            config.effective_update_timeout(Some(5)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.effective_endpoint(None).unwrap(), Endpoint::Public);
        assert_eq!(config.effective_update_timeout(None), DEFAULT_UPDATE_TIMEOUT);
        assert!(config.effective_endpoint(Some("::bad")).is_err());
    }

    #[test]
    fn test_partial_config_deserializes() {
        let config: Config = serde_json::from_str(r#"{"region":"cn-qingdao"}"#).unwrap();
        assert_eq!(config.region.as_deref(), Some("cn-qingdao"));
        assert_eq!(config.endpoint, None);
    }
}
