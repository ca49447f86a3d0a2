//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the Nhost project to authenticate against, where local data lives, and the
//! routes used by the auth guard.
//!
//! Configuration is stored at `~/.config/pin/config.json`. The environment
//! variables `NHOST_SUBDOMAIN`, `NHOST_REGION` and `PIN_DATA_DIR` override the
//! file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::routing::{RouteGuard, DEFAULT_HOME_ROUTE, DEFAULT_LOGIN_ROUTE};

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "pin";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_SUBDOMAIN: &str = "mpukoxooxvgkvcueukvt";
const DEFAULT_REGION: &str = "eu-central-1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub nhost_subdomain: String,
    pub nhost_region: String,
    pub data_dir: Option<PathBuf>,
    pub login_route: String,
    pub home_route: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nhost_subdomain: DEFAULT_SUBDOMAIN.to_string(),
            nhost_region: DEFAULT_REGION.to_string(),
            data_dir: None,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            home_route: DEFAULT_HOME_ROUTE.to_string(),
        }
    }
}

impl Config {
    /// Load the config file (or defaults) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(subdomain) = var("NHOST_SUBDOMAIN") {
            self.nhost_subdomain = subdomain;
        }
        if let Some(region) = var("NHOST_REGION") {
            self.nhost_region = region;
        }
        if let Some(dir) = var("PIN_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the option database and local storage.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Directory backing `FileStorage`.
    pub fn storage_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("storage"))
    }

    pub fn route_guard(&self) -> RouteGuard {
        RouteGuard::new(&self.login_route, &self.home_route)
    }
}
