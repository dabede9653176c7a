//! Configuration storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::calling::ECHO_DESTINATION;

/// Token endpoint used when nothing is configured (local function host).
pub const DEFAULT_TOKEN_URL: &str = "http://localhost:7071/api/GetToken";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Token service endpoint returning `{token, userId, expiresOn}`
    pub token_url: String,
    /// Page type selecting the mode ("Device" or anything else for Cloud)
    pub page_type: Option<String>,
    /// Accept incoming calls without asking
    pub auto_accept: bool,
    /// Destination the loopback backend answers as the echo bot
    pub echo_destination: String,
    /// Directory scanned for `video*` camera nodes
    pub camera_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            page_type: None,
            auto_accept: false,
            echo_destination: ECHO_DESTINATION.to_string(),
            camera_root: PathBuf::from("/dev"),
        }
    }
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "call-panel", "call-panel")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        fs::write(path, self.to_toml()?).context("Failed to write config file")?;

        // Token URL may carry a function key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
