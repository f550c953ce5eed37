use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{MIN_POLL_INTERVAL_SECS, REQUEST_MAX_RETRIES, REQUEST_TIMEOUT_SECS};
use crate::model::FolderId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Account whose notes and gallery are mirrored
    pub username: String,
    /// SQLite mirror location (defaults to the data directory)
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Note folders never synced. Local rows for them are removed.
    #[serde(default)]
    pub ignored_folders: Vec<String>,
    /// Write logs to a file in the config directory instead of stderr
    #[serde(default)]
    pub log_to_file: bool,
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    /// Desktop notification settings
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between pass starts
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Mirror note folders
    #[serde(default = "default_true")]
    pub notes: bool,
    /// Mirror the gallery
    #[serde(default = "default_true")]
    pub gallery: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            notes: true,
            gallery: true,
        }
    }
}

impl SyncConfig {
    /// Poll interval, never shorter than the polite minimum.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(MIN_POLL_INTERVAL_SECS))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Notify about new notes and deviations
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Show titles in the notification
    #[serde(default = "default_true")]
    pub show_preview: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            show_preview: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    REQUEST_TIMEOUT_SECS
}

fn default_max_retries() -> u32 {
    REQUEST_MAX_RETRIES
}

fn default_interval_secs() -> u64 {
    MIN_POLL_INTERVAL_SECS
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("devmirror");
        Ok(dir)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn data_dir() -> Result<PathBuf> {
        let dir = dirs::data_local_dir()
            .context("Could not find data directory")?
            .join("devmirror");
        Ok(dir)
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("mirror.db")),
        }
    }

    /// Ignored folder entries as folder ids. Malformed entries are an error
    /// rather than silently matching nothing.
    pub fn ignored_folder_ids(&self) -> Result<Vec<FolderId>> {
        self.ignored_folders
            .iter()
            .map(|raw| {
                FolderId::parse(raw)
                    .with_context(|| format!("Invalid entry in ignored_folders: {:?}", raw))
            })
            .collect()
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            anyhow::bail!(
                "Configuration file not found at {}\n\
                 Please create a config file. Example:\n\n\
                 username = \"your-name\"\n\
                 ignored_folders = [\"unread\"]\n\n\
                 [remote]\n\
                 base_url = \"https://mirror.example.com/api/\"\n\n\
                 [sync]\n\
                 interval_secs = 600",
                path.display()
            );
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.ignored_folder_ids()?;
        Ok(config)
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(Self::config_dir()?)?;
        let db = self.database_path()?;
        if let Some(parent) = db.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }
        Ok(())
    }
}
