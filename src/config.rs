use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for repodrop
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// GitHub authentication and API settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Upload behavior settings
    #[serde(default)]
    pub upload: UploadConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// Authentication method
    #[serde(default = "default_auth_method")]
    pub auth_method: String, // "auto", "gh_cli", "token"

    /// API base URL for GitHub Enterprise (github.com if null)
    #[serde(default)]
    pub api_url: Option<String>,
}

/// Upload configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    /// Branch files are uploaded to when none is given
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Branch other branches are forked from
    #[serde(default = "default_branch")]
    pub base_branch: String,

    /// Commit message used for every uploaded file
    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    /// Create private repositories by default
    #[serde(default)]
    pub private: bool,

    /// Ignore file read from the root of the project
    #[serde(default = "default_ignore_file")]
    pub ignore_file: String,

    /// File written to initialize an empty base branch
    #[serde(default = "default_placeholder_path")]
    pub placeholder_path: String,

    /// Maximum uploads in flight
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String, // "compact", "full"

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
}

// Default value functions
fn default_auth_method() -> String {
    "auto".to_string()
}
fn default_true() -> bool {
    true
}
fn default_branch() -> String {
    "main".to_string()
}
fn default_commit_message() -> String {
    "Initial commit".to_string()
}
fn default_ignore_file() -> String {
    ".gitignore".to_string()
}
fn default_placeholder_path() -> String {
    ".placeholder".to_string()
}
fn default_max_parallel() -> usize {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

// Default implementations
impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            auth_method: default_auth_method(),
            api_url: None,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            branch: default_branch(),
            base_branch: default_branch(),
            commit_message: default_commit_message(),
            private: false,
            ignore_file: default_ignore_file(),
            placeholder_path: default_placeholder_path(),
            max_parallel: default_max_parallel(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let config = Self::default();

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            config.save(&config_path)?;

            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_values()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("repodrop").join("config.yml"))
    }

    /// Expand environment variables in configured values
    pub fn expand_values(&mut self) -> Result<()> {
        if let Some(api_url) = self.github.api_url.as_deref() {
            let expanded = shellexpand::env(api_url)
                .context("Failed to expand github.api_url")?
                .into_owned();
            self.github.api_url = Some(expanded);
        }

        Ok(())
    }
}

/// Expand `~` and environment variables in a user-supplied path and normalize it
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| format!("Failed to expand path: {}", path))?;
    Ok(path_clean::clean(expanded.into_owned()))
}
