use crate::constants::{
    DEFAULT_EZID_BASE_URL, DEFAULT_FAST_BASE_URL, DEFAULT_LICENSE, DEFAULT_PUBLISHER,
    DEFAULT_PUBLISHER_AUTHORITY, DEFAULT_SHOULDER, DEFAULT_TARGET_BASE_URL, EZID_PASSWORD_ENV,
    EZID_USERNAME_ENV,
};
use crate::error::{AlbumError, MintingError, Result};
use crate::minting::RetryPolicy;
use chrono::{Datelike, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "album_ark.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ezid: EzidConfig,
    pub retry: RetryConfig,
    pub site: SiteConfig,
    pub labels: LabelsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EzidConfig {
    pub base_url: String,
    pub shoulder: String,
    pub timeout_seconds: u64,
}

impl Default for EzidConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EZID_BASE_URL.to_string(),
            shoulder: DEFAULT_SHOULDER.to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub attempt_timeout_secs: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay_ms,
            max_delay_ms: policy.max_delay_ms,
            attempt_timeout_secs: policy.attempt_timeout.as_secs(),
            jitter: policy.jitter,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms.max(self.base_delay_ms),
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs.max(1)),
            jitter: self.jitter,
        }
    }
}

/// Publishing details stamped into every generated document
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub target_base_url: String,
    pub publisher: String,
    pub publisher_authority: String,
    pub license: String,
    pub sd_publisher: String,
    /// Year of the structured-data publication; current year when unset
    pub sd_date_published: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            target_base_url: DEFAULT_TARGET_BASE_URL.to_string(),
            publisher: DEFAULT_PUBLISHER.to_string(),
            publisher_authority: DEFAULT_PUBLISHER_AUTHORITY.to_string(),
            license: DEFAULT_LICENSE.to_string(),
            sd_publisher: DEFAULT_PUBLISHER.to_string(),
            sd_date_published: None,
        }
    }
}

impl SiteConfig {
    pub fn sd_date_published(&self) -> String {
        self.sd_date_published
            .clone()
            .unwrap_or_else(|| Utc::now().year().to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    pub lookup: bool,
    pub fast_base_url: String,
    pub timeout_seconds: u64,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            lookup: true,
            fast_base_url: DEFAULT_FAST_BASE_URL.to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

impl Config {
    /// Reads `path` when given; otherwise `album_ark.toml` if present, else
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if !default.exists() {
                    return Ok(Config::default());
                }
                default
            }
        };
        let config_content = fs::read_to_string(&config_path).map_err(|e| {
            AlbumError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

/// Registration credentials; only ever read from the environment
#[derive(Clone)]
pub struct EzidCredentials {
    pub username: String,
    pub password: String,
}

impl EzidCredentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |name: &str| match lookup(name) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            Some(_) => Err(MintingError::Credentials(format!("{} is empty", name))),
            None => Err(MintingError::Credentials(format!("{} is not set", name))),
        };
        Ok(Self {
            username: read(EZID_USERNAME_ENV)?,
            password: read(EZID_PASSWORD_ENV)?,
        })
    }
}

impl std::fmt::Debug for EzidCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EzidCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
