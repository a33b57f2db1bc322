//! Configuration
//!
//! Cache tuning and Dropbox connection settings. Values are passed into
//! constructors so tests can shrink the TTL or spool threshold locally.

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

/// Items in the metadata cache are considered expired after 5 minutes
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Max bytes spooled to memory before switching to a temp file (5 MiB)
pub const DEFAULT_MAX_BUFFER: usize = 5 * 1024 * 1024;

/// Dropbox API endpoint for metadata and file operations
pub const DEFAULT_API_URL: &str = "https://api.dropbox.com/1";

/// Dropbox API endpoint for file content
pub const DEFAULT_CONTENT_URL: &str = "https://api-content.dropbox.com/1";

/// Cache and transfer tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a cache entry stays fresh
    pub ttl: Duration,
    /// Spool threshold for uploads and downloads
    pub max_buffer: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            max_buffer: DEFAULT_MAX_BUFFER,
        }
    }
}

/// Which root the access token was granted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessType {
    /// Full Dropbox access
    #[default]
    Dropbox,
    /// Access limited to the app's own folder
    AppFolder,
}

impl AccessType {
    /// Root segment used in API URLs
    pub fn root(&self) -> &'static str {
        match self {
            AccessType::Dropbox => "dropbox",
            AccessType::AppFolder => "sandbox",
        }
    }
}

impl std::str::FromStr for AccessType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dropbox" => Ok(AccessType::Dropbox),
            "app_folder" | "sandbox" => Ok(AccessType::AppFolder),
            other => Err(anyhow!(
                "Unknown access type '{}' (expected 'dropbox' or 'app_folder')",
                other
            )),
        }
    }
}

/// Everything needed to build a Dropbox filesystem
#[derive(Debug, Clone)]
pub struct DropboxConfig {
    /// OAuth access token (obtained out of band)
    pub access_token: String,
    pub access_type: AccessType,
    /// Report modification times in local time instead of UTC
    pub localtime: bool,
    pub cache: CacheConfig,
    pub api_url: String,
    pub content_url: String,
}

impl DropboxConfig {
    /// Create a config with default endpoints and cache settings
    pub fn new(access_token: impl Into<String>, access_type: AccessType) -> Self {
        Self {
            access_token: access_token.into(),
            access_type,
            localtime: false,
            cache: CacheConfig::default(),
            api_url: DEFAULT_API_URL.to_string(),
            content_url: DEFAULT_CONTENT_URL.to_string(),
        }
    }

    /// Build a config from environment variables
    ///
    /// * `DROPBOX_ACCESS_TOKEN` - required
    /// * `DROPBOX_ACCESS_TYPE` - `dropbox` (default) or `app_folder`
    /// * `DROPBOXFS_LOCALTIME` - `1`/`true` to report local times
    /// * `DROPBOXFS_CACHE_TTL` - cache TTL in seconds
    /// * `DROPBOXFS_MAX_BUFFER` - spool threshold in bytes
    pub fn from_env() -> Result<Self> {
        let access_token = env::var("DROPBOX_ACCESS_TOKEN")
            .context("DROPBOX_ACCESS_TOKEN must be set")?;

        let access_type = match env::var("DROPBOX_ACCESS_TYPE") {
            Ok(value) => value.parse()?,
            Err(_) => AccessType::default(),
        };

        let mut config = Self::new(access_token, access_type);

        if let Ok(value) = env::var("DROPBOXFS_LOCALTIME") {
            config.localtime = matches!(value.as_str(), "1" | "true" | "yes");
        }
        if let Ok(value) = env::var("DROPBOXFS_CACHE_TTL") {
            let secs: u64 = value
                .parse()
                .with_context(|| format!("Invalid DROPBOXFS_CACHE_TTL: {}", value))?;
            config.cache.ttl = Duration::from_secs(secs);
        }
        if let Ok(value) = env::var("DROPBOXFS_MAX_BUFFER") {
            config.cache.max_buffer = value
                .parse()
                .with_context(|| format!("Invalid DROPBOXFS_MAX_BUFFER: {}", value))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert_eq!(config.max_buffer, 5 * 1024 * 1024);
    }

    #[test]
    fn test_access_type_parse() {
        assert_eq!("dropbox".parse::<AccessType>().unwrap(), AccessType::Dropbox);
        assert_eq!(
            "app_folder".parse::<AccessType>().unwrap(),
            AccessType::AppFolder
        );
        assert!("team".parse::<AccessType>().is_err());
        assert_eq!(AccessType::AppFolder.root(), "sandbox");
    }

    // Single test so no other test sees these variables change
    #[test]
    fn test_from_env() {
        env::set_var("DROPBOX_ACCESS_TOKEN", "token-123");
        env::set_var("DROPBOX_ACCESS_TYPE", "app_folder");
        env::set_var("DROPBOXFS_LOCALTIME", "1");
        env::set_var("DROPBOXFS_CACHE_TTL", "10");
        env::set_var("DROPBOXFS_MAX_BUFFER", "2048");

        let config = DropboxConfig::from_env().unwrap();
        assert_eq!(config.access_token, "token-123");
        assert_eq!(config.access_type, AccessType::AppFolder);
        assert!(config.localtime);
        assert_eq!(config.cache.ttl, Duration::from_secs(10));
        assert_eq!(config.cache.max_buffer, 2048);
        assert_eq!(config.api_url, DEFAULT_API_URL);

        env::set_var("DROPBOXFS_CACHE_TTL", "soon");
        assert!(DropboxConfig::from_env().is_err());
        env::remove_var("DROPBOXFS_CACHE_TTL");

        env::remove_var("DROPBOX_ACCESS_TOKEN");
        assert!(DropboxConfig::from_env().is_err());

        for name in [
            "DROPBOX_ACCESS_TYPE",
            "DROPBOXFS_LOCALTIME",
            "DROPBOXFS_MAX_BUFFER",
        ] {
            env::remove_var(name);
        }
    }
}
