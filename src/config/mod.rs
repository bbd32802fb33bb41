//! Configuration management for k6provider
//!
//! The provider itself only ever sees a fully resolved [`ProviderConfig`].
//! Reading the config file and layering command-line flags and environment
//! variables on top happens here and in the CLI.

pub mod schema;

pub use schema::Config;

use crate::error::{ProviderError, ProviderResult};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

/// Fully resolved provider settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Target platform as `os/arch`
    pub platform: String,
    /// Cache root directory
    pub bin_dir: PathBuf,
    /// Base URL of the build service
    pub build_service_url: String,
    /// Proxy for downloads, if any
    pub download_proxy_url: Option<String>,
    /// Verify downloads against the artifact checksum
    pub verify_checksum: bool,
    /// Per-request HTTP timeout
    pub request_timeout: Option<Duration>,
}

impl ProviderConfig {
    /// Settings with defaults for everything but the build service URL
    pub fn new(build_service_url: impl Into<String>) -> Self {
        Self {
            platform: default_platform(),
            bin_dir: default_bin_dir(),
            build_service_url: build_service_url.into(),
            download_proxy_url: None,
            verify_checksum: false,
            request_timeout: None,
        }
    }
}

/// Values supplied on the command line or through the environment.
/// Set fields win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub platform: Option<String>,
    pub bin_dir: Option<PathBuf>,
    pub build_service_url: Option<String>,
    pub download_proxy_url: Option<String>,
    pub verify_checksum: bool,
}

impl Config {
    /// Merge the file config with overrides into provider settings
    pub fn resolve(&self, overrides: &Overrides) -> ProviderConfig {
        let timeout = match self.download.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        ProviderConfig {
            platform: pick(&overrides.platform, &self.build.platform).unwrap_or_else(default_platform),
            bin_dir: overrides
                .bin_dir
                .clone()
                .or_else(|| self.cache.dir.clone())
                .unwrap_or_else(default_bin_dir),
            build_service_url: pick(&overrides.build_service_url, &self.build.service_url)
                .unwrap_or_default(),
            download_proxy_url: pick(&overrides.download_proxy_url, &self.download.proxy_url),
            verify_checksum: overrides.verify_checksum || self.download.verify_checksum,
            request_timeout: timeout,
        }
    }
}

/// First non-empty value of `primary`, then `fallback`
fn pick(primary: &Option<String>, fallback: &Option<String>) -> Option<String> {
    primary
        .iter()
        .chain(fallback.iter())
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Current platform in the build service's `os/arch` naming
pub fn default_platform() -> String {
    platform_name(std::env::consts::OS, std::env::consts::ARCH)
}

fn platform_name(os: &str, arch: &str) -> String {
    let os = match os {
        "macos" => "darwin",
        other => other,
    };
    let arch = match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64",
        "s390x" => "s390x",
        other => other,
    };
    format!("{}/{}", os, arch)
}

/// Default cache root under the system temp directory
pub fn default_bin_dir() -> PathBuf {
    std::env::temp_dir().join("k6provider").join("cache")
}

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("k6provider")
            .join("config.toml")
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> ProviderResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> ProviderResult<Config> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            ProviderError::io(format!("reading config from {}", path.display()), e)
        })?;

        toml::from_str(&content).map_err(|e| ProviderError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> ProviderResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                ProviderError::io(format!("creating config directory {}", parent.display()), e)
            })?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            ProviderError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
