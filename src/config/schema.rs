//! Configuration schema for k6provider
//!
//! Configuration is stored at `~/.config/k6provider/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build service settings
    pub build: BuildConfig,

    /// Local binary cache settings
    pub cache: CacheConfig,

    /// Download settings
    pub download: DownloadConfig,
}

/// Build service settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Base URL of the k6build service
    pub service_url: Option<String>,

    /// Target platform as `os/arch` (defaults to the current platform)
    pub platform: Option<String>,
}

/// Binary cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root directory (defaults to `<tmp>/k6provider/cache`)
    pub dir: Option<PathBuf>,

    /// `cache gc` removes binaries older than N days (0 = disabled)
    pub gc_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            gc_days: 30,
        }
    }
}

/// Download settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Proxy for downloading binaries and talking to the build service
    pub proxy_url: Option<String>,

    /// Verify downloaded binaries against the artifact checksum
    pub verify_checksum: bool,

    /// Per-request timeout in seconds (0 = no timeout)
    pub timeout_secs: u64,
}
