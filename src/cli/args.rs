//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// k6provider - custom k6 binaries on demand
///
/// Resolves k6 dependencies against a k6build service and caches the
/// resulting binaries locally.
#[derive(Parser, Debug)]
#[command(name = "k6provider")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "K6_PROVIDER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Binary cache directory
    #[arg(long, global = true, env = "K6_BINARY_CACHE")]
    pub bin_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Get a k6 binary satisfying the given dependencies
    Binary(BinaryArgs),

    /// Manage the binary cache
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the binary command
#[derive(Parser, Debug)]
pub struct BinaryArgs {
    /// Dependency as NAME:CONSTRAINT or NAME=CONSTRAINT (e.g. k6:">=0.50.0", k6/x/sql)
    #[arg(short, long = "dep", value_name = "NAME:CONSTRAINT")]
    pub deps: Vec<String>,

    /// Target platform as os/arch (defaults to the current platform)
    #[arg(long)]
    pub platform: Option<String>,

    /// k6build service URL
    #[arg(long, env = "K6_BUILD_SERVICE_URL")]
    pub build_service_url: Option<String>,

    /// Proxy URL for downloading binaries
    #[arg(long, env = "K6_DOWNLOAD_PROXY")]
    pub download_proxy_url: Option<String>,

    /// Verify the downloaded binary against the artifact checksum
    #[arg(long)]
    pub verify_checksum: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: BinaryFormat,
}

/// Output format for the binary command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BinaryFormat {
    /// Path followed by resolved dependencies and checksum
    Text,
    /// JSON object
    Json,
    /// Path only
    Path,
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show the cache directory
    Path,

    /// List cached binaries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove a cached binary by build id
    Remove {
        /// Build identifier
        id: String,
    },

    /// Remove binaries older than N days
    Gc {
        /// Remove binaries older than N days (default: from config)
        #[arg(long)]
        days: Option<u32>,

        /// Dry run - show what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove all cached binaries
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}
