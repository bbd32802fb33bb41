//! Error types for k6provider
//!
//! All modules use `ProviderResult<T>` as their return type. Every error
//! belongs to one of the classes in [`ErrorKind`], which callers can branch on
//! without matching message text.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for k6provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Boxed underlying cause carried by build and download errors
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable classification of a [`ProviderError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid setup, detected at construction time
    Config,
    /// A dependency entry cannot be turned into a constraint
    Dependency,
    /// The build service call failed
    Build,
    /// A local filesystem operation failed
    Binary,
    /// Fetching the artifact bytes failed
    Download,
    /// Raised outside the provider core (CLI output, config persistence)
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Config => "invalid configuration",
            Self::Dependency => "invalid dependency",
            Self::Build => "building binary",
            Self::Binary => "creating binary",
            Self::Download => "downloading binary",
            Self::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// All errors that can occur in k6provider
#[derive(Error, Debug)]
pub enum ProviderError {
    // Configuration errors
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid configuration: {context}: {source}")]
    ConfigSource {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid configuration at {path}: {reason}")]
    ConfigFile { path: PathBuf, reason: String },

    // Dependency errors
    #[error("invalid dependency {name:?}: {reason}")]
    Dependency { name: String, reason: String },

    // Build errors
    #[error("building binary: {0}")]
    Build(#[source] crate::build::BuildServiceError),

    // Local binary errors
    #[error("creating binary: {context}: {source}")]
    Binary {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("creating binary: invalid build id {0:?}")]
    InvalidBuildId(String),

    // Download errors
    #[error("downloading binary from {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("downloading binary from {url}: unexpected status {status}")]
    DownloadStatus { url: String, status: u16 },

    #[error("downloading binary from {url}: checksum mismatch, expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("downloading binary from {url}: checksum verification requested but none was reported")]
    MissingChecksum { url: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // IO errors outside the cache path
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    User(String),
}

impl ProviderError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a local binary error with context
    pub fn binary(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Binary {
            context: context.into(),
            source,
        }
    }

    /// Create a download error wrapping a transport or write failure
    pub fn download(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Download {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Create a configuration error wrapping an underlying cause
    pub fn config_source(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::ConfigSource {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Create a dependency error
    pub fn dependency(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Dependency {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::ConfigSource { .. } | Self::ConfigFile { .. } => {
                ErrorKind::Config
            }
            Self::Dependency { .. } => ErrorKind::Dependency,
            Self::Build(_) => ErrorKind::Build,
            Self::Binary { .. } | Self::InvalidBuildId(_) => ErrorKind::Binary,
            Self::Download { .. }
            | Self::DownloadStatus { .. }
            | Self::ChecksumMismatch { .. }
            | Self::MissingChecksum { .. } => ErrorKind::Download,
            Self::Json(_) | Self::TomlSerialize(_) | Self::Io { .. } | Self::User(_) => {
                ErrorKind::Other
            }
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        if let Self::MissingChecksum { .. } = self {
            return false;
        }
        matches!(self.kind(), ErrorKind::Build | ErrorKind::Download)
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Config(msg) if msg.contains("build service URL") => {
                Some("Set K6_BUILD_SERVICE_URL or pass --build-service-url")
            }
            Self::Dependency { .. } => {
                Some("Use NAME:CONSTRAINT or NAME=CONSTRAINT, e.g. k6/x/sql:\">=0.4.0\"")
            }
            Self::Build(_) => Some("Check that the build service is reachable and retry"),
            Self::ChecksumMismatch { .. } => Some("Run: k6provider cache remove <ID>, then retry"),
            Self::MissingChecksum { .. } => Some("Retry without --verify-checksum"),
            _ => None,
        }
    }
}
