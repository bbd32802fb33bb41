//! k6provider - custom k6 binaries on demand
//!
//! Resolves a set of k6 dependencies against a k6build service and keeps
//! the resulting binaries in a local cache keyed by build identifier.

pub mod build;
pub mod cache;
pub mod cli;
pub mod config;
pub mod deps;
pub mod download;
pub mod error;
pub mod provider;

#[cfg(test)]
mod testutil;

pub use build::{Artifact, BuildDependency, BuildService, BuildServiceError, HttpBuildService};
pub use config::ProviderConfig;
pub use deps::{Dependencies, Dependency};
pub use error::{ErrorKind, ProviderError, ProviderResult};
pub use provider::{K6Binary, Provider, ProviderBuilder};
