//! Local binary cache
//!
//! Binaries are stored content-addressed by the build identifier the build
//! service assigns to each artifact:
//!
//! ```text
//! <cache root>/<build id>/k6
//! ```
//!
//! # Cache States
//!
//! | State | On disk | Description |
//! |-------|---------|-------------|
//! | Miss | no `k6` file | Directory absent, or left without a binary |
//! | Downloading | `.k6-*.partial` | Download in progress, renamed into place on success |
//! | Complete | `k6` | Finalized, reused without re-verification |
//!
//! A failed download removes the whole build directory so a later lookup
//! never mistakes a partial file for a complete binary.

pub mod lock;
pub mod store;

pub use lock::KeyedLocks;
pub use store::{format_bytes, BinaryCache, CacheEntry, DirRollback, Lookup, K6_BINARY};
