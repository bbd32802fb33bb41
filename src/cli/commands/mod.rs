//! CLI command implementations

pub mod binary;
pub mod cache;
pub mod config;

pub use binary::execute as binary;
pub use cache::execute as cache;
pub use config::execute as config;
