//! Application layer modules
//!
//! Configuration management for embedding the resolver in a tool.

pub mod config;
pub mod env;
pub mod loader;

// Re-export main types for convenience
pub use config::{ConfigOverlay, RivetConfig};
pub use env::EnvironmentConfig;
