//! Configuration Module
//!
//! Loads and validates configuration from TOML files, with secrets
//! optionally supplied through the environment.

pub mod loader;

pub use loader::{load_config, Config, ConfigError};
