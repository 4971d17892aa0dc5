//! Configuration loading
//!
//! This module loads the bridge configuration from files and environment
//! variables.

pub mod loader;

// Re-export commonly used items
pub use loader::{load_from_file, load_with_env, parse_config, probe_config_paths, validate};
