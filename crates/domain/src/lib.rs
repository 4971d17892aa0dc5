//! # rws-bridge Domain
//!
//! Data model for the Robot Web Services bridge.
//!
//! This crate contains:
//! - Subscription, event, record and command types
//! - Error taxonomy for every protocol phase
//! - Configuration structures
//! - Protocol constants
//!
//! ## Architecture
//! - No dependencies on other rws-bridge crates
//! - No I/O
//! - Only external dependencies allowed

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
