//! # RWS Bridge Infrastructure
//!
//! Network side of the bridge, built on the ports in `rws-bridge-core`.
//!
//! This crate contains:
//! - Digest-authenticated HTTP sessions (reqwest, cookie jar)
//! - Subscription negotiation and the WebSocket event stream
//! - The command writer for the output side
//! - Input and output plugin lifecycles
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `rws-bridge-core`
//! - Contains all I/O; core and domain stay pure

pub mod config;
pub(crate) mod errors;
pub mod http;
pub mod observability;
pub mod output;
pub mod plugins;
pub mod subscription;

// Re-export commonly used items
pub use http::{SessionClient, SessionOptions};
pub use observability::init_tracing;
pub use output::CommandWriter;
pub use plugins::{RwsInput, RwsOutput};
pub use subscription::{
    stream_endpoint, EventStream, StreamExit, StreamOptions, StreamState, SubscriptionNegotiator,
};
