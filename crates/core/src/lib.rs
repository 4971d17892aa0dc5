//! # rws-bridge Core
//!
//! Protocol logic without network I/O.
//!
//! This crate contains:
//! - Wire codec for event documents and command forms
//! - Record to command mapping
//! - Port interfaces (record sinks, credential providers)
//! - Write attempt policies
//!
//! ## Architecture Principles
//! - Only depends on `rws-bridge-domain`
//! - No HTTP or WebSocket code
//! - All external dependencies via traits

pub mod attempt;
pub mod clock;
pub mod codec;
pub mod command;
pub mod credentials;
pub mod ports;

pub use attempt::{AttemptCeiling, AttemptPolicy, ExponentialBackoff};
pub use clock::{Clock, MockClock, SystemClock};
pub use command::CommandEncoder;
pub use credentials::{EnvCredentials, StaticCredentials};
pub use ports::{CredentialProvider, Credentials, MemorySink, RecordSink, SinkClosed};
