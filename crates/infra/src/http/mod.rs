//! HTTP session with the controller

pub mod session;

pub use session::{SessionClient, SessionOptions};
