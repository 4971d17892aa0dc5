//! Wire codec for the controller's event and command encodings
//!
//! Stateless; safe to call from any task.

pub mod decode;
pub mod encode;

pub use decode::{decode_event, decode_events};
pub use encode::{encode_checked, encode_command, encode_queue_creation, encode_subscription};
