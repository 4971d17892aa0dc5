//! Domain types and models

pub mod command;
pub mod event;
pub mod record;
pub mod secret;
pub mod subscription;

pub use command::{ControllerInstruction, OutboundCommand, Severity};
pub use event::{DecodedEvent, EventField, EventKind};
pub use record::{FieldValue, Record};
pub use secret::Secret;
pub use subscription::{SubscriptionEntry, SubscriptionHandle, SubscriptionRequest};
