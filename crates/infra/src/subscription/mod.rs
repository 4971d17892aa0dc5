//! Subscription negotiation and the resulting event stream

pub mod negotiator;
pub mod stream;
pub(crate) mod tunnel;

pub use negotiator::{stream_endpoint, SubscriptionNegotiator};
pub use stream::{EventStream, StreamExit, StreamOptions, StreamState};
