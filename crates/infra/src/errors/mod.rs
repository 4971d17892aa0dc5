//! Infrastructure error mapping

pub(crate) mod conversions;

pub(crate) use conversions::{handshake_error, IntoTransportError};
