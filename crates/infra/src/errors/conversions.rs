//! Conversions from external infrastructure errors into domain errors.

use std::time::Duration;

use reqwest::Error as HttpError;
use rws_bridge_domain::{ConnectError, TransportError};
use tokio_tungstenite::tungstenite::Error as WsError;

/// Extension trait keeping the conversion logic on the infrastructure side.
pub(crate) trait IntoTransportError {
    /// `timeout` is the bound that applied to the failed exchange, if any.
    fn into_transport(self, timeout: Option<Duration>) -> TransportError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportError */
/* -------------------------------------------------------------------------- */

impl IntoTransportError for HttpError {
    fn into_transport(self, timeout: Option<Duration>) -> TransportError {
        if self.is_timeout() {
            return TransportError::Timeout(timeout.unwrap_or_default());
        }

        if self.is_builder() {
            return TransportError::InvalidUrl(self.to_string());
        }

        if self.is_body() || self.is_decode() {
            return TransportError::Body(self.to_string());
        }

        if self.is_connect() {
            return TransportError::Network(format!("HTTP connection failure: {self}"));
        }

        TransportError::Network(self.to_string())
    }
}

/* -------------------------------------------------------------------------- */
/* tungstenite::Error → ConnectError */
/* -------------------------------------------------------------------------- */

pub(crate) fn handshake_error(err: WsError) -> ConnectError {
    match err {
        WsError::Http(response) => ConnectError::UnexpectedStatus(response.status().as_u16()),
        WsError::Tls(tls) => ConnectError::Tls(tls.to_string()),
        WsError::Url(url) => ConnectError::InvalidEndpoint(url.to_string()),
        other => ConnectError::Handshake(other.to_string()),
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
