//! Subscription negotiation
//!
//! Makes sure every subscribed resource exists (creating missing DIPC
//! queues), registers the subscription and resolves the stream endpoint
//! from the response's `Location`.

use std::sync::Arc;

use reqwest::header::LOCATION;
use reqwest::StatusCode;
use rws_bridge_core::codec::encode_subscription;
use rws_bridge_domain::constants::{DEFAULT_QUEUE_MAX_MSG_SIZE, DEFAULT_QUEUE_SIZE, SUBSCRIPTION_PATH};
use rws_bridge_domain::{NegotiationError, SubscriptionHandle, SubscriptionRequest};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::http::SessionClient;

/// Registers subscriptions on an authenticated session
pub struct SubscriptionNegotiator {
    session: Arc<SessionClient>,
    queue_size: u32,
    queue_max_msg_size: u32,
}

impl SubscriptionNegotiator {
    pub fn new(session: Arc<SessionClient>) -> Self {
        Self {
            session,
            queue_size: DEFAULT_QUEUE_SIZE,
            queue_max_msg_size: DEFAULT_QUEUE_MAX_MSG_SIZE,
        }
    }

    /// Size and message limit used when a subscribed queue has to be created
    pub fn with_queue_limits(mut self, size: u32, max_msg_size: u32) -> Self {
        self.queue_size = size;
        self.queue_max_msg_size = max_msg_size;
        self
    }

    /// Prepare resources and register the subscription.
    ///
    /// Nothing is returned unless every step succeeded. The registration
    /// must answer with a redirect or `201 Created` carrying `Location`;
    /// controllers answer either way. Any other status, `200 OK` included,
    /// is `UnexpectedStatus`.
    #[instrument(skip(self, request), fields(resources = request.len()))]
    pub async fn subscribe(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<SubscriptionHandle, NegotiationError> {
        for entry in request.entries() {
            let exists = self.session.resource_exists(&entry.target).await.map_err(|source| {
                NegotiationError::Lookup { path: entry.target.clone(), source }
            })?;
            if exists {
                continue;
            }

            let Some(name) = entry.queue_name() else {
                return Err(NegotiationError::UnknownResource(entry.target.clone()));
            };

            info!(queue = name, "Creating missing queue");
            let status = self
                .session
                .create_resource(name, self.queue_size, self.queue_max_msg_size)
                .await
                .map_err(|e| NegotiationError::CreateFailed {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;
            if !status.is_success() {
                return Err(NegotiationError::CreateFailed {
                    name: name.to_string(),
                    reason: format!("status {status}"),
                });
            }
        }

        let body = encode_subscription(request);
        debug!(body = %body, "Registering subscription");

        let response = self.session.post_form(SUBSCRIPTION_PATH, body).await?;
        let status = response.status();
        if !(status.is_redirection() || status == StatusCode::CREATED) {
            warn!(%status, "Subscription rejected");
            return Err(NegotiationError::UnexpectedStatus(status.as_u16()));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(NegotiationError::MissingLocation)?;

        let endpoint = stream_endpoint(self.session.base_url(), location)?;
        info!(endpoint = %endpoint, "Subscription registered");
        Ok(SubscriptionHandle::new(endpoint))
    }
}

/// Resolve `location` against the base URL and map http(s) to ws(s).
pub fn stream_endpoint(base: &Url, location: &str) -> Result<String, NegotiationError> {
    let mut url = base
        .join(location)
        .map_err(|e| NegotiationError::InvalidLocation(format!("{location}: {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(NegotiationError::InvalidLocation(format!(
                "unsupported scheme {other} in {location}"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| NegotiationError::InvalidLocation(location.to_string()))?;
    Ok(url.to_string())
}
