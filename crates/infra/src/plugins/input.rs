//! Input plugin: login, negotiate, stream

use std::sync::Arc;

use rws_bridge_core::{CredentialProvider, RecordSink, StaticCredentials};
use rws_bridge_domain::{ConnectError, RwsConfig, RwsError, SubscriptionRequest};
use tracing::{info, instrument};

use crate::http::SessionClient;
use crate::subscription::{EventStream, StreamOptions, StreamState, SubscriptionNegotiator};

/// Subscribes to the configured resources and forwards their events as
/// records
pub struct RwsInput {
    config: RwsConfig,
    credentials: Arc<dyn CredentialProvider>,
    sink: Arc<dyn RecordSink>,
    session: Option<Arc<SessionClient>>,
    stream: Option<EventStream>,
}

impl RwsInput {
    /// # Errors
    /// `Config` for a missing host or an empty `inputs` list.
    pub fn new(
        config: RwsConfig,
        credentials: Arc<dyn CredentialProvider>,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self, RwsError> {
        config.validate()?;
        config.validate_input()?;
        Ok(Self { config, credentials, sink, session: None, stream: None })
    }

    /// Use the username and password from the configuration.
    pub fn from_config(config: RwsConfig, sink: Arc<dyn RecordSink>) -> Result<Self, RwsError> {
        let credentials =
            StaticCredentials::new(config.username.clone(), config.password.clone());
        Self::new(config, Arc::new(credentials), sink)
    }

    /// Log in, register the subscription and start streaming.
    ///
    /// A stopped plugin may be started again; a running one may not.
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub async fn start(&mut self) -> Result<(), RwsError> {
        if let Some(stream) = &self.stream {
            if stream.state() != StreamState::Closed {
                return Err(ConnectError::AlreadyConnected.into());
            }
        }

        let request = SubscriptionRequest::new(self.config.inputs.clone())?;
        let session =
            Arc::new(SessionClient::login(&self.config, self.credentials.as_ref()).await?);

        let handle = SubscriptionNegotiator::new(Arc::clone(&session))
            .with_queue_limits(self.config.queue_size, self.config.queue_max_msg_size)
            .subscribe(&request)
            .await?;

        let stream =
            EventStream::new(StreamOptions::from_config(&self.config), Arc::clone(&self.sink));
        if let Err(err) = stream.connect(&handle, Arc::clone(&session)).await {
            session.close();
            return Err(err.into());
        }

        self.session = Some(session);
        self.stream = Some(stream);
        info!(resources = request.len(), "Input started");
        Ok(())
    }

    /// Stop the stream and end the session. Safe to call repeatedly.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) {
        if let Some(stream) = &self.stream {
            stream.stop().await;
        }
        if let Some(session) = self.session.take() {
            session.close();
            info!("Input stopped");
        }
    }

    pub fn stream(&self) -> Option<&EventStream> {
        self.stream.as_ref()
    }
}
