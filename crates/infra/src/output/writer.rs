//! Command writer for the output side
//!
//! Turns records into DIPC commands and posts them to the configured queue.
//! A record is size-checked after encoding, before anything touches the
//! network; the attempt policy is asked once per write call.

use std::sync::Arc;

use rws_bridge_core::codec::encode_checked;
use rws_bridge_core::{AttemptCeiling, AttemptPolicy, CommandEncoder, CredentialProvider};
use rws_bridge_domain::constants::DIPC_SEND_ACTION;
use rws_bridge_domain::{NegotiationError, OutputConfig, Record, RwsConfig, RwsError, WriteError};
use tracing::{debug, info, instrument, warn};

use crate::http::SessionClient;

pub struct CommandWriter {
    config: RwsConfig,
    output: OutputConfig,
    encoder: CommandEncoder,
    policy: Arc<dyn AttemptPolicy>,
    credentials: Arc<dyn CredentialProvider>,
    session: Option<SessionClient>,
}

impl CommandWriter {
    /// # Errors
    /// `Config` when the output section is missing or invalid.
    pub fn new(
        config: RwsConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, RwsError> {
        config.validate()?;
        let output = config.validate_output()?.clone();
        let encoder = CommandEncoder::new(output.sender.clone(), config.rob_id)
            .with_prefixes(output.tag_prefix.clone(), output.field_prefix.clone());

        Ok(Self {
            config,
            output,
            encoder,
            policy: Arc::new(AttemptCeiling::default()),
            credentials,
            session: None,
        })
    }

    /// Replace the default attempt ceiling.
    pub fn with_policy(mut self, policy: Arc<dyn AttemptPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Log in and check that the target queue exists.
    #[instrument(skip(self), fields(target = %self.output.target))]
    pub async fn connect(&mut self) -> Result<(), RwsError> {
        let session = SessionClient::login(&self.config, self.credentials.as_ref()).await?;

        let exists = session.resource_exists(&self.output.target).await.map_err(|source| {
            NegotiationError::Lookup { path: self.output.target.clone(), source }
        })?;
        if !exists {
            session.close();
            return Err(NegotiationError::UnknownResource(self.output.target.clone()).into());
        }

        self.policy.reset();
        if let Some(previous) = self.session.replace(session) {
            previous.close();
        }
        info!("Command writer connected");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub async fn write(&self, record: &Record) -> Result<(), WriteError> {
        self.write_batch(std::slice::from_ref(record)).await
    }

    /// Send every record of the batch in order.
    ///
    /// A batch refused by the attempt policy returns `Ok` with nothing sent.
    /// Otherwise the first failure ends the batch and is returned.
    pub async fn write_batch(&self, records: &[Record]) -> Result<(), WriteError> {
        if !self.policy.should_attempt() {
            return Ok(());
        }

        let mut result = Ok(());
        for record in records {
            if let Err(err) = self.dispatch(record).await {
                warn!(error = %err, category = ?err.category(), "Write failed");
                result = Err(err);
                break;
            }
        }

        self.policy.record_outcome(result.is_ok());
        result
    }

    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
            info!("Command writer closed");
        }
    }

    async fn dispatch(&self, record: &Record) -> Result<(), WriteError> {
        let Some(command) = self.encoder.build(record)? else {
            debug!(name = %record.name, "Record produces no command");
            return Ok(());
        };
        let body = encode_checked(&command, self.output.msg_size)?;

        let session = self.session.as_ref().ok_or(WriteError::NotConnected)?;
        let path = format!("{}{DIPC_SEND_ACTION}", self.output.target);
        debug!(path = %path, bytes = body.len(), "Sending command");

        let response = session.post_form(&path, body).await?;
        let status = response.status();
        if status.as_u16() >= 300 {
            return Err(WriteError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

impl Drop for CommandWriter {
    fn drop(&mut self) {
        self.close();
    }
}
