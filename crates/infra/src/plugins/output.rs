//! Output plugin: records to controller commands

use std::sync::Arc;

use rws_bridge_core::{AttemptPolicy, CredentialProvider, StaticCredentials};
use rws_bridge_domain::{Record, RwsConfig, RwsError, WriteError};
use tracing::{debug, instrument};

use crate::output::CommandWriter;

pub struct RwsOutput {
    writer: CommandWriter,
}

impl RwsOutput {
    pub fn new(
        config: RwsConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, RwsError> {
        Ok(Self { writer: CommandWriter::new(config, credentials)? })
    }

    /// Use the username and password from the configuration.
    pub fn from_config(config: RwsConfig) -> Result<Self, RwsError> {
        let credentials =
            StaticCredentials::new(config.username.clone(), config.password.clone());
        Self::new(config, Arc::new(credentials))
    }

    pub fn with_policy(self, policy: Arc<dyn AttemptPolicy>) -> Self {
        Self { writer: self.writer.with_policy(policy) }
    }

    pub async fn connect(&mut self) -> Result<(), RwsError> {
        self.writer.connect().await
    }

    /// Write one batch of records.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn write(&self, records: &[Record]) -> Result<(), WriteError> {
        if records.is_empty() {
            debug!("Empty batch");
            return Ok(());
        }
        self.writer.write_batch(records).await
    }

    pub fn close(&mut self) {
        self.writer.close();
    }

    pub fn writer(&self) -> &CommandWriter {
        &self.writer
    }
}
