//! Configuration management

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_QUEUE_MAX_MSG_SIZE, DEFAULT_QUEUE_SIZE};
use crate::errors::{Result, RwsError};
use crate::types::{Secret, SubscriptionEntry};

/// Bridge configuration shared by the input and output plugins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RwsConfig {
    /// Controller base URL, e.g. `http://10.209.3.22:80`
    pub host: String,
    #[serde(default)]
    pub rob_id: i64,
    #[serde(default)]
    pub username: Secret,
    #[serde(default)]
    pub password: Secret,

    /// Zero or absent disables the bound.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,
    #[serde(default)]
    pub write_timeout_ms: Option<u64>,

    /// Extra headers sent with the stream upgrade
    #[serde(default)]
    pub headers: BTreeMap<String, Secret>,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub insecure_skip_verify: bool,

    #[serde(default)]
    pub inputs: Vec<SubscriptionEntry>,
    #[serde(default = "default_queue_size")]
    pub queue_size: u32,
    #[serde(default = "default_queue_max_msg_size")]
    pub queue_max_msg_size: u32,

    #[serde(default)]
    pub output: Option<OutputConfig>,
}

/// Output plugin section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination queue path, e.g. `/rw/dipc/RMQ_T_ROB1`
    pub target: String,
    /// Source queue name written into every command
    pub sender: String,
    /// Byte limit of one encoded command
    pub msg_size: usize,
    #[serde(default)]
    pub tag_prefix: String,
    #[serde(default)]
    pub field_prefix: String,
}

fn default_queue_size() -> u32 {
    DEFAULT_QUEUE_SIZE
}

fn default_queue_max_msg_size() -> u32 {
    DEFAULT_QUEUE_MAX_MSG_SIZE
}

fn millis(value: Option<u64>) -> Option<Duration> {
    value.filter(|ms| *ms > 0).map(Duration::from_millis)
}

impl RwsConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            rob_id: 0,
            username: Secret::default(),
            password: Secret::default(),
            connect_timeout_ms: None,
            read_timeout_ms: None,
            write_timeout_ms: None,
            headers: BTreeMap::new(),
            proxy_url: None,
            insecure_skip_verify: false,
            inputs: Vec::new(),
            queue_size: DEFAULT_QUEUE_SIZE,
            queue_max_msg_size: DEFAULT_QUEUE_MAX_MSG_SIZE,
            output: None,
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        millis(self.write_timeout_ms)
    }

    /// Host with any trailing slash removed, ready for path concatenation.
    pub fn base_url(&self) -> &str {
        self.host.trim_end_matches('/')
    }

    /// Checks shared by both plugins.
    ///
    /// # Errors
    /// Returns `RwsError::Config` when the host is empty or not http(s).
    pub fn validate(&self) -> Result<()> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(RwsError::Config("host must not be empty".to_string()));
        }
        if !(host.starts_with("http://") || host.starts_with("https://")) {
            return Err(RwsError::Config(format!("host must be an http(s) URL: {host}")));
        }
        Ok(())
    }

    /// Checks for the input plugin.
    pub fn validate_input(&self) -> Result<()> {
        self.validate()?;
        if self.inputs.is_empty() {
            return Err(RwsError::Config("inputs must not be empty".to_string()));
        }
        if let Some(entry) = self.inputs.iter().find(|entry| entry.target.trim().is_empty()) {
            return Err(RwsError::Config(format!(
                "input target must not be empty (priority {})",
                entry.priority
            )));
        }
        Ok(())
    }

    /// Checks for the output plugin; returns the output section.
    pub fn validate_output(&self) -> Result<&OutputConfig> {
        self.validate()?;
        let output = self
            .output
            .as_ref()
            .ok_or_else(|| RwsError::Config("output section is missing".to_string()))?;
        if output.target.trim().is_empty() {
            return Err(RwsError::Config("output target must not be empty".to_string()));
        }
        if output.msg_size == 0 {
            return Err(RwsError::Config("output msg_size must be positive".to_string()));
        }
        Ok(output)
    }
}
