//! Subscription types
//!
//! A subscription request is an ordered list of resource paths with their
//! priorities. Positions are significant: the wire encoding pairs resource
//! `i` with priority `i`, so entries are never reordered or deduplicated.

use serde::{Deserialize, Serialize};

use crate::constants::DIPC_ROOT;
use crate::errors::NegotiationError;

/// One subscribed resource (the `inputs` entries of the configuration)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionEntry {
    /// Resource path, e.g. `/rw/elog/0`
    pub target: String,
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_priority() -> u32 {
    1
}

impl SubscriptionEntry {
    pub fn new(target: impl Into<String>, priority: u32) -> Self {
        Self { target: target.into(), priority }
    }

    /// Queue name when the target is a DIPC queue (`/rw/dipc/<name>`).
    pub fn queue_name(&self) -> Option<&str> {
        self.target.strip_prefix(DIPC_ROOT).filter(|name| !name.is_empty())
    }
}

/// Immutable, non-empty subscription request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    entries: Vec<SubscriptionEntry>,
}

impl SubscriptionRequest {
    /// Build a request, rejecting an empty entry list.
    pub fn new(entries: Vec<SubscriptionEntry>) -> Result<Self, NegotiationError> {
        if entries.is_empty() {
            return Err(NegotiationError::EmptyRequest);
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[SubscriptionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Stream endpoint returned by the subscription response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    endpoint: String,
}

impl SubscriptionHandle {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.endpoint)
    }
}
