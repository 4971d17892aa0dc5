//! Tracing subscriber setup
//!
//! Host applications with their own subscriber skip this; the crates only
//! emit `tracing` events.

use std::sync::OnceLock;

use rws_bridge_domain::RwsError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when neither an explicit directive nor `RUST_LOG` is set
pub const DEFAULT_FILTER: &str = "info";

static INIT: OnceLock<()> = OnceLock::new();

/// Install a global fmt subscriber.
///
/// `filter` overrides `RUST_LOG`. With `json` set, events are written as one
/// JSON object per line. Only the first call installs anything.
///
/// # Errors
/// `Config` for an invalid filter directive or when another global
/// subscriber is already installed.
pub fn init_tracing(filter: Option<&str>, json: bool) -> Result<(), RwsError> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let env_filter = match filter {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|e| RwsError::Config(format!("invalid log filter {directives:?}: {e}")))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if json {
        registry.with(fmt::layer().json().with_current_span(false)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    installed.map_err(|e| RwsError::Config(format!("tracing already initialised: {e}")))?;

    let _ = INIT.set(());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_directive_is_rejected() {
        let err = init_tracing(Some("rws_bridge_infra=bogus"), false).unwrap_err();
        assert!(matches!(err, RwsError::Config(_)));
    }
}
