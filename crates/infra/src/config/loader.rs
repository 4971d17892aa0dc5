//! Configuration loader
//!
//! Loads the bridge configuration from a TOML or JSON file, optionally
//! overlaid with environment variables.
//!
//! ## Environment Variables
//! - `RWS_BRIDGE_HOST`: Controller base URL
//! - `RWS_BRIDGE_USERNAME`: Login username
//! - `RWS_BRIDGE_PASSWORD`: Login password
//! - `RWS_BRIDGE_INSECURE_SKIP_VERIFY`: Skip TLS verification (true/false)
//!
//! ## File Locations
//! When no path is given the loader probes, in order:
//! 1. `./rws-bridge.toml`, `./rws-bridge.json`, `./config.toml`,
//!    `./config.json` (current working directory)
//! 2. The same names next to the executable

use std::path::{Path, PathBuf};

use rws_bridge_domain::{Result, RwsConfig, RwsError, Secret};
use url::Url;

const CONFIG_NAMES: [&str; 4] = ["rws-bridge.toml", "rws-bridge.json", "config.toml", "config.json"];

/// Load and validate configuration from a file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `RwsError::Config` if:
/// - The file is missing or unreadable
/// - The format is unsupported or invalid
/// - Validation fails (empty or unparseable host, invalid output section)
pub fn load_from_file(path: Option<PathBuf>) -> Result<RwsConfig> {
    let config = read_config(path)?;
    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file, then apply `RWS_BRIDGE_*` overrides
pub fn load_with_env(path: Option<PathBuf>) -> Result<RwsConfig> {
    let mut config = read_config(path)?;
    apply_env_overrides(&mut config);
    validate(&config)?;
    Ok(config)
}

fn read_config(path: Option<PathBuf>) -> Result<RwsConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(RwsError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            RwsError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| RwsError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
pub fn parse_config(contents: &str, path: &Path) -> Result<RwsConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| RwsError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| RwsError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(RwsError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Shared checks plus URL parsing and, when present, the output section.
pub fn validate(config: &RwsConfig) -> Result<()> {
    config.validate()?;
    Url::parse(config.base_url())
        .map_err(|e| RwsError::Config(format!("Invalid host URL {}: {e}", config.host)))?;
    if let Some(proxy) = &config.proxy_url {
        Url::parse(proxy).map_err(|e| RwsError::Config(format!("Invalid proxy URL: {e}")))?;
    }
    if config.output.is_some() {
        config.validate_output()?;
    }
    Ok(())
}

fn apply_env_overrides(config: &mut RwsConfig) {
    if let Ok(host) = std::env::var("RWS_BRIDGE_HOST") {
        tracing::debug!("Host overridden from environment");
        config.host = host;
    }
    if let Ok(username) = std::env::var("RWS_BRIDGE_USERNAME") {
        config.username = Secret::new(username);
    }
    if let Ok(password) = std::env::var("RWS_BRIDGE_PASSWORD") {
        config.password = Secret::new(password);
    }
    config.insecure_skip_verify =
        env_bool("RWS_BRIDGE_INSECURE_SKIP_VERIFY", config.insecure_skip_verify);
}

/// First existing config file among the standard locations
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(CONFIG_NAMES.iter().map(|name| cwd.join(name)));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(CONFIG_NAMES.iter().map(|name| exe_dir.join(name)));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "host": "https://robot.local",
            "rob_id": 2,
            "inputs": [{"target": "/rw/elog/0", "priority": 0}]
        }"#;
        let config = parse_config(json, Path::new("bridge.json")).unwrap();
        assert_eq!(config.rob_id, 2);
        assert_eq!(config.inputs[0].priority, 0);
        validate(&config).unwrap();
    }

    #[test]
    fn test_unsupported_extension() {
        let err = parse_config("host = 'x'", Path::new("bridge.yaml")).unwrap_err();
        assert!(matches!(err, RwsError::Config(msg) if msg.contains("yaml")));
    }

    #[test]
    fn test_invalid_toml() {
        let err = parse_config("host = ", Path::new("bridge.toml")).unwrap_err();
        assert!(matches!(err, RwsError::Config(msg) if msg.contains("TOML")));
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let config = RwsConfig::new("http://");
        assert!(validate(&config).is_err());

        let mut config = RwsConfig::new("http://robot");
        config.proxy_url = Some("not a url".into());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_env_bool() {
        std::env::set_var("RWS_BRIDGE_TEST_BOOL", "Yes");
        assert!(env_bool("RWS_BRIDGE_TEST_BOOL", false));
        std::env::set_var("RWS_BRIDGE_TEST_BOOL", "off");
        assert!(!env_bool("RWS_BRIDGE_TEST_BOOL", true));
        assert!(env_bool("RWS_BRIDGE_TEST_BOOL_UNSET", true));
    }
}
