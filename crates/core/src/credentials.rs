//! Credential providers

use async_trait::async_trait;
use rws_bridge_domain::{AuthError, Secret};

use crate::ports::{CredentialProvider, Credentials};

/// Default environment variable holding the username
pub const USERNAME_VAR: &str = "RWS_BRIDGE_USERNAME";
/// Default environment variable holding the password
pub const PASSWORD_VAR: &str = "RWS_BRIDGE_PASSWORD";

/// Fixed credentials, typically taken from the configuration file
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    username: Secret,
    password: Secret,
}

impl StaticCredentials {
    pub fn new(username: Secret, password: Secret) -> Self {
        Self { username, password }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credentials(&self) -> Result<Credentials, AuthError> {
        if self.username.is_empty() {
            return Err(AuthError::Credentials("username is empty".to_string()));
        }
        Ok(Credentials { username: self.username.clone(), password: self.password.clone() })
    }
}

/// Credentials read from environment variables on every login
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    username_var: String,
    password_var: String,
}

impl EnvCredentials {
    pub fn new(username_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Self { username_var: username_var.into(), password_var: password_var.into() }
    }

    fn read(name: &str) -> Result<Secret, AuthError> {
        std::env::var(name)
            .map(Secret::new)
            .map_err(|_| AuthError::Credentials(format!("environment variable {name} is not set")))
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new(USERNAME_VAR, PASSWORD_VAR)
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentials {
    async fn credentials(&self) -> Result<Credentials, AuthError> {
        Ok(Credentials {
            username: Self::read(&self.username_var)?,
            password: Self::read(&self.password_var)?,
        })
    }
}
