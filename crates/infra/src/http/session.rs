//! Authenticated controller session
//!
//! One reqwest client and one cookie jar per session. Login runs a digest
//! challenge/response against `/rw`; the session cookie it yields is then
//! carried by every later request, including the stream upgrade.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, StatusCode};
use rws_bridge_core::codec::encode_queue_creation;
use rws_bridge_core::CredentialProvider;
use rws_bridge_domain::constants::{DIPC_CREATE_PATH, FORM_CONTENT_TYPE, LOGIN_PATH};
use rws_bridge_domain::{AuthError, RwsConfig, TransportError};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::errors::IntoTransportError;

/// Session-level HTTP settings
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub connect_timeout: Option<Duration>,
    /// Bound on each whole request/response exchange
    pub request_timeout: Option<Duration>,
    pub proxy_url: Option<String>,
    pub accept_invalid_certs: bool,
}

impl SessionOptions {
    pub fn from_config(config: &RwsConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            request_timeout: config.read_timeout(),
            proxy_url: config.proxy_url.clone(),
            accept_invalid_certs: config.insecure_skip_verify,
        }
    }
}

/// HTTP session against one controller
#[derive(Debug)]
pub struct SessionClient {
    base: String,
    base_url: Url,
    jar: Arc<Jar>,
    client: RwLock<Option<ReqwestClient>>,
    timeout: Option<Duration>,
}

impl SessionClient {
    /// Build an unauthenticated session.
    ///
    /// # Errors
    /// `InvalidUrl` for an unparseable base or proxy URL.
    pub fn new(base: &str, options: SessionOptions) -> Result<Self, TransportError> {
        let base = base.trim_end_matches('/').to_string();
        let base_url =
            Url::parse(&base).map_err(|e| TransportError::InvalidUrl(format!("{base}: {e}")))?;
        let jar = Arc::new(Jar::default());

        let mut builder = ReqwestClient::builder()
            .cookie_provider(Arc::clone(&jar))
            .redirect(reqwest::redirect::Policy::none());

        if let Some(timeout) = options.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder = match &options.proxy_url {
            Some(proxy) => builder.proxy(
                reqwest::Proxy::all(proxy.as_str())
                    .map_err(|e| TransportError::InvalidUrl(format!("proxy {proxy}: {e}")))?,
            ),
            None => builder.no_proxy(),
        };
        if options.accept_invalid_certs {
            warn!("TLS certificate verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| e.into_transport(None))?;

        Ok(Self {
            base,
            base_url,
            jar,
            client: RwLock::new(Some(client)),
            timeout: options.request_timeout,
        })
    }

    /// Build a session from the configuration and log in.
    pub async fn login(
        config: &RwsConfig,
        credentials: &dyn CredentialProvider,
    ) -> Result<Self, AuthError> {
        let session = Self::new(config.base_url(), SessionOptions::from_config(config))?;
        session.authenticate(credentials).await?;
        Ok(session)
    }

    /// Run the digest login exchange, storing the session cookie.
    ///
    /// An unauthenticated attempt is sent first; a `401` carrying a digest
    /// challenge is answered once.
    #[instrument(skip(self, credentials), fields(base = %self.base))]
    pub async fn authenticate(&self, credentials: &dyn CredentialProvider) -> Result<(), AuthError> {
        let creds = credentials.credentials().await?;
        let url = self.url(LOGIN_PATH)?;
        let client = self.client()?;

        let first = self.execute(client.get(url.clone())).await?;
        let status = first.status();
        if status.is_success() {
            info!("Controller accepted session without challenge");
            return Ok(());
        }
        if status != StatusCode::UNAUTHORIZED {
            return Err(AuthError::Rejected(status.as_u16()));
        }

        let challenge = first
            .headers()
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| value.trim_start().to_ascii_lowercase().starts_with("digest"))
            .ok_or_else(|| AuthError::Challenge("no digest challenge in 401 response".to_string()))?;

        let mut prompt =
            digest_auth::parse(challenge).map_err(|e| AuthError::Challenge(e.to_string()))?;
        let uri = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };
        let authorization = {
            let context = digest_auth::AuthContext::new(
                creds.username.expose(),
                creds.password.expose(),
                uri,
            );
            prompt
                .respond(&context)
                .map_err(|e| AuthError::Challenge(e.to_string()))?
                .to_header_string()
        };
        drop(creds);

        let response = self.execute(client.get(url).header(AUTHORIZATION, authorization)).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected(status.as_u16()));
        }

        info!(cookies = self.cookie_header().is_some(), "Logged in to controller");
        Ok(())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET <base><path>`; a status of 299 or below means the resource exists.
    #[instrument(skip(self))]
    pub async fn resource_exists(&self, path: &str) -> Result<bool, TransportError> {
        let response = self.request(Method::GET, path, None).await?;
        let status = response.status();
        debug!(%status, "Resource lookup");
        Ok(status.as_u16() <= 299)
    }

    /// Create a DIPC queue. The server status is returned unchanged.
    #[instrument(skip(self))]
    pub async fn create_resource(
        &self,
        name: &str,
        size: u32,
        max_message_bytes: u32,
    ) -> Result<StatusCode, TransportError> {
        let body = encode_queue_creation(name, size, max_message_bytes);
        let response = self.post_form(DIPC_CREATE_PATH, body).await?;
        Ok(response.status())
    }

    /// Single exchange reusing the session cookies. Never retried.
    ///
    /// `path` is appended to the base URL unless it is an absolute URL.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<Response, TransportError> {
        let url = self.url(path)?;
        let mut builder = self.client()?.request(method, url);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        self.execute(builder).await
    }

    /// POST a form-encoded body.
    pub async fn post_form(&self, path: &str, body: String) -> Result<Response, TransportError> {
        let url = self.url(path)?;
        let builder = self.client()?.post(url).header(CONTENT_TYPE, FORM_CONTENT_TYPE).body(body);
        self.execute(builder).await
    }

    /// Cookie header for the base URL, as sent on plain requests.
    pub fn cookie_header(&self) -> Option<String> {
        self.jar
            .cookies(&self.base_url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    /// Drop the client and its pooled connections. Later requests fail.
    pub fn close(&self) {
        if self.client.write().take().is_some() {
            debug!(base = %self.base, "Session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.client.read().is_none()
    }

    fn client(&self) -> Result<ReqwestClient, TransportError> {
        self.client
            .read()
            .clone()
            .ok_or_else(|| TransportError::Network("session is closed".to_string()))
    }

    fn url(&self, path: &str) -> Result<Url, TransportError> {
        let raw = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{path}", self.base)
        };
        Url::parse(&raw).map_err(|e| TransportError::InvalidUrl(format!("{raw}: {e}")))
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response, TransportError> {
        builder.send().await.map_err(|e| e.into_transport(self.timeout))
    }
}
