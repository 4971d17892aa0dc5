//! Event stream over the subscription WebSocket
//!
//! `Idle → Connecting → Streaming → Closed`, never back to `Connecting`.
//! After a successful upgrade the read loop runs as its own task and pushes
//! records into the configured [`RecordSink`]. There is no reconnection; a
//! closed stream stays closed.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use reqwest::Method;
use rws_bridge_core::codec::{decode_event, decode_events};
use rws_bridge_core::RecordSink;
use rws_bridge_domain::constants::{RECORD_NAME_PREFIX, SUBSCRIPTION_SUBPROTOCOL};
use rws_bridge_domain::{
    ConnectError, DecodedEvent, EventKind, Record, RwsConfig, Secret, SubscriptionHandle,
};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{COOKIE, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{client_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::tunnel::connect_via_proxy;
use crate::errors::handshake_error;
use crate::http::SessionClient;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Bound on the closing handshake when no write timeout is configured
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle state of an [`EventStream`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Connecting,
    Streaming,
    Closed,
}

/// Why the read loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamExit {
    /// `stop()` was called
    Stopped,
    /// Peer closed normally, went away, or dropped the connection
    Closed { code: Option<u16> },
    /// Peer closed with any other code
    UnexpectedClose { code: u16, reason: String },
    /// Read error, read timeout, failed detail fetch or closed sink
    Failed(String),
}

impl StreamExit {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::UnexpectedClose { .. } | Self::Failed(_))
    }
}

/// Transport settings for the stream
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub robot_id: i64,
    pub connect_timeout: Option<Duration>,
    /// Re-armed before every receive
    pub read_timeout: Option<Duration>,
    /// Bound on pong and close writes
    pub write_timeout: Option<Duration>,
    /// Extra upgrade headers
    pub headers: BTreeMap<String, Secret>,
    pub proxy_url: Option<String>,
    pub accept_invalid_certs: bool,
    /// How long `stop()` waits for the read loop before aborting it
    pub stop_timeout: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            robot_id: 0,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            headers: BTreeMap::new(),
            proxy_url: None,
            accept_invalid_certs: false,
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl StreamOptions {
    pub fn from_config(config: &RwsConfig) -> Self {
        Self {
            robot_id: config.rob_id,
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
            headers: config.headers.clone(),
            proxy_url: config.proxy_url.clone(),
            accept_invalid_certs: config.insecure_skip_verify,
            ..Self::default()
        }
    }
}

/// Push-notification stream of one subscription
pub struct EventStream {
    options: StreamOptions,
    sink: Arc<dyn RecordSink>,
    state: Arc<Mutex<StreamState>>,
    cancel: CancellationToken,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    exit: Arc<watch::Sender<Option<StreamExit>>>,
}

impl EventStream {
    pub fn new(options: StreamOptions, sink: Arc<dyn RecordSink>) -> Self {
        let (exit, _) = watch::channel(None);
        Self {
            options,
            sink,
            state: Arc::new(Mutex::new(StreamState::Idle)),
            cancel: CancellationToken::new(),
            task: tokio::sync::Mutex::new(None),
            exit: Arc::new(exit),
        }
    }

    pub fn state(&self) -> StreamState {
        *self.state.lock()
    }

    /// Upgrade to the stream endpoint and start the read loop.
    ///
    /// # Errors
    /// `AlreadyConnected` unless the stream is `Idle`; otherwise any TLS,
    /// proxy, handshake or timeout failure. A failed connect leaves the
    /// stream `Closed`.
    #[instrument(skip(self, handle, session), fields(endpoint = %handle))]
    pub async fn connect(
        &self,
        handle: &SubscriptionHandle,
        session: Arc<SessionClient>,
    ) -> Result<(), ConnectError> {
        {
            let mut state = self.state.lock();
            if *state != StreamState::Idle {
                return Err(ConnectError::AlreadyConnected);
            }
            *state = StreamState::Connecting;
        }

        let opened = match self.options.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, self.open(handle, &session))
                .await
                .unwrap_or(Err(ConnectError::Timeout(limit))),
            None => self.open(handle, &session).await,
        };

        let mut ws = match opened {
            Ok(ws) => ws,
            Err(err) => {
                error!(error = %err, "Stream connection failed");
                *self.state.lock() = StreamState::Closed;
                publish_exit(&self.exit, StreamExit::Failed(err.to_string()));
                return Err(err);
            }
        };

        let mut task = self.task.lock().await;
        let stopped = {
            let mut state = self.state.lock();
            if self.cancel.is_cancelled() {
                true
            } else {
                *state = StreamState::Streaming;
                false
            }
        };
        if stopped {
            close_socket(&mut ws, self.options.write_timeout).await;
            return Err(ConnectError::Handshake("stream stopped while connecting".to_string()));
        }

        let reader = StreamReader {
            sink: Arc::clone(&self.sink),
            session,
            record_name: format!("{RECORD_NAME_PREFIX}{}", self.options.robot_id),
            read_timeout: self.options.read_timeout,
            write_timeout: self.options.write_timeout,
            cancel: self.cancel.clone(),
        };
        let state = Arc::clone(&self.state);
        let exit = Arc::clone(&self.exit);

        *task = Some(tokio::spawn(async move {
            let reason = reader.run(ws).await;
            match &reason {
                StreamExit::Stopped => debug!("Stream read loop stopped"),
                StreamExit::Closed { code } => info!(?code, "Stream closed by peer"),
                StreamExit::UnexpectedClose { code, reason } => {
                    error!(code, reason = %reason, "Stream closed unexpectedly")
                }
                StreamExit::Failed(message) => error!(error = %message, "Stream read loop failed"),
            }
            *state.lock() = StreamState::Closed;
            publish_exit(&exit, reason);
        }));

        info!("Event stream connected");
        Ok(())
    }

    /// Stop the read loop and close the socket.
    ///
    /// Idempotent and safe before `connect`. Returns once the read loop has
    /// exited (or been aborted after the stop timeout), so no record is
    /// emitted afterwards.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        self.cancel.cancel();

        let handle = self.task.lock().await.take();
        if let Some(mut handle) = handle {
            match tokio::time::timeout(self.options.stop_timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Stream task ended abnormally: {}", e),
                Err(_) => {
                    warn!("Stream task did not exit within timeout, aborting");
                    handle.abort();
                    let _ = handle.await;
                }
            }
        }

        *self.state.lock() = StreamState::Closed;
        publish_exit(&self.exit, StreamExit::Stopped);
    }

    /// Wait for the read loop to end and return why it ended.
    pub async fn wait(&self) -> StreamExit {
        let mut rx = self.exit.subscribe();
        let exit = match rx.wait_for(Option::is_some).await {
            Ok(exit) => exit.clone().unwrap_or(StreamExit::Stopped),
            Err(_) => StreamExit::Stopped,
        };
        exit
    }

    async fn open(
        &self,
        handle: &SubscriptionHandle,
        session: &SessionClient,
    ) -> Result<WsStream, ConnectError> {
        let url = Url::parse(handle.endpoint())
            .map_err(|e| ConnectError::InvalidEndpoint(format!("{handle}: {e}")))?;
        let secure = match url.scheme() {
            "ws" => false,
            "wss" => true,
            other => {
                return Err(ConnectError::InvalidEndpoint(format!("unsupported scheme {other}")))
            }
        };
        let host = url
            .host_str()
            .ok_or_else(|| ConnectError::InvalidEndpoint(format!("{handle}: no host")))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ConnectError::InvalidEndpoint(format!("{handle}: no port")))?;

        let request = self.upgrade_request(&url, session)?;

        let tcp = match &self.options.proxy_url {
            Some(proxy) => connect_via_proxy(proxy, &host, port).await?,
            None => TcpStream::connect((host.as_str(), port))
                .await
                .map_err(|e| ConnectError::Handshake(format!("connect {host}:{port}: {e}")))?,
        };

        let connector = if secure {
            let tls = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(self.options.accept_invalid_certs)
                .danger_accept_invalid_hostnames(self.options.accept_invalid_certs)
                .build()
                .map_err(|e| ConnectError::Tls(e.to_string()))?;
            Connector::NativeTls(tls)
        } else {
            Connector::Plain
        };

        let (ws, response) = client_async_tls_with_config(request, tcp, None, Some(connector))
            .await
            .map_err(handshake_error)?;

        debug!(
            status = %response.status(),
            protocol = ?response.headers().get(SEC_WEBSOCKET_PROTOCOL),
            "Stream upgrade complete"
        );
        Ok(ws)
    }

    fn upgrade_request(&self, url: &Url, session: &SessionClient) -> Result<Request, ConnectError> {
        let mut request = url.as_str().into_client_request().map_err(handshake_error)?;
        let headers = request.headers_mut();

        if let Some(cookie) = session.cookie_header() {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| ConnectError::Handshake(format!("invalid cookie header: {e}")))?;
            headers.insert(COOKIE, value);
        }

        for (name, secret) in &self.options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ConnectError::Handshake(format!("invalid header name {name}: {e}")))?;
            let mut value = HeaderValue::from_str(secret.expose())
                .map_err(|e| ConnectError::Handshake(format!("invalid value for {name}: {e}")))?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        headers.insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBSCRIPTION_SUBPROTOCOL));
        Ok(request)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn publish_exit(exit: &watch::Sender<Option<StreamExit>>, reason: StreamExit) {
    exit.send_if_modified(|current| {
        if current.is_some() {
            return false;
        }
        *current = Some(reason);
        true
    });
}

async fn close_socket(ws: &mut WsStream, write_timeout: Option<Duration>) {
    let limit = write_timeout.unwrap_or(DEFAULT_CLOSE_TIMEOUT);
    if let Ok(Err(err)) = tokio::time::timeout(limit, ws.close(None)).await {
        debug!(error = %err, "Close handshake failed");
    }
}

/// State owned by the read loop task
struct StreamReader {
    sink: Arc<dyn RecordSink>,
    session: Arc<SessionClient>,
    record_name: String,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl StreamReader {
    async fn run(&self, mut ws: WsStream) -> StreamExit {
        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                next = receive(&mut ws, self.read_timeout) => Some(next),
            };
            let Some(next) = next else {
                close_socket(&mut ws, self.write_timeout).await;
                return StreamExit::Stopped;
            };

            let message = match next {
                Ok(Some(Ok(message))) => message,
                Ok(Some(Err(err))) => return read_error_exit(err),
                Ok(None) => return StreamExit::Closed { code: None },
                Err(limit) => {
                    close_socket(&mut ws, self.write_timeout).await;
                    return StreamExit::Failed(format!("no message within {limit:?}"));
                }
            };

            let outcome = match message {
                Message::Text(text) => self.process_frame(text.as_bytes()).await,
                Message::Binary(data) => self.process_frame(&data).await,
                Message::Ping(payload) => self.pong(&mut ws, payload).await,
                Message::Pong(_) | Message::Frame(_) => Ok(()),
                Message::Close(frame) => return close_frame_exit(frame),
            };

            if let Err(exit) = outcome {
                close_socket(&mut ws, self.write_timeout).await;
                return exit;
            }
        }
    }

    /// Decode a frame and emit its records. Cancellation interrupts detail
    /// fetches.
    async fn process_frame(&self, frame: &[u8]) -> Result<(), StreamExit> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(StreamExit::Stopped),
            outcome = self.handle_frame(frame) => outcome,
        }
    }

    async fn handle_frame(&self, frame: &[u8]) -> Result<(), StreamExit> {
        let events = match decode_events(frame) {
            Ok(events) => events,
            Err(err) => {
                warn!(error = %err, "Dropping undecodable frame");
                return Ok(());
            }
        };

        for event in events {
            match event.event_kind() {
                EventKind::SignalState => {
                    info!(source = %event.source_ref, "Signal state changed");
                }
                EventKind::IpcMessage => {
                    debug!(source = %event.source_ref, "Queue message received");
                    self.emit(event.into_record(self.record_name.clone())).await?;
                }
                EventKind::LogMessage => {
                    let detail =
                        self.fetch_detail(&event.source_ref).await.map_err(StreamExit::Failed)?;
                    let name = detail.kind.clone();
                    info!(kind = %name, source = %detail.source_ref, "Event log message received");
                    self.emit(detail.into_record(name)).await?;
                }
                EventKind::LogDetail | EventKind::VisionFruit | EventKind::Other(_) => {
                    warn!(kind = %event.kind, "Message of unknown type");
                }
            }
        }
        Ok(())
    }

    async fn fetch_detail(&self, source_ref: &str) -> Result<DecodedEvent, String> {
        let response = self
            .session
            .request(Method::GET, source_ref, None)
            .await
            .map_err(|e| format!("log detail fetch for {source_ref} failed: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("log detail fetch for {source_ref} answered {status}"));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| format!("log detail body for {source_ref}: {e}"))?;
        decode_event(&body).map_err(|e| format!("log detail for {source_ref}: {e}"))
    }

    async fn emit(&self, record: Record) -> Result<(), StreamExit> {
        self.sink.emit(record).await.map_err(|e| StreamExit::Failed(e.to_string()))
    }

    async fn pong(&self, ws: &mut WsStream, payload: Vec<u8>) -> Result<(), StreamExit> {
        let send = ws.send(Message::Pong(payload));
        let result = match self.write_timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| StreamExit::Failed(format!("pong not written within {limit:?}")))?,
            None => send.await,
        };
        result.map_err(|e| StreamExit::Failed(format!("pong failed: {e}")))
    }
}

async fn receive(
    ws: &mut WsStream,
    read_timeout: Option<Duration>,
) -> Result<Option<Result<Message, WsError>>, Duration> {
    match read_timeout {
        Some(limit) => tokio::time::timeout(limit, ws.next()).await.map_err(|_| limit),
        None => Ok(ws.next().await),
    }
}

fn read_error_exit(err: WsError) -> StreamExit {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => StreamExit::Closed { code: None },
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            StreamExit::Closed { code: Some(u16::from(CloseCode::Abnormal)) }
        }
        WsError::Io(io)
            if matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::UnexpectedEof
                    | ErrorKind::BrokenPipe
            ) =>
        {
            StreamExit::Closed { code: Some(u16::from(CloseCode::Abnormal)) }
        }
        other => StreamExit::Failed(other.to_string()),
    }
}

fn close_frame_exit(frame: Option<CloseFrame<'static>>) -> StreamExit {
    let Some(frame) = frame else {
        return StreamExit::Closed { code: None };
    };
    let code = u16::from(frame.code);
    match frame.code {
        CloseCode::Normal | CloseCode::Away | CloseCode::Abnormal => {
            StreamExit::Closed { code: Some(code) }
        }
        _ => StreamExit::UnexpectedClose { code, reason: frame.reason.to_string() },
    }
}
