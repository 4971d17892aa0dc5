//! Shared fixtures for the infra integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rws_bridge_core::{CredentialProvider, MemorySink, StaticCredentials};
use rws_bridge_domain::{Record, RwsConfig, Secret};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderMap;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USERNAME: &str = "Default User";
pub const PASSWORD: &str = "robotics";
pub const SESSION_COOKIE: &str = "-http-session-=abc123";

const DIGEST_CHALLENGE: &str =
    r#"Digest realm="validusers@robapi.abb", nonce="8f2b1d0c4e", qop="auth""#;

/// Mount the two-step digest login on `/rw`.
///
/// Requests carrying an `Authorization` header get the session cookie, all
/// others get the challenge.
pub async fn mount_digest_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rw"))
        .and(header_exists("authorization"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", &*format!("{SESSION_COOKIE}; Path=/")),
        )
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rw"))
        .respond_with(ResponseTemplate::new(401).insert_header("www-authenticate", DIGEST_CHALLENGE))
        .with_priority(2)
        .mount(server)
        .await;
}

pub fn config_for(server: &MockServer) -> RwsConfig {
    let mut config = RwsConfig::new(server.uri());
    config.rob_id = 1;
    config.username = Secret::from(USERNAME);
    config.password = Secret::from(PASSWORD);
    config
}

pub fn credentials() -> Arc<dyn CredentialProvider> {
    Arc::new(StaticCredentials::new(USERNAME.into(), PASSWORD.into()))
}

/// Wrap list items into a notification document.
pub fn event_frame(items: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><html xmlns="http://www.w3.org/1999/xhtml"><head><title>Event</title></head><body><div class="state"><a href="subscription/1" rel="group"></a><ul>{items}</ul></div></body></html>"#
    )
}

pub fn dipc_item(data: &str, userdef: i64) -> String {
    format!(
        r#"<li class="dipc-msg-ev" title="msg"><a href="/rw/dipc/PC_SDK_Q" rel="self"></a><span class="dipc-slotid">192</span><span class="dipc-data">{data}</span><span class="dipc-userdef">{userdef}</span></li>"#
    )
}

pub fn elog_item(href: &str) -> String {
    format!(
        r#"<li class="elog-message-ev" title="message"><a href="{href}" rel="self"/><span class="seqnum">42</span></li>"#
    )
}

pub fn signal_item() -> String {
    r#"<li class="ios-signalstate-ev" title="DO4"><a href="/rw/iosystem/signals/Local_IO_0_DO4;state" rel="self"/><span class="lvalue">1</span></li>"#.to_string()
}

/// Event log detail document for one message.
pub fn elog_detail(href: &str, severity: &str) -> String {
    event_frame(&format!(
        r#"<li class="elog-message" title="message"><a href="{href}" rel="self"/><span class="msgtype">{severity}</span><span class="code">10012</span><span class="title">Safety guard stop state</span></li>"#
    ))
}

/// Poll the sink until it holds `count` records.
pub async fn wait_for_records(sink: &MemorySink, count: usize) -> Vec<Record> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while sink.len() < count {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {count} records");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    sink.records()
}

/// One scripted action of the test stream server
pub enum Step {
    Send(Message),
    /// Read until a pong arrives
    ExpectPong,
    /// Send a close frame with this code and drain the connection
    Close(u16),
    /// Read until the client closes
    Drain,
    /// Drop the socket without a closing handshake
    Drop,
    Sleep(Duration),
}

/// Single-connection WebSocket server that runs a script
pub struct WsServer {
    pub endpoint: String,
    headers: Arc<Mutex<Option<HeaderMap>>>,
    task: JoinHandle<Vec<Message>>,
}

impl WsServer {
    pub async fn start(steps: Vec<Step>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("ws://{}/poll/1", listener.local_addr().unwrap());
        let headers = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&headers);

        let task = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let callback =
                move |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
                    *captured.lock() = Some(request.headers().clone());
                    if let Some(protocol) = request.headers().get(SEC_WEBSOCKET_PROTOCOL) {
                        response.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocol.clone());
                    }
                    Ok(response)
                };
            let mut ws = accept_hdr_async(tcp, callback).await.unwrap();

            let mut received = Vec::new();
            for step in steps {
                match step {
                    Step::Send(message) => ws.send(message).await.unwrap(),
                    Step::ExpectPong => {
                        while let Some(Ok(message)) = ws.next().await {
                            let pong = matches!(message, Message::Pong(_));
                            received.push(message);
                            if pong {
                                break;
                            }
                        }
                    }
                    Step::Close(code) => {
                        let frame = CloseFrame { code: CloseCode::from(code), reason: "bye".into() };
                        let _ = ws.close(Some(frame)).await;
                        while let Some(Ok(message)) = ws.next().await {
                            received.push(message);
                        }
                    }
                    Step::Drain => {
                        while let Some(Ok(message)) = ws.next().await {
                            let close = matches!(message, Message::Close(_));
                            received.push(message);
                            if close {
                                break;
                            }
                        }
                    }
                    Step::Drop => return received,
                    Step::Sleep(delay) => tokio::time::sleep(delay).await,
                }
            }
            received
        });

        Self { endpoint, headers, task }
    }

    /// Header the client sent with its upgrade request
    pub fn handshake_header(&self, name: &str) -> Option<String> {
        self.headers
            .lock()
            .as_ref()
            .and_then(|headers| headers.get(name))
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    /// Messages the server received from the client
    pub async fn finish(self) -> Vec<Message> {
        tokio::time::timeout(Duration::from_secs(5), self.task).await.unwrap().unwrap()
    }
}
