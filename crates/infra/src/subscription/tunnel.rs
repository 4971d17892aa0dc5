//! HTTP CONNECT tunnel for the stream upgrade

use rws_bridge_domain::ConnectError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

/// Upper bound on the proxy's response head
const MAX_RESPONSE_HEAD: usize = 8 * 1024;

/// Open a TCP connection to `host:port` through an HTTP proxy.
pub(crate) async fn connect_via_proxy(
    proxy: &str,
    host: &str,
    port: u16,
) -> Result<TcpStream, ConnectError> {
    let proxy_url =
        Url::parse(proxy).map_err(|e| ConnectError::Proxy(format!("invalid proxy URL: {e}")))?;
    if proxy_url.scheme() != "http" {
        return Err(ConnectError::Proxy(format!(
            "unsupported proxy scheme {}",
            proxy_url.scheme()
        )));
    }
    let proxy_host = proxy_url
        .host_str()
        .ok_or_else(|| ConnectError::Proxy("proxy URL has no host".to_string()))?;
    let proxy_port = proxy_url.port_or_known_default().unwrap_or(80);

    let mut stream = TcpStream::connect((proxy_host, proxy_port))
        .await
        .map_err(|e| ConnectError::Proxy(format!("connect to {proxy_host}:{proxy_port}: {e}")))?;

    let target = format!("{host}:{port}");
    let request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n\r\n");
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|e| ConnectError::Proxy(e.to_string()))?;

    let head = read_response_head(&mut stream).await?;
    let status = parse_status(&head)?;
    if !(200..300).contains(&status) {
        return Err(ConnectError::Proxy(format!("CONNECT {target} answered with status {status}")));
    }

    debug!(proxy = %proxy_host, target = %target, "Proxy tunnel established");
    Ok(stream)
}

/// Read byte by byte up to the blank line so no tunnelled data is consumed.
async fn read_response_head(stream: &mut TcpStream) -> Result<Vec<u8>, ConnectError> {
    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_RESPONSE_HEAD {
            return Err(ConnectError::Proxy("proxy response head too large".to_string()));
        }
        let read = stream.read(&mut byte).await.map_err(|e| ConnectError::Proxy(e.to_string()))?;
        if read == 0 {
            return Err(ConnectError::Proxy("proxy closed the connection".to_string()));
        }
        head.push(byte[0]);
    }
    Ok(head)
}

fn parse_status(head: &[u8]) -> Result<u16, ConnectError> {
    let head = String::from_utf8_lossy(head);
    head.lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| ConnectError::Proxy("malformed proxy response".to_string()))
}
