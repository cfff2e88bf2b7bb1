//! Stream client: one persistent websocket connection yielding raw
//! messages with a bounded per-receive wait.
//!
//! The connector/transport split is a seam: the session loop only talks to
//! the traits, so tests can script a transport without a server.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::config::StreamConfig;
use crate::{Result, StreamError};

/// Outcome of one bounded-wait receive.
#[derive(Debug)]
pub enum RecvOutcome {
    /// One raw text message arrived.
    Message(String),
    /// Nothing arrived within the wait window. Not an error; the caller
    /// re-checks its stop flag and retries.
    Timeout,
    /// The remote closed the connection cleanly. Terminal.
    Closed,
}

/// Establishes one connection per session.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self, config: &StreamConfig) -> Result<Box<dyn StreamTransport>>;
}

/// One open connection. `recv` is the only suspension point in the session
/// loop; its bounded wait is what bounds cancellation latency.
#[async_trait]
pub trait StreamTransport: Send {
    async fn recv(&mut self, wait: Duration) -> Result<RecvOutcome>;

    /// Best-effort close of the underlying connection.
    async fn close(&mut self);
}

/// Production connector using tokio-tungstenite.
#[derive(Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl StreamConnector for WsConnector {
    async fn connect(&self, config: &StreamConfig) -> Result<Box<dyn StreamTransport>> {
        let endpoint = config.endpoint()?;
        let mut request = endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| StreamError::InvalidConfig(format!("bad handshake request: {}", e)))?;

        if let Some((user, pass)) = config.credentials() {
            let header = basic_auth_header(user, pass);
            request.headers_mut().insert(
                AUTHORIZATION,
                HeaderValue::from_str(&header).map_err(|e| {
                    StreamError::InvalidConfig(format!("credentials not header-safe: {}", e))
                })?,
            );
        }

        let (socket, response) =
            match tokio::time::timeout(config.connect_timeout, connect_async(request)).await {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => return Err(StreamError::ConnectionRefused(e.to_string())),
                Err(_) => {
                    return Err(StreamError::ConnectionRefused(format!(
                        "handshake timed out after {:?}",
                        config.connect_timeout
                    )))
                }
            };
        debug!(endpoint = %endpoint, status = %response.status(), "websocket handshake complete");

        Ok(Box::new(WsTransport { socket }))
    }
}

/// `Authorization` header value for HTTP Basic: `user:pass`, base64-encoded.
pub fn basic_auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{}:{}", user, pass)))
}

struct WsTransport {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamTransport for WsTransport {
    async fn recv(&mut self, wait: Duration) -> Result<RecvOutcome> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let frame = match tokio::time::timeout_at(deadline, self.socket.next()).await {
                Err(_) => return Ok(RecvOutcome::Timeout),
                Ok(frame) => frame,
            };
            match frame {
                Some(Ok(Message::Text(text))) => return Ok(RecvOutcome::Message(text)),
                // Control frames: keep reading within the same deadline
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Ok(RecvOutcome::Closed),
                Some(Ok(Message::Binary(_))) => {
                    return Err(StreamError::Protocol(
                        "unexpected binary frame on a JSON stream".into(),
                    ))
                }
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    return Ok(RecvOutcome::Closed)
                }
                Some(Err(e)) => return Err(StreamError::Protocol(e.to_string())),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.socket.close(None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_matches_rfc_example() {
        // RFC 7617's Aladdin example
        assert_eq!(
            basic_auth_header("Aladdin", "open sesame"),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
    }

    #[test]
    fn empty_password_still_encodes_the_colon() {
        assert_eq!(basic_auth_header("user", ""), format!("Basic {}", BASE64.encode("user:")));
    }
}
