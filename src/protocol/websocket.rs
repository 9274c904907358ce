// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WebSocket transport.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::ProtocolError;

use super::{Connection, Connector, DEFAULT_CONNECTION_BUFFER};

/// Connects to an edge over a WebSocket.
///
/// Each call to [`connect`](Connector::connect) opens a new socket and
/// spawns a task moving text frames between the socket and the returned
/// [`Connection`]. Pings are answered; binary frames are ignored.
///
/// # Examples
///
/// ```
/// use edge_live::protocol::WebSocketConnector;
///
/// let connector = WebSocketConnector::new("ws://192.168.1.20:8085/websocket").unwrap();
/// assert_eq!(connector.url(), "ws://192.168.1.20:8085/websocket");
/// ```
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    /// Creates a connector for `url`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidAddress` unless the URL uses the
    /// `ws://` or `wss://` scheme.
    pub fn new(url: impl Into<String>) -> Result<Self, ProtocolError> {
        let url = url.into();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ProtocolError::InvalidAddress(format!(
                "expected ws:// or wss:// URL, got {url}"
            )));
        }
        Ok(Self { url })
    }

    /// Returns the WebSocket URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Connection, ProtocolError> {
        tracing::debug!(url = %self.url, "Connecting WebSocket");
        let (stream, _response) = connect_async(self.url.as_str()).await?;
        tracing::debug!(url = %self.url, "WebSocket connected");

        let (local, remote) = Connection::pair(DEFAULT_CONNECTION_BUFFER);
        tokio::spawn(pump(stream, remote, self.url.clone()));
        Ok(local)
    }
}

type Stream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Moves frames between the socket and the session until either side closes.
async fn pump(stream: Stream, mut remote: Connection, url: String) {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            outbound = remote.recv() => {
                let Some(text) = outbound else {
                    // Session dropped the connection
                    if let Err(e) = write.send(Message::Close(None)).await {
                        tracing::debug!(url = %url, error = %e, "Failed to send Close frame");
                    }
                    break;
                };
                if let Err(e) = write.send(Message::Text(text)).await {
                    tracing::warn!(url = %url, error = %e, "WebSocket write failed");
                    break;
                }
            }

            inbound = read.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if remote.send(text).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            tracing::warn!(url = %url, error = %e, "WebSocket pong failed");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(url = %url, ?frame, "WebSocket closed by edge");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(url = %url, error = %e, "WebSocket read error");
                        break;
                    }
                    None => {
                        tracing::debug!(url = %url, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ws_and_wss() {
        assert!(WebSocketConnector::new("ws://localhost:8085").is_ok());
        assert!(WebSocketConnector::new("wss://edge.example.com/ws").is_ok());
    }

    #[test]
    fn rejects_other_schemes() {
        let err = WebSocketConnector::new("http://localhost").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn connect_fails_without_server() {
        // Port 1 on localhost is reserved and refuses connections
        let connector = WebSocketConnector::new("ws://127.0.0.1:1").unwrap();
        assert!(connector.connect().await.is_err());
    }
}
