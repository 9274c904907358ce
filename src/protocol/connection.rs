// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport-neutral connection to an edge.

use std::future::Future;

use tokio::sync::mpsc;

use crate::error::ProtocolError;

/// Default buffer size of each direction of a [`Connection`].
pub const DEFAULT_CONNECTION_BUFFER: usize = 64;

/// One established physical connection, seen as two text streams.
///
/// Transports move frames between the socket and a [`Connection`] pair in a
/// background task. When that task ends, [`recv`](Self::recv) returns
/// `None`, which the session treats as a lost connection. Dropping the
/// connection closes the transport.
#[derive(Debug)]
pub struct Connection {
    outbound: mpsc::Sender<String>,
    inbound: mpsc::Receiver<String>,
}

impl Connection {
    /// Creates a connection from its two halves.
    #[must_use]
    pub fn new(outbound: mpsc::Sender<String>, inbound: mpsc::Receiver<String>) -> Self {
        Self { outbound, inbound }
    }

    /// Creates two connected ends.
    ///
    /// Text sent on one end is received by the other.
    #[must_use]
    pub fn pair(buffer: usize) -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel(buffer);
        let (b_tx, b_rx) = mpsc::channel(buffer);
        (Self::new(a_tx, b_rx), Self::new(b_tx, a_rx))
    }

    /// Sends one text frame.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::ChannelClosed` if the other end is gone.
    pub async fn send(&self, text: String) -> Result<(), ProtocolError> {
        self.outbound
            .send(text)
            .await
            .map_err(|_| ProtocolError::ChannelClosed("connection outbound".to_string()))
    }

    /// Receives the next text frame, or `None` once the other end is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }

    /// Splits the connection into its halves.
    #[must_use]
    pub fn into_parts(self) -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
        (self.outbound, self.inbound)
    }
}

/// Establishes physical connections to one edge.
///
/// The session calls [`connect`](Self::connect) for the first connection
/// and again after every loss.
pub trait Connector: Send + Sync + 'static {
    /// Opens a new connection.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the edge cannot be reached.
    fn connect(&self) -> impl Future<Output = Result<Connection, ProtocolError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_is_bidirectional() {
        let (mut a, mut b) = Connection::pair(4);

        a.send("ping".to_string()).await.unwrap();
        assert_eq!(b.recv().await.as_deref(), Some("ping"));

        b.send("pong".to_string()).await.unwrap();
        assert_eq!(a.recv().await.as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn dropping_one_end_closes_the_other() {
        let (mut a, b) = Connection::pair(4);
        drop(b);

        assert!(a.recv().await.is_none());
        assert!(matches!(
            a.send("x".to_string()).await,
            Err(ProtocolError::ChannelClosed(_))
        ));
    }
}
