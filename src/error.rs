// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `edge_live` library.
//!
//! Transport and protocol failures are mostly absorbed by the session loop,
//! which logs and retries them. The types here surface at the library
//! boundary: connection setup, configuration mistakes, wire-format parsing,
//! and subscription requests rejected by the edge.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred while talking to the edge.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing a message or an identifier.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The edge rejected a subscription request outright.
    #[error("subscription rejected by edge (code {code}): {message}")]
    SubscriptionRejected {
        /// JSON-RPC error code reported by the edge.
        code: i64,
        /// Human-readable reason reported by the edge.
        message: String,
    },

    /// Edge was not found in the manager.
    #[error("edge not found: {0}")]
    EdgeNotFound(String),

    /// An edge with the same identifier is already managed.
    #[error("edge already exists: {0}")]
    EdgeExists(String),

    /// Edge is not connected.
    #[error("edge is not connected")]
    NotConnected,
}

/// Errors related to the transport (WebSocket/MQTT).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// WebSocket handshake or I/O failed.
    #[cfg(feature = "websocket")]
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// MQTT connection or communication failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the edge failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation timed out.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// Errors related to parsing wire messages and identifiers.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A channel address is not of the form `componentId/channelId`.
    #[error("invalid channel address: {0:?}")]
    InvalidChannelAddress(String),

    /// Unexpected message format.
    #[error("unexpected message format: {0}")]
    UnexpectedFormat(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
