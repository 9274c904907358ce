// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire protocol and transports for talking to an edge.
//!
//! The edge speaks JSON-RPC 2.0 over text frames. A [`TransportSession`]
//! keeps one logical connection alive: it reconnects with backoff, keeps
//! the edge subscribed to the desired channel set and filters incoming
//! `currentData` notifications through a [`SequenceGate`].
//!
//! # Transports
//!
//! - [`WebSocketConnector`]: direct WebSocket connection (feature `websocket`)
//! - [`MqttConnector`]: connection relayed through an MQTT broker (feature `mqtt`)
//!
//! Any other transport can be plugged in by implementing [`Connector`].

mod connection;
pub mod jsonrpc;
#[cfg(feature = "mqtt")]
mod mqtt;
mod sequence;
mod session;
#[cfg(test)]
pub(crate) mod testing;
#[cfg(feature = "websocket")]
mod websocket;

pub use connection::{Connection, Connector, DEFAULT_CONNECTION_BUFFER};
pub use jsonrpc::RpcError;
#[cfg(feature = "mqtt")]
pub use mqtt::MqttConnector;
pub use sequence::SequenceGate;
pub use session::{ConnectionState, TransportSession};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnector;
