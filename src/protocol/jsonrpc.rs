// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON-RPC 2.0 messages exchanged with an edge.
//!
//! Outbound, the session only ever sends `subscribeChannels` requests
//! carrying the complete desired channel set. Inbound, the edge answers
//! those requests and pushes `currentData` notifications.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ParseError;
use crate::types::{ChannelAddress, ChannelValue};

const JSONRPC_VERSION: &str = "2.0";

/// Method name of the subscription request.
pub const SUBSCRIBE_CHANNELS: &str = "subscribeChannels";

/// Method name of the data notification.
pub const CURRENT_DATA: &str = "currentData";

/// A `subscribeChannels` request replacing the whole channel set.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeChannelsRequest {
    jsonrpc: &'static str,
    id: Uuid,
    method: &'static str,
    params: SubscribeChannelsParams,
}

#[derive(Debug, Clone, Serialize)]
struct SubscribeChannelsParams {
    count: u64,
    channels: Vec<ChannelAddress>,
}

impl SubscribeChannelsRequest {
    /// Creates a request with a fresh id.
    ///
    /// `count` is the running number of subscription requests sent by the
    /// session; the edge uses it to discard out-of-date requests.
    #[must_use]
    pub fn new(count: u64, channels: &BTreeSet<ChannelAddress>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: Uuid::new_v4(),
            method: SUBSCRIBE_CHANNELS,
            params: SubscribeChannelsParams {
                count,
                channels: channels.iter().cloned().collect(),
            },
        }
    }

    /// Returns the request id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the request count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.params.count
    }

    /// Returns the requested channels.
    #[must_use]
    pub fn channels(&self) -> &[ChannelAddress] {
        &self.params.channels
    }

    /// Serializes the request.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String, ParseError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// JSON-RPC error object returned by the edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable reason.
    pub message: String,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// A `currentData` notification.
    CurrentData {
        /// Per-connection sequence number.
        sequence: u64,
        /// Reported values; `None` for channels reported as `null`.
        values: BTreeMap<ChannelAddress, Option<ChannelValue>>,
    },
    /// Successful response to a request.
    Success {
        /// Id of the answered request.
        id: Option<String>,
    },
    /// Error response to a request.
    Failure {
        /// Id of the answered request.
        id: Option<String>,
        /// Reported error.
        error: RpcError,
    },
    /// A notification with a method this library does not handle.
    Unhandled {
        /// Method name.
        method: String,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    /// `Some(Value::Null)` for `"result": null`, `None` when the key is absent.
    #[serde(default, deserialize_with = "present")]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct CurrentDataParams {
    sequence: u64,
    #[serde(rename = "currentData")]
    current_data: BTreeMap<String, Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

fn id_string(id: Option<Value>) -> Option<String> {
    match id? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Parses one inbound text frame.
///
/// Channel keys that are not valid addresses and values that are not
/// scalars are skipped.
///
/// # Errors
///
/// Returns `ParseError` if the frame is not JSON or is not a JSON-RPC
/// response or notification.
pub fn parse_inbound(text: &str) -> Result<InboundMessage, ParseError> {
    let envelope: Envelope = serde_json::from_str(text)?;

    if let Some(error) = envelope.error {
        return Ok(InboundMessage::Failure {
            id: id_string(envelope.id),
            error,
        });
    }

    if envelope.result.is_some() {
        return Ok(InboundMessage::Success {
            id: id_string(envelope.id),
        });
    }

    let Some(method) = envelope.method else {
        return Err(ParseError::UnexpectedFormat(
            "frame has neither method, result nor error".to_string(),
        ));
    };

    if method != CURRENT_DATA {
        return Ok(InboundMessage::Unhandled { method });
    }

    let params = envelope.params.ok_or_else(|| {
        ParseError::UnexpectedFormat("currentData notification without params".to_string())
    })?;
    let params: CurrentDataParams = serde_json::from_value(params)?;

    let mut values = BTreeMap::new();
    for (key, value) in params.current_data {
        let Ok(address) = key.parse::<ChannelAddress>() else {
            tracing::warn!(key = %key, "Skipping invalid channel address in currentData");
            continue;
        };
        match scalar(value) {
            Some(value) => {
                values.insert(address, value);
            }
            None => {
                tracing::debug!(%address, "Skipping non-scalar channel value");
            }
        }
    }

    Ok(InboundMessage::CurrentData {
        sequence: params.sequence,
        values,
    })
}

/// Converts a JSON value into a channel value. `null` maps to `Some(None)`.
fn scalar(value: Value) -> Option<Option<ChannelValue>> {
    match value {
        Value::Null => Some(None),
        Value::Bool(b) => Some(Some(ChannelValue::Bool(b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Some(ChannelValue::Integer(i))),
            None => n.as_f64().map(|f| Some(ChannelValue::Float(f))),
        },
        Value::String(s) => Some(Some(ChannelValue::Text(s))),
        Value::Array(_) | Value::Object(_) => None,
    }
}
