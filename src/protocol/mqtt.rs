// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT transport for edges relayed through a broker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};

use crate::error::ProtocolError;
use crate::event::EdgeId;

use super::{Connection, Connector, DEFAULT_CONNECTION_BUFFER};

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How long to wait for the broker's CONNACK.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connects to an edge through an MQTT broker.
///
/// Uses the topic structure:
/// - Requests: `<prefix>/<edge>/request`
/// - Responses: `<prefix>/<edge>/response`
/// - Data notifications: `<prefix>/<edge>/currentData`
///
/// Every payload is one JSON-RPC text frame.
///
/// # Examples
///
/// ```
/// use edge_live::event::EdgeId;
/// use edge_live::protocol::MqttConnector;
///
/// let connector = MqttConnector::new("mqtt://broker:1883", "fems", EdgeId::new("edge0")).unwrap();
/// assert_eq!(connector.request_topic(), "fems/edge0/request");
/// ```
#[derive(Debug, Clone)]
pub struct MqttConnector {
    host: String,
    port: u16,
    topic_prefix: String,
    edge_id: EdgeId,
    credentials: Option<(String, String)>,
    keep_alive: Duration,
}

impl MqttConnector {
    /// Creates a connector.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidAddress` if the broker URL cannot be parsed.
    pub fn new(
        broker_url: &str,
        topic_prefix: impl Into<String>,
        edge_id: EdgeId,
    ) -> Result<Self, ProtocolError> {
        let (host, port) = parse_mqtt_url(broker_url)?;
        Ok(Self {
            host,
            port,
            topic_prefix: topic_prefix.into(),
            edge_id,
            credentials: None,
            keep_alive: Duration::from_secs(30),
        })
    }

    /// Sets authentication credentials for the broker.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns the topic requests are published to.
    #[must_use]
    pub fn request_topic(&self) -> String {
        self.topic("request")
    }

    /// Returns the topic responses arrive on.
    #[must_use]
    pub fn response_topic(&self) -> String {
        self.topic("response")
    }

    /// Returns the topic data notifications arrive on.
    #[must_use]
    pub fn current_data_topic(&self) -> String {
        self.topic("currentData")
    }

    fn topic(&self, leaf: &str) -> String {
        format!("{}/{}/{leaf}", self.topic_prefix, self.edge_id)
    }
}

impl Connector for MqttConnector {
    async fn connect(&self) -> Result<Connection, ProtocolError> {
        // PID + counter keeps client IDs unique across processes and reconnects
        let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let client_id = format!("edge_live_{}_{}", std::process::id(), counter);

        let mut mqtt_options = MqttOptions::new(&client_id, self.host.clone(), self.port);
        mqtt_options.set_keep_alive(self.keep_alive);
        mqtt_options.set_clean_session(true);
        if let Some((username, password)) = &self.credentials {
            mqtt_options.set_credentials(username.clone(), password.clone());
        }

        let (client, mut event_loop) = AsyncClient::new(mqtt_options, 10);

        let response_topic = self.response_topic();
        let current_data_topic = self.current_data_topic();
        client.subscribe(&response_topic, QoS::AtLeastOnce).await?;
        client.subscribe(&current_data_topic, QoS::AtMostOnce).await?;

        // Safe: the constant timeout fits in u64 milliseconds
        #[allow(clippy::cast_possible_truncation)]
        let timeout_ms = CONNECT_TIMEOUT.as_millis() as u64;
        tokio::time::timeout(CONNECT_TIMEOUT, wait_for_connack(&mut event_loop))
            .await
            .map_err(|_| ProtocolError::Timeout(timeout_ms))??;

        tracing::debug!(
            host = %self.host,
            port = self.port,
            client_id = %client_id,
            edge = %self.edge_id,
            "MQTT connected"
        );

        let (local, remote) = Connection::pair(DEFAULT_CONNECTION_BUFFER);
        let topics = Topics {
            request: self.request_topic(),
            response: response_topic,
            current_data: current_data_topic,
        };
        tokio::spawn(handle_mqtt_events(event_loop, client, topics, remote));
        Ok(local)
    }
}

struct Topics {
    request: String,
    response: String,
    current_data: String,
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), ProtocolError> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                if connack.code == ConnectReturnCode::Success {
                    return Ok(());
                }
                return Err(ProtocolError::ConnectionFailed(format!(
                    "broker refused connection: {:?}",
                    connack.code
                )));
            }
            Ok(_) => {}
            Err(e) => return Err(ProtocolError::ConnectionFailed(e.to_string())),
        }
    }
}

/// Parses an MQTT URL into host and port.
fn parse_mqtt_url(url: &str) -> Result<(String, u16), ProtocolError> {
    let url = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    if url.is_empty() {
        return Err(ProtocolError::InvalidAddress("empty broker host".to_string()));
    }

    match url.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| ProtocolError::InvalidAddress(format!("Invalid port: {port}")))?;
            Ok((host.to_string(), port))
        }
        None => Ok((url.to_string(), 1883)),
    }
}

/// Moves payloads between the broker and the session until either side closes.
async fn handle_mqtt_events(
    mut event_loop: EventLoop,
    client: AsyncClient,
    topics: Topics,
    mut remote: Connection,
) {
    loop {
        tokio::select! {
            outbound = remote.recv() => {
                let Some(payload) = outbound else {
                    let _ = client.try_disconnect();
                    break;
                };
                tracing::debug!(topic = %topics.request, "Publishing MQTT request");
                // The event loop is polled by this task, so never wait for queue space here
                if let Err(e) = client.try_publish(&topics.request, QoS::AtLeastOnce, false, payload) {
                    tracing::warn!(error = %e, "Failed to queue MQTT request");
                    break;
                }
            }

            event = event_loop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if publish.topic != topics.response && publish.topic != topics.current_data {
                            continue;
                        }
                        match String::from_utf8(publish.payload.to_vec()) {
                            Ok(payload) => {
                                if remote.send(payload).await.is_err() {
                                    break;
                                }
                            }
                            Err(_) => {
                                tracing::debug!(topic = %publish.topic, "Dropping non-UTF-8 payload");
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::SubAck(suback))) => {
                        tracing::debug!(?suback, "MQTT subscription acknowledged");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "MQTT event loop error");
                        break;
                    }
                }
            }
        }
    }
}
