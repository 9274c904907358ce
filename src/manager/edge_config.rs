// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Edge configuration types.

use std::time::Duration;

use crate::event::EdgeId;

/// Default topic prefix used by [`ConnectionConfig::Mqtt`].
pub const DEFAULT_MQTT_TOPIC_PREFIX: &str = "edge";

/// Default window for coalescing subscription changes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Default idle timeout. Edges push data every cycle, so silence this long
/// means the connection is dead even if the socket is still open.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of snapshots buffered between the session and the processor.
pub const DEFAULT_SNAPSHOT_BUFFER: usize = 16;

/// Configuration for one edge.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use edge_live::manager::{EdgeConfig, ReconnectionPolicy};
///
/// // WebSocket edge
/// let config = EdgeConfig::websocket("edge0", "ws://192.168.1.20:8085/websocket");
///
/// // MQTT edge with tuned timings
/// let config = EdgeConfig::mqtt("edge1", "mqtt://broker:1883")
///     .with_mqtt_credentials("user", "secret")
///     .with_debounce(Duration::from_millis(50))
///     .with_reconnection(ReconnectionPolicy::new().with_max_retries(3));
/// ```
#[derive(Debug, Clone)]
pub struct EdgeConfig {
    /// Identifier of the edge.
    pub edge_id: EdgeId,
    /// The connection configuration.
    pub connection: ConnectionConfig,
    /// Reconnection policy.
    pub reconnection: ReconnectionPolicy,
    /// How long subscription changes are collected before one request is sent.
    pub debounce: Duration,
    /// Silence after which the connection is considered lost (None = never).
    pub idle_timeout: Option<Duration>,
    /// Snapshots buffered between the transport session and the processor.
    pub snapshot_buffer: usize,
}

impl EdgeConfig {
    /// Creates a configuration for an edge reachable over WebSocket.
    #[must_use]
    pub fn websocket(edge_id: impl Into<EdgeId>, url: impl Into<String>) -> Self {
        Self::with_connection(
            edge_id,
            ConnectionConfig::WebSocket { url: url.into() },
        )
    }

    /// Creates a configuration for an edge reachable through an MQTT broker.
    #[must_use]
    pub fn mqtt(edge_id: impl Into<EdgeId>, broker_url: impl Into<String>) -> Self {
        Self::with_connection(
            edge_id,
            ConnectionConfig::Mqtt {
                broker_url: broker_url.into(),
                topic_prefix: DEFAULT_MQTT_TOPIC_PREFIX.to_string(),
                credentials: None,
            },
        )
    }

    /// Creates a configuration with an arbitrary connection.
    #[must_use]
    pub fn with_connection(edge_id: impl Into<EdgeId>, connection: ConnectionConfig) -> Self {
        Self {
            edge_id: edge_id.into(),
            connection,
            reconnection: ReconnectionPolicy::default(),
            debounce: DEFAULT_DEBOUNCE,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            snapshot_buffer: DEFAULT_SNAPSHOT_BUFFER,
        }
    }

    /// Sets MQTT credentials.
    ///
    /// Only applicable for MQTT connections.
    #[must_use]
    pub fn with_mqtt_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        if let ConnectionConfig::Mqtt { credentials, .. } = &mut self.connection {
            *credentials = Some((username.into(), password.into()));
        }
        self
    }

    /// Sets the MQTT topic prefix.
    ///
    /// Only applicable for MQTT connections.
    #[must_use]
    pub fn with_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        if let ConnectionConfig::Mqtt { topic_prefix, .. } = &mut self.connection {
            *topic_prefix = prefix.into();
        }
        self
    }

    /// Sets the reconnection policy.
    #[must_use]
    pub fn with_reconnection(mut self, policy: ReconnectionPolicy) -> Self {
        self.reconnection = policy;
        self
    }

    /// Sets the debounce window for subscription changes.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the idle timeout.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Disables the idle timeout.
    #[must_use]
    pub fn without_idle_timeout(mut self) -> Self {
        self.idle_timeout = None;
        self
    }

    /// Sets the snapshot buffer size (at least 1).
    #[must_use]
    pub fn with_snapshot_buffer(mut self, size: usize) -> Self {
        self.snapshot_buffer = size.max(1);
        self
    }

    /// Returns true if this is a WebSocket connection.
    #[must_use]
    pub fn is_websocket(&self) -> bool {
        matches!(self.connection, ConnectionConfig::WebSocket { .. })
    }

    /// Returns true if this is an MQTT connection.
    #[must_use]
    pub fn is_mqtt(&self) -> bool {
        matches!(self.connection, ConnectionConfig::Mqtt { .. })
    }
}

/// Connection configuration for an edge.
#[derive(Debug, Clone)]
pub enum ConnectionConfig {
    /// Direct WebSocket connection.
    WebSocket {
        /// The WebSocket URL (e.g., `ws://192.168.1.20:8085/websocket`).
        url: String,
    },
    /// Connection relayed through an MQTT broker.
    ///
    /// Requests go to `<prefix>/<edge>/request`; responses and data arrive on
    /// `<prefix>/<edge>/response` and `<prefix>/<edge>/currentData`.
    Mqtt {
        /// The MQTT broker URL (e.g., `mqtt://192.168.1.50:1883`).
        broker_url: String,
        /// First topic level.
        topic_prefix: String,
        /// Optional (username, password) for broker authentication.
        credentials: Option<(String, String)>,
    },
}

/// Backoff schedule the transport session follows after a failed or lost
/// connection.
///
/// The default retries forever, starting at one second and doubling up to
/// thirty seconds between attempts. Edges often restart for updates, so
/// giving up is opt-in.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use edge_live::manager::ReconnectionPolicy;
///
/// let patient = ReconnectionPolicy::default();
/// assert_eq!(patient.next_delay(0), Some(Duration::from_secs(1)));
///
/// let strict = ReconnectionPolicy::new()
///     .with_max_retries(2)
///     .with_initial_delay(Duration::from_millis(250));
/// assert_eq!(strict.next_delay(1), Some(Duration::from_millis(500)));
/// assert_eq!(strict.next_delay(2), None);
///
/// assert_eq!(ReconnectionPolicy::disabled().next_delay(0), None);
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectionPolicy {
    /// False stops the session at the first failure.
    pub enabled: bool,
    /// Consecutive failures tolerated before the session fails (None = unlimited).
    pub max_retries: Option<u32>,
    /// Pause after the first failure.
    pub initial_delay: Duration,
    /// Upper bound for any pause.
    pub max_delay: Duration,
    /// Growth factor applied per consecutive failure.
    pub multiplier: f32,
}

impl ReconnectionPolicy {
    /// Returns the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a policy that never reconnects.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Limits the number of consecutive failures.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Removes the failure limit.
    #[must_use]
    pub fn with_unlimited_retries(mut self) -> Self {
        self.max_retries = None;
        self
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Pause before reconnecting after `failures` earlier consecutive
    /// failures, or `None` when the session should give up.
    #[must_use]
    pub fn next_delay(&self, failures: u32) -> Option<Duration> {
        if !self.enabled || self.max_retries.is_some_and(|max| failures >= max) {
            return None;
        }

        let exponent = i32::try_from(failures).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * f64::from(self.multiplier).powi(exponent);
        let delay = Duration::try_from_secs_f64(scaled).unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}
