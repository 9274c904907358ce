// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the MQTT transport using mockforge-mqtt.

#![cfg(feature = "mqtt")]

use std::time::Duration;

use edge_live::protocol::MqttConnector;
use edge_live::{
    ConnectionState, Connector, Edge, EdgeConfig, EdgeId, Error, ProtocolError, ReconnectionPolicy,
};
use mockforge_mqtt::broker::MqttConfig;
use mockforge_mqtt::start_mqtt_server;
use tokio::time::sleep;

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18950);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = MqttConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to bind
    sleep(Duration::from_millis(500)).await;
}

// ============================================================================
// Connector
// ============================================================================

mod connector {
    use super::*;

    #[tokio::test]
    async fn connect_to_broker() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let connector =
            MqttConnector::new(&format!("mqtt://127.0.0.1:{port}"), "edge", EdgeId::new("edge0"))
                .unwrap();
        let result = connector.connect().await;

        assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
    }

    #[tokio::test]
    async fn connect_with_tcp_scheme() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let connector =
            MqttConnector::new(&format!("tcp://127.0.0.1:{port}"), "edge", EdgeId::new("edge0"))
                .unwrap();

        assert!(connector.connect().await.is_ok());
    }

    #[tokio::test]
    async fn connect_without_scheme() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let connector =
            MqttConnector::new(&format!("127.0.0.1:{port}"), "edge", EdgeId::new("edge0")).unwrap();

        assert!(connector.connect().await.is_ok());
    }

    #[tokio::test]
    async fn connect_without_broker_fails() {
        let port = get_test_port();

        let connector =
            MqttConnector::new(&format!("mqtt://127.0.0.1:{port}"), "edge", EdgeId::new("edge0"))
                .unwrap();

        assert!(connector.connect().await.is_err());
    }

    #[test]
    fn topics_follow_prefix_and_edge() {
        let connector =
            MqttConnector::new("mqtt://broker:1883", "fems", EdgeId::new("edge7")).unwrap();

        assert_eq!(connector.request_topic(), "fems/edge7/request");
        assert_eq!(connector.response_topic(), "fems/edge7/response");
        assert_eq!(connector.current_data_topic(), "fems/edge7/currentData");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let result = MqttConnector::new("mqtt://broker:notaport", "edge", EdgeId::new("edge0"));

        assert!(matches!(result, Err(ProtocolError::InvalidAddress(_))));
    }
}

// ============================================================================
// Edge over MQTT
// ============================================================================

mod edge_over_mqtt {
    use super::*;

    #[tokio::test]
    async fn edge_connects_through_broker() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let config = EdgeConfig::mqtt("edge0", format!("mqtt://127.0.0.1:{port}"))
            .with_topic_prefix("fems")
            .without_idle_timeout();
        let edge = Edge::connect(config).unwrap();

        edge.wait_connected(Duration::from_secs(10)).await.unwrap();
        assert_eq!(edge.connection_state(), ConnectionState::Connected);

        edge.shutdown();
        assert_eq!(edge.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn edge_without_broker_gives_up() {
        let port = get_test_port();

        let config = EdgeConfig::mqtt("edge0", format!("mqtt://127.0.0.1:{port}"))
            .with_reconnection(ReconnectionPolicy::disabled());
        let edge = Edge::connect(config).unwrap();

        let err = edge.wait_connected(Duration::from_secs(10)).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert!(edge.connection_state().is_failed());
    }
}
