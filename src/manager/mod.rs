// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Edge configuration and multi-edge management.
//!
//! # Overview
//!
//! [`EdgeConfig`] describes how to reach one edge and how its session
//! behaves: transport, reconnection backoff, subscription debounce and idle
//! timeout. [`EdgeManager`] keeps several [`Edge`](crate::Edge)s keyed by
//! their [`EdgeId`](crate::event::EdgeId) and merges their events into one
//! stream.
//!
//! # Examples
//!
//! ```no_run
//! use std::time::Duration;
//! use edge_live::manager::{EdgeConfig, EdgeManager, ReconnectionPolicy};
//! use edge_live::types::ChannelAddress;
//!
//! #[tokio::main]
//! async fn main() -> edge_live::Result<()> {
//!     let manager = EdgeManager::new();
//!
//!     let config = EdgeConfig::mqtt("edge0", "mqtt://192.168.1.50:1883")
//!         .with_topic_prefix("fems")
//!         .with_reconnection(ReconnectionPolicy::new().with_max_delay(Duration::from_secs(10)));
//!     let edge = manager.add_edge(config).await?;
//!
//!     let _guard = edge.subscribe(
//!         "grid".into(),
//!         [ChannelAddress::new("_sum", "GridActivePower")],
//!         |data| println!("{:?}", data.this_component("GridActivePower")),
//!     );
//!
//!     Ok(())
//! }
//! ```

mod edge_config;
mod edge_manager;

pub use edge_config::{
    ConnectionConfig, DEFAULT_DEBOUNCE, DEFAULT_IDLE_TIMEOUT, DEFAULT_MQTT_TOPIC_PREFIX,
    DEFAULT_SNAPSHOT_BUFFER, EdgeConfig, ReconnectionPolicy,
};
pub use edge_manager::EdgeManager;
