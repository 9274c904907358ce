// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `edge_live` - live channel subscriptions for energy-management edges.
//!
//! This library keeps a live, deduplicated subscription to the channels an
//! application needs, streams their current values from an edge over
//! WebSocket or MQTT, and delivers consistent snapshots to subscribers.
//!
//! # Supported Features
//!
//! - **Subscriptions**: Replace-not-merge registration per subscriber, with
//!   the union of all subscribers pushed to the edge in one debounced request
//! - **Current data**: Copy-on-write cache; every view reads a single
//!   snapshot generation, and values stay readable while disconnected
//! - **Delivery**: Callbacks in registration order, one snapshot at a time;
//!   dropping a [`SubscriptionGuard`] stops delivery
//! - **Reconnection**: Exponential backoff, with the desired channel set
//!   resent on every new connection
//! - **Decoders**: Typed operational states derived from raw channel codes
//!
//! # Quick Start
//!
//! ```no_run
//! use edge_live::{Edge, EdgeConfig};
//! use edge_live::decode::GridOptimizedChargeDecoder;
//! use edge_live::types::ChannelAddress;
//!
//! #[tokio::main]
//! async fn main() -> edge_live::Result<()> {
//!     let edge = Edge::connect(EdgeConfig::websocket("edge0", "ws://192.168.1.20:8085/websocket"))?;
//!
//!     // Raw channels
//!     let _soc = edge.subscribe(
//!         "soc".into(),
//!         [ChannelAddress::new("_sum", "EssSoc")],
//!         |data| println!("SoC: {:?}", data.this_component("EssSoc")),
//!     );
//!
//!     // Decoded controller state
//!     let decoder = GridOptimizedChargeDecoder::new("ctrlGridOptimizedCharge0").with_ess_id("ess0");
//!     let _charge = edge.subscribe_decoded("charge".into(), decoder, |status| {
//!         println!("state: {}, limit: {:?}", status.state, status.charge_limit);
//!     });
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     Ok(())
//! }
//! ```
//!
//! # Logging
//!
//! The library logs through [`tracing`] and installs no subscriber.

pub mod cache;
pub mod decode;
pub mod dispatch;
mod edge;
pub mod error;
pub mod event;
pub mod manager;
pub mod protocol;
pub mod subscription;
pub mod types;

pub use cache::{CurrentData, CurrentDataCache, Snapshot};
pub use dispatch::{SubscriberDispatcher, SubscriptionGuard};
pub use edge::Edge;
pub use error::{Error, ParseError, ProtocolError, Result};
pub use event::{EdgeEvent, EdgeId, EventBus, EventStream};
pub use manager::{ConnectionConfig, EdgeConfig, EdgeManager, ReconnectionPolicy};
pub use protocol::{ConnectionState, Connector, TransportSession};
pub use subscription::{SubscriberId, SubscriptionHandle, SubscriptionRegistry};
pub use types::{ChannelAddress, ChannelValue};
