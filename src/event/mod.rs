// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event system for edge lifecycle, connection and subscription changes.
//!
//! Edges publish [`EdgeEvent`]s on an [`EventBus`] shared with their
//! [`EdgeManager`](crate::manager::EdgeManager). Listeners typically use
//! them to show connection status or to surface rejected subscriptions.
//!
//! # Examples
//!
//! ```
//! use edge_live::event::{EdgeEvent, EdgeId, EventBus};
//!
//! let bus = EventBus::new();
//! let mut events = bus.listen();
//!
//! bus.publish(EdgeEvent::EdgeAdded { edge_id: EdgeId::new("edge0") });
//! assert!(events.try_recv().is_some_and(|e| e.is_lifecycle()));
//! ```

mod edge_event;
mod edge_id;
mod event_bus;

pub use edge_event::EdgeEvent;
pub use edge_id::EdgeId;
pub use event_bus::{EventBus, EventStream};
