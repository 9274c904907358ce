// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared event channel between edges and their manager.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use super::{EdgeEvent, EdgeId};

const DEFAULT_CAPACITY: usize = 256;

/// Fan-out channel for [`EdgeEvent`]s.
///
/// A manager hands clones of one bus to every edge it creates, so a single
/// listener sees the whole fleet. Listeners that fall more than the bus
/// capacity behind lose the oldest events.
///
/// # Examples
///
/// ```
/// use edge_live::event::{EdgeEvent, EdgeId, EventBus};
///
/// let bus = EventBus::new();
/// let mut edge0 = bus.listen_to(EdgeId::new("edge0"));
///
/// bus.publish(EdgeEvent::edge_added(EdgeId::new("edge1")));
/// bus.publish(EdgeEvent::edge_added(EdgeId::new("edge0")));
///
/// let event = edge0.try_recv().unwrap();
/// assert_eq!(event.edge_id().as_str(), "edge0");
/// assert!(edge0.try_recv().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EdgeEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to 256 events per listener.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a bus buffering up to `capacity` events per listener.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns the raw broadcast receiver, including lag notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EdgeEvent> {
        self.sender.subscribe()
    }

    /// Listens to events of every edge on this bus.
    #[must_use]
    pub fn listen(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
            edge_id: None,
        }
    }

    /// Listens to events of a single edge.
    #[must_use]
    pub fn listen_to(&self, edge_id: EdgeId) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
            edge_id: Some(edge_id),
        }
    }

    /// Number of live listeners across all clones of this bus.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event. Events without listeners are dropped.
    pub fn publish(&self, event: EdgeEvent) {
        tracing::trace!(edge = %event.edge_id(), ?event, "Publishing edge event");
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of an [`EventBus`], optionally narrowed to one edge.
///
/// Lagging is logged and skipped rather than surfaced, so `recv` only
/// ends once every clone of the bus is gone.
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<EdgeEvent>,
    edge_id: Option<EdgeId>,
}

impl EventStream {
    /// Waits for the next matching event, or `None` once the bus is closed.
    pub async fn recv(&mut self) -> Option<EdgeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event listener lagged behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next matching event that is already buffered.
    pub fn try_recv(&mut self) -> Option<EdgeEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event listener lagged behind");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// The edge this stream is narrowed to, if any.
    #[must_use]
    pub fn edge_id(&self) -> Option<&EdgeId> {
        self.edge_id.as_ref()
    }

    fn accepts(&self, event: &EdgeEvent) -> bool {
        self.edge_id.as_ref().is_none_or(|id| event.edge_id() == id)
    }
}
