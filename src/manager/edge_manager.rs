// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Edge manager for coordinating multiple edges.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::edge::Edge;
use crate::error::Error;
use crate::event::{EdgeEvent, EdgeId, EventBus, EventStream};
use crate::protocol::Connector;

use super::EdgeConfig;

/// Manager for coordinating multiple edges.
///
/// Every managed [`Edge`] publishes its connection and subscription events
/// on the manager's event bus, so one receiver observes all of them.
///
/// # Examples
///
/// ```no_run
/// use edge_live::manager::{EdgeConfig, EdgeManager};
///
/// #[tokio::main]
/// async fn main() -> edge_live::Result<()> {
///     let manager = EdgeManager::new();
///
///     let mut events = manager.subscribe_events();
///     tokio::spawn(async move {
///         while let Some(event) = events.recv().await {
///             println!("Event: {:?}", event);
///         }
///     });
///
///     let edge = manager
///         .add_edge(EdgeConfig::websocket("edge0", "ws://192.168.1.20:8085/websocket"))
///         .await?;
///     println!("{}", edge.connection_state());
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct EdgeManager {
    /// Managed edges, keyed by edge ID.
    edges: Arc<RwLock<HashMap<EdgeId, Edge>>>,
    /// Event bus shared with every managed edge.
    event_bus: EventBus,
}

impl EdgeManager {
    /// Creates a new edge manager.
    #[must_use]
    pub fn new() -> Self {
        Self::with_event_bus(EventBus::new())
    }

    /// Creates a new edge manager with custom event bus capacity.
    #[must_use]
    pub fn with_capacity(event_capacity: usize) -> Self {
        Self::with_event_bus(EventBus::with_capacity(event_capacity))
    }

    fn with_event_bus(event_bus: EventBus) -> Self {
        Self {
            edges: Arc::new(RwLock::new(HashMap::new())),
            event_bus,
        }
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Subscribes to events of all managed edges.
    #[must_use]
    pub fn subscribe_events(&self) -> EventStream {
        self.event_bus.listen()
    }

    /// Returns the number of live event listeners, including per-edge ones.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.event_bus.listener_count()
    }

    // =========================================================================
    // Edge Management
    // =========================================================================

    /// Adds an edge, connecting with the transport named in `config`.
    ///
    /// # Errors
    ///
    /// Returns `Error::EdgeExists` if an edge with the same ID is managed,
    /// or a protocol error if the connection settings are invalid.
    pub async fn add_edge(&self, config: EdgeConfig) -> Result<Edge, Error> {
        let mut edges = self.edges.write().await;
        if edges.contains_key(&config.edge_id) {
            return Err(Error::EdgeExists(config.edge_id.to_string()));
        }
        let edge = Edge::connect_with_events(config, self.event_bus.clone())?;
        Ok(self.insert(&mut edges, edge))
    }

    /// Adds an edge that connects through a custom connector.
    ///
    /// # Errors
    ///
    /// Returns `Error::EdgeExists` if an edge with the same ID is managed.
    pub async fn add_edge_with_connector<C: Connector>(
        &self,
        config: EdgeConfig,
        connector: C,
    ) -> Result<Edge, Error> {
        let mut edges = self.edges.write().await;
        if edges.contains_key(&config.edge_id) {
            return Err(Error::EdgeExists(config.edge_id.to_string()));
        }
        let edge = Edge::with_connector(config, connector, self.event_bus.clone());
        Ok(self.insert(&mut edges, edge))
    }

    fn insert(&self, edges: &mut HashMap<EdgeId, Edge>, edge: Edge) -> Edge {
        let edge_id = edge.id().clone();
        edges.insert(edge_id.clone(), edge.clone());
        tracing::info!(edge = %edge_id, "Edge added");
        self.event_bus.publish(EdgeEvent::edge_added(edge_id));
        edge
    }

    /// Removes an edge and shuts its connection down.
    ///
    /// # Errors
    ///
    /// Returns `Error::EdgeNotFound` if no such edge is managed.
    pub async fn remove_edge(&self, edge_id: &EdgeId) -> Result<(), Error> {
        let edge = self
            .edges
            .write()
            .await
            .remove(edge_id)
            .ok_or_else(|| Error::EdgeNotFound(edge_id.to_string()))?;

        edge.shutdown();
        tracing::info!(edge = %edge_id, "Edge removed");
        self.event_bus.publish(EdgeEvent::edge_removed(edge_id.clone()));
        Ok(())
    }

    /// Returns a handle to a managed edge.
    pub async fn edge(&self, edge_id: &EdgeId) -> Option<Edge> {
        self.edges.read().await.get(edge_id).cloned()
    }

    /// Returns the IDs of all managed edges, sorted.
    pub async fn edge_ids(&self) -> Vec<EdgeId> {
        let mut ids: Vec<EdgeId> = self.edges.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the number of managed edges.
    pub async fn edge_count(&self) -> usize {
        self.edges.read().await.len()
    }

    /// Shuts down and removes every edge.
    pub async fn shutdown_all(&self) {
        let drained: Vec<(EdgeId, Edge)> = self.edges.write().await.drain().collect();
        for (edge_id, edge) in drained {
            edge.shutdown();
            self.event_bus.publish(EdgeEvent::edge_removed(edge_id));
        }
    }
}

impl Default for EdgeManager {
    fn default() -> Self {
        Self::new()
    }
}
