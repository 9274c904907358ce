// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Edge event types.

use crate::protocol::ConnectionState;

use super::EdgeId;

/// Events emitted by edges and the edge manager.
///
/// # Examples
///
/// ```
/// use edge_live::event::{EdgeEvent, EdgeId};
/// use edge_live::ConnectionState;
///
/// let edge_id = EdgeId::new("edge0");
///
/// let added = EdgeEvent::edge_added(edge_id.clone());
/// assert!(added.is_lifecycle());
///
/// let changed = EdgeEvent::connection_changed(edge_id, ConnectionState::Connected);
/// assert!(changed.is_connection());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeEvent {
    /// An edge was added to the manager.
    EdgeAdded {
        /// The added edge.
        edge_id: EdgeId,
    },

    /// An edge was removed from the manager.
    EdgeRemoved {
        /// The removed edge.
        edge_id: EdgeId,
    },

    /// The transport session changed connection state.
    ConnectionChanged {
        /// The edge.
        edge_id: EdgeId,
        /// The new state.
        state: ConnectionState,
    },

    /// A `subscribeChannels` request was sent.
    SubscriptionSent {
        /// The edge.
        edge_id: EdgeId,
        /// Running request count of the session.
        count: u64,
        /// Number of channels in the request.
        channels: usize,
    },

    /// The edge rejected a subscription request.
    ///
    /// Rejections do not go away by retrying; they usually point at a
    /// permission or configuration problem the user has to fix.
    SubscriptionRejected {
        /// The edge.
        edge_id: EdgeId,
        /// JSON-RPC error code.
        code: i64,
        /// Reason reported by the edge.
        message: String,
    },
}

impl EdgeEvent {
    /// Returns the edge associated with this event.
    #[must_use]
    pub fn edge_id(&self) -> &EdgeId {
        match self {
            Self::EdgeAdded { edge_id }
            | Self::EdgeRemoved { edge_id }
            | Self::ConnectionChanged { edge_id, .. }
            | Self::SubscriptionSent { edge_id, .. }
            | Self::SubscriptionRejected { edge_id, .. } => edge_id,
        }
    }

    /// Returns `true` if this is an edge lifecycle event (added/removed).
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::EdgeAdded { .. } | Self::EdgeRemoved { .. })
    }

    /// Returns `true` if this is a connection event.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionChanged { .. })
    }

    /// Returns `true` if this is a subscription event.
    #[must_use]
    pub fn is_subscription(&self) -> bool {
        matches!(
            self,
            Self::SubscriptionSent { .. } | Self::SubscriptionRejected { .. }
        )
    }

    /// Creates an edge added event.
    #[must_use]
    pub fn edge_added(edge_id: EdgeId) -> Self {
        Self::EdgeAdded { edge_id }
    }

    /// Creates an edge removed event.
    #[must_use]
    pub fn edge_removed(edge_id: EdgeId) -> Self {
        Self::EdgeRemoved { edge_id }
    }

    /// Creates a connection changed event.
    #[must_use]
    pub fn connection_changed(edge_id: EdgeId, state: ConnectionState) -> Self {
        Self::ConnectionChanged { edge_id, state }
    }
}
