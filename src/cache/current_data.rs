// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read-only views handed to subscribers.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::types::{ChannelAddress, ChannelValue};

use super::Generation;

/// Which component a view treats as "this" component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewScope {
    component_id: Option<Arc<str>>,
}

impl ViewScope {
    /// Scope bound to one component.
    #[must_use]
    pub fn component(component_id: &str) -> Self {
        Self {
            component_id: Some(Arc::from(component_id)),
        }
    }

    /// Scope without a primary component.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Returns the primary component, if any.
    #[must_use]
    pub fn component_id(&self) -> Option<&str> {
        self.component_id.as_deref()
    }
}

/// Consistent view of one cache generation.
///
/// Both accessors read the same generation, so values obtained through
/// [`this_component`](Self::this_component) and
/// [`all_components`](Self::all_components) always belong to the same
/// update. Addresses the edge never reported, or reported as `null`, read
/// as `None`.
///
/// # Examples
///
/// ```
/// use edge_live::cache::{CurrentDataCache, Snapshot, ViewScope};
/// use edge_live::types::{ChannelAddress, ChannelValue};
///
/// let cache = CurrentDataCache::new();
/// cache.apply_snapshot(Snapshot::new(
///     1,
///     [(ChannelAddress::new("ctrl0", "Mode"), Some(ChannelValue::from("AUTOMATIC")))].into(),
/// ));
///
/// let data = cache.view(ViewScope::component("ctrl0"));
/// assert_eq!(data.this_component("Mode").and_then(|v| v.as_str()), Some("AUTOMATIC"));
/// assert_eq!(data.all_components("ctrl0/Mode"), data.this_component("Mode"));
/// assert!(data.all_components("ess0/Capacity").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct CurrentData {
    generation: Arc<Generation>,
    scope: ViewScope,
}

impl CurrentData {
    /// Creates a view over `generation`.
    #[must_use]
    pub fn new(generation: Arc<Generation>, scope: ViewScope) -> Self {
        Self { generation, scope }
    }

    /// Reads a channel of the view's primary component.
    ///
    /// Always `None` for views without a primary component.
    #[must_use]
    pub fn this_component(&self, channel_id: &str) -> Option<&ChannelValue> {
        let component_id = self.scope.component_id()?;
        self.generation
            .get(&ChannelAddress::new(component_id, channel_id))
    }

    /// Reads any channel by its `componentId/channelId` key.
    ///
    /// Malformed keys read as `None`.
    #[must_use]
    pub fn all_components(&self, key: &str) -> Option<&ChannelValue> {
        let address: ChannelAddress = key.parse().ok()?;
        self.generation.get(&address)
    }

    /// Reads any channel by address.
    #[must_use]
    pub fn get(&self, address: &ChannelAddress) -> Option<&ChannelValue> {
        self.generation.get(address)
    }

    /// Returns every known channel of the primary component, keyed by channel id.
    #[must_use]
    pub fn this_component_map(&self) -> BTreeMap<&str, &ChannelValue> {
        let Some(component_id) = self.scope.component_id() else {
            return BTreeMap::new();
        };
        self.generation
            .iter()
            .filter(|(address, _)| address.is_in_component(component_id))
            .map(|(address, value)| (address.channel_id(), value))
            .collect()
    }

    /// Returns every known channel, keyed by `componentId/channelId`.
    #[must_use]
    pub fn all_components_map(&self) -> BTreeMap<String, &ChannelValue> {
        self.generation
            .iter()
            .map(|(address, value)| (address.to_string(), value))
            .collect()
    }

    /// Returns the generation number this view reads.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.number()
    }

    /// Returns the scope of this view.
    #[must_use]
    pub fn scope(&self) -> &ViewScope {
        &self.scope
    }

    /// Returns the primary component of this view.
    #[must_use]
    pub fn component_id(&self) -> Option<&str> {
        self.scope.component_id()
    }
}
