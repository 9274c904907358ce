// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry merging per-subscriber channel declarations into one union.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::cache::ViewScope;
use crate::types::ChannelAddress;

use super::handle::{SubscriberId, SubscriptionHandle};

/// One subscriber's current declaration.
#[derive(Debug, Clone)]
struct Entry {
    handle: SubscriptionHandle,
    scope: ViewScope,
    addresses: Arc<BTreeSet<ChannelAddress>>,
}

#[derive(Debug, Default)]
struct RegistryState {
    entries: HashMap<SubscriberId, Entry>,
    owners: HashMap<SubscriptionHandle, SubscriberId>,
    /// Reference count per address. Its key set is the union.
    counts: BTreeMap<ChannelAddress, usize>,
    version: u64,
}

impl RegistryState {
    /// Returns `true` when the address entered the union.
    fn acquire(&mut self, address: &ChannelAddress) -> bool {
        let count = self.counts.entry(address.clone()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Returns `true` when the address left the union.
    fn release(&mut self, address: &ChannelAddress) -> bool {
        match self.counts.get_mut(address) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.counts.remove(address);
                true
            }
            None => false,
        }
    }

    fn remove_entry(&mut self, subscriber_id: &SubscriberId) -> bool {
        let Some(entry) = self.entries.remove(subscriber_id) else {
            return false;
        };
        self.owners.remove(&entry.handle);
        let mut changed = false;
        for address in entry.addresses.iter() {
            changed |= self.release(address);
        }
        changed
    }
}

/// Merges the channel declarations of many independent subscribers.
///
/// Each subscriber owns exactly one declaration. Registering again under the
/// same [`SubscriberId`] replaces the previous set rather than merging into
/// it, and issues a fresh [`SubscriptionHandle`]. The union of all
/// declarations is maintained with per-address reference counts, so a
/// mutation only costs as much as the entry it touches.
///
/// Every change of the union bumps a version published on a
/// [`watch`] channel; the subscription pump uses it to coalesce bursts of
/// registrations into a single request to the edge.
///
/// # Examples
///
/// ```
/// use edge_live::subscription::SubscriptionRegistry;
/// use edge_live::types::ChannelAddress;
///
/// let registry = SubscriptionRegistry::new();
/// let soc = ChannelAddress::new("_sum", "EssSoc");
///
/// let a = registry.register("a".into(), [soc.clone()]);
/// let b = registry.register("b".into(), [soc.clone()]);
/// assert_eq!(registry.current_union().len(), 1);
///
/// registry.unregister(a);
/// assert!(registry.current_union().contains(&soc));
/// registry.unregister(b);
/// assert!(registry.current_union().is_empty());
/// ```
pub struct SubscriptionRegistry {
    next_handle: AtomicU64,
    state: Mutex<RegistryState>,
    version_tx: watch::Sender<u64>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            next_handle: AtomicU64::new(1),
            state: Mutex::new(RegistryState::default()),
            version_tx,
        }
    }

    fn next_handle(&self) -> SubscriptionHandle {
        SubscriptionHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Declares the full set of addresses a subscriber wants.
    ///
    /// The primary component of the subscriber's view is the component of
    /// the first address yielded. An empty set removes the subscriber; the
    /// returned handle is then already stale.
    pub fn register(
        &self,
        subscriber_id: SubscriberId,
        addresses: impl IntoIterator<Item = ChannelAddress>,
    ) -> SubscriptionHandle {
        let mut addresses = addresses.into_iter().peekable();
        let scope = match addresses.peek() {
            Some(first) => ViewScope::component(first.component_id()),
            None => ViewScope::all(),
        };
        self.insert(subscriber_id, scope, addresses.collect())
    }

    /// Declares the full set of addresses with an explicit primary component.
    pub fn register_with_component(
        &self,
        subscriber_id: SubscriberId,
        component_id: &str,
        addresses: impl IntoIterator<Item = ChannelAddress>,
    ) -> SubscriptionHandle {
        self.insert(
            subscriber_id,
            ViewScope::component(component_id),
            addresses.into_iter().collect(),
        )
    }

    fn insert(
        &self,
        subscriber_id: SubscriberId,
        scope: ViewScope,
        addresses: BTreeSet<ChannelAddress>,
    ) -> SubscriptionHandle {
        let handle = self.next_handle();
        let mut state = self.state.lock();
        let mut changed = false;

        // Acquire before releasing so addresses kept across the
        // replacement never leave the union.
        for address in &addresses {
            changed |= state.acquire(address);
        }
        changed |= state.remove_entry(&subscriber_id);

        tracing::trace!(
            subscriber = %subscriber_id,
            %handle,
            addresses = addresses.len(),
            "Registering subscriber"
        );

        if !addresses.is_empty() {
            state.owners.insert(handle, subscriber_id.clone());
            state.entries.insert(
                subscriber_id,
                Entry {
                    handle,
                    scope,
                    addresses: Arc::new(addresses),
                },
            );
        }

        if changed {
            self.bump(&mut state);
        }
        handle
    }

    /// Removes the registration identified by `handle`.
    ///
    /// Returns `false` for stale or already-released handles.
    pub fn unregister(&self, handle: SubscriptionHandle) -> bool {
        let mut state = self.state.lock();
        let Some(subscriber_id) = state.owners.get(&handle).cloned() else {
            return false;
        };
        tracing::trace!(subscriber = %subscriber_id, %handle, "Unregistering subscriber");
        if state.remove_entry(&subscriber_id) {
            self.bump(&mut state);
        }
        true
    }

    fn bump(&self, state: &mut RegistryState) {
        state.version += 1;
        self.version_tx.send_replace(state.version);
    }

    /// Returns the deduplicated union of every declared address.
    #[must_use]
    pub fn current_union(&self) -> BTreeSet<ChannelAddress> {
        self.state.lock().counts.keys().cloned().collect()
    }

    /// Returns `true` if any subscriber currently declares `address`.
    #[must_use]
    pub fn contains(&self, address: &ChannelAddress) -> bool {
        self.state.lock().counts.contains_key(address)
    }

    /// Returns the addresses declared by a subscriber.
    #[must_use]
    pub fn addresses_of(&self, subscriber_id: &SubscriberId) -> Option<Arc<BTreeSet<ChannelAddress>>> {
        self.state
            .lock()
            .entries
            .get(subscriber_id)
            .map(|entry| Arc::clone(&entry.addresses))
    }

    /// Returns the view scope of a subscriber.
    #[must_use]
    pub fn scope_of(&self, subscriber_id: &SubscriberId) -> Option<ViewScope> {
        self.state
            .lock()
            .entries
            .get(subscriber_id)
            .map(|entry| entry.scope.clone())
    }

    /// Returns the subscriber owning a live handle.
    #[must_use]
    pub fn subscriber_of(&self, handle: SubscriptionHandle) -> Option<SubscriberId> {
        self.state.lock().owners.get(&handle).cloned()
    }

    /// Returns the number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns `true` if no subscriber is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Returns the current union version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.lock().version
    }

    /// Returns a receiver notified whenever the union changes.
    #[must_use]
    pub fn watch_changes(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SubscriptionRegistry")
            .field("subscribers", &state.entries.len())
            .field("union", &state.counts.len())
            .field("version", &state.version)
            .finish_non_exhaustive()
    }
}
