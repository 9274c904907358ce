// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fan-out of cache generations to subscriber callbacks.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{ReentrantMutex, RwLock};

use crate::cache::{CurrentData, CurrentDataCache, Generation, ViewScope};
use crate::subscription::{SubscriberId, SubscriptionHandle, SubscriptionRegistry};
use crate::types::ChannelAddress;

use super::SubscriptionGuard;

/// Type alias for update callbacks.
type UpdateCallback = Arc<dyn Fn(&CurrentData) + Send + Sync>;

struct Slot {
    subscriber_id: SubscriberId,
    scope: ViewScope,
    addresses: BTreeSet<ChannelAddress>,
    primed: AtomicBool,
    /// Held while the callback runs. Cleared by unsubscribe.
    active: ReentrantMutex<Cell<bool>>,
    callback: UpdateCallback,
}

impl Slot {
    fn deactivate(&self) {
        // Blocks until a callback running on another thread returns;
        // re-entrant so a callback may unsubscribe itself.
        self.active.lock().set(false);
    }
}

pub(crate) struct DispatcherInner {
    registry: Arc<SubscriptionRegistry>,
    cache: Arc<CurrentDataCache>,
    slots: RwLock<BTreeMap<SubscriptionHandle, Arc<Slot>>>,
}

impl DispatcherInner {
    pub(super) fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let removed = self.slots.write().remove(&handle);
        let unregistered = self.registry.unregister(handle);
        match removed {
            Some(slot) => {
                tracing::debug!(subscriber = %slot.subscriber_id, %handle, "Unsubscribed");
                slot.deactivate();
                true
            }
            None => unregistered,
        }
    }
}

/// Delivers cache updates to subscriber callbacks.
///
/// Subscribing registers the addresses with the [`SubscriptionRegistry`]
/// and stores the callback. Each published generation is delivered to
/// every *primed* subscriber in registration order. A subscriber becomes
/// primed once a snapshot reporting at least one of its addresses has been
/// applied, which keeps it from seeing a view that lacks everything it
/// asked for.
///
/// The dispatcher is a cheap handle; clones share the same subscribers.
#[derive(Clone)]
pub struct SubscriberDispatcher {
    inner: Arc<DispatcherInner>,
}

impl SubscriberDispatcher {
    /// Creates a dispatcher over a registry and cache.
    #[must_use]
    pub fn new(registry: Arc<SubscriptionRegistry>, cache: Arc<CurrentDataCache>) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                registry,
                cache,
                slots: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    /// Subscribes to a set of addresses.
    ///
    /// The view's primary component is the component of the first address.
    /// Subscribing again under the same `subscriber_id` replaces the
    /// previous subscription.
    pub fn subscribe<F>(
        &self,
        subscriber_id: SubscriberId,
        addresses: impl IntoIterator<Item = ChannelAddress>,
        on_update: F,
    ) -> SubscriptionGuard
    where
        F: Fn(&CurrentData) + Send + Sync + 'static,
    {
        let addresses: Vec<_> = addresses.into_iter().collect();
        let registered = addresses.clone();
        self.install(subscriber_id, addresses, Arc::new(on_update), |registry, id| {
            registry.register(id, registered)
        })
    }

    /// Subscribes with an explicit primary component.
    pub fn subscribe_component<F>(
        &self,
        subscriber_id: SubscriberId,
        component_id: &str,
        addresses: impl IntoIterator<Item = ChannelAddress>,
        on_update: F,
    ) -> SubscriptionGuard
    where
        F: Fn(&CurrentData) + Send + Sync + 'static,
    {
        let addresses: Vec<_> = addresses.into_iter().collect();
        let registered = addresses.clone();
        self.install(subscriber_id, addresses, Arc::new(on_update), |registry, id| {
            registry.register_with_component(id, component_id, registered)
        })
    }

    /// Registers and installs the slot under one write lock, so concurrent
    /// subscribes for the same id leave registry and slots in agreement.
    fn install(
        &self,
        subscriber_id: SubscriberId,
        addresses: Vec<ChannelAddress>,
        callback: UpdateCallback,
        register: impl FnOnce(&SubscriptionRegistry, SubscriberId) -> SubscriptionHandle,
    ) -> SubscriptionGuard {
        let (handle, replaced) = {
            let mut slots = self.inner.slots.write();
            let handle = register(&self.inner.registry, subscriber_id.clone());
            let scope = self
                .inner
                .registry
                .scope_of(&subscriber_id)
                .unwrap_or_default();

            let stale: Vec<_> = slots
                .iter()
                .filter(|(_, slot)| slot.subscriber_id == subscriber_id)
                .map(|(handle, _)| *handle)
                .collect();
            let replaced: Vec<Arc<Slot>> = stale
                .into_iter()
                .filter_map(|handle| slots.remove(&handle))
                .collect();

            // An empty declaration leaves nothing to deliver
            if self.inner.registry.subscriber_of(handle).is_some() {
                slots.insert(
                    handle,
                    Arc::new(Slot {
                        subscriber_id: subscriber_id.clone(),
                        scope,
                        addresses: addresses.into_iter().collect(),
                        primed: AtomicBool::new(false),
                        active: ReentrantMutex::new(Cell::new(true)),
                        callback,
                    }),
                );
            }
            (handle, replaced)
        };

        for slot in replaced {
            slot.deactivate();
        }

        tracing::debug!(subscriber = %subscriber_id, %handle, "Subscribed");
        SubscriptionGuard::new(handle, Arc::downgrade(&self.inner))
    }

    /// Removes a subscription.
    ///
    /// No callback for `handle` starts after this returns, and a callback
    /// already running on another thread is waited for. Returns `false` for
    /// unknown or already-removed handles.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.inner.unsubscribe(handle)
    }

    /// Delivers a generation to every primed subscriber, in registration order.
    ///
    /// A callback that panics is switched off; the others keep receiving.
    pub fn publish(&self, generation: &Arc<Generation>) {
        let slots: Vec<(SubscriptionHandle, Arc<Slot>)> = self
            .inner
            .slots
            .read()
            .iter()
            .map(|(handle, slot)| (*handle, Arc::clone(slot)))
            .collect();

        for (handle, slot) in slots {
            let active = slot.active.lock();
            if !active.get() {
                continue;
            }
            if !slot.primed.load(Ordering::Acquire) {
                if !generation.touches_any(&slot.addresses) {
                    continue;
                }
                slot.primed.store(true, Ordering::Release);
                tracing::trace!(subscriber = %slot.subscriber_id, %handle, "Subscriber primed");
            }
            let data = CurrentData::new(Arc::clone(generation), slot.scope.clone());
            if panic::catch_unwind(AssertUnwindSafe(|| (slot.callback)(&data))).is_err() {
                tracing::error!(
                    subscriber = %slot.subscriber_id,
                    %handle,
                    "Subscriber callback panicked; no further updates are delivered to it"
                );
                active.set(false);
            }
            drop(active);
        }
    }

    /// Returns the latest view for a registered subscriber.
    #[must_use]
    pub fn view(&self, subscriber_id: &SubscriberId) -> Option<CurrentData> {
        let scope = self.inner.registry.scope_of(subscriber_id)?;
        Some(self.inner.cache.view(scope))
    }

    /// Returns the number of active subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.slots.read().len()
    }

    /// Returns `true` if there are no active subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.slots.read().is_empty()
    }
}

impl std::fmt::Debug for SubscriberDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberDispatcher")
            .field("subscriptions", &self.len())
            .finish_non_exhaustive()
    }
}
