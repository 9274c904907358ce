// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scoped ownership of a subscription.

use std::fmt;
use std::sync::Weak;

use crate::subscription::SubscriptionHandle;

use super::dispatcher::DispatcherInner;

/// Keeps a subscription alive for as long as it is held.
///
/// Dropping the guard unsubscribes, so a widget that owns its guard cannot
/// leak channels on any exit path. Use [`release`](Self::release) to
/// unsubscribe explicitly.
#[must_use = "dropping the guard unsubscribes immediately"]
pub struct SubscriptionGuard {
    handle: SubscriptionHandle,
    dispatcher: Weak<DispatcherInner>,
    released: bool,
}

impl SubscriptionGuard {
    pub(super) fn new(handle: SubscriptionHandle, dispatcher: Weak<DispatcherInner>) -> Self {
        Self {
            handle,
            dispatcher,
            released: false,
        }
    }

    /// Returns the handle of the guarded subscription.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    /// Unsubscribes now.
    ///
    /// Returns `false` if the subscription was already gone, e.g. replaced
    /// by a newer registration of the same subscriber.
    pub fn release(mut self) -> bool {
        self.unsubscribe()
    }

    fn unsubscribe(&mut self) -> bool {
        if std::mem::replace(&mut self.released, true) {
            return false;
        }
        self.dispatcher
            .upgrade()
            .is_some_and(|inner| inner.unsubscribe(self.handle))
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("handle", &self.handle)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}
