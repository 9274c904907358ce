// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Delivery of live data to subscribers.
//!
//! - [`SubscriberDispatcher`] - Fans cache generations out to callbacks
//! - [`SubscriptionGuard`] - Unsubscribes when dropped

mod dispatcher;
mod guard;

pub use dispatcher::SubscriberDispatcher;
pub use guard::SubscriptionGuard;
