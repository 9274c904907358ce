// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscription bookkeeping for live channel data.
//!
//! Many widgets ask an edge for overlapping channels. The edge only accepts
//! one channel set per connection, so declarations are merged here:
//!
//! - [`SubscriberId`] - Stable name chosen by the subscriber
//! - [`SubscriptionHandle`] - Token returned by registration, used to unregister
//! - [`SubscriptionRegistry`] - Reference-counted union of all declarations
//!
//! Most applications go through [`Edge::subscribe`](crate::Edge::subscribe),
//! which registers here and hooks the callback into the dispatcher.

mod handle;
mod registry;

pub use handle::{SubscriberId, SubscriptionHandle};
pub use registry::SubscriptionRegistry;
