// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identifiers used by the subscription registry.
//!
//! - [`SubscriberId`] - caller-chosen name of a subscriber (usually a widget)
//! - [`SubscriptionHandle`] - registry-issued token used to unregister

use std::fmt;
use std::sync::Arc;

/// Caller-chosen identifier of a subscriber.
///
/// A subscriber re-registering under the same id replaces its previous
/// declaration, so ids should be stable for the lifetime of a widget.
///
/// # Examples
///
/// ```
/// use edge_live::subscription::SubscriberId;
///
/// let id = SubscriberId::from("grid-optimized-charge/flat");
/// assert_eq!(id.as_str(), "grid-optimized-charge/flat");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(Arc<str>);

impl SubscriberId {
    /// Creates a subscriber id.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriberId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SubscriberId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

/// Token identifying one registration.
///
/// Handles are issued in increasing order, which doubles as the
/// registration order used when fanning out updates. A handle goes stale
/// once its registration is replaced or unregistered; using a stale handle
/// is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw handle value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_display() {
        assert_eq!(SubscriptionHandle::new(42).to_string(), "Sub(42)");
    }

    #[test]
    fn handles_order_by_issue() {
        assert!(SubscriptionHandle::new(1) < SubscriptionHandle::new(2));
    }

    #[test]
    fn subscriber_id_from_string_types() {
        let a = SubscriberId::from("widget");
        let b = SubscriberId::from(String::from("widget"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "widget");
    }
}
