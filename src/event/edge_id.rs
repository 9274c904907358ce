// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Edge identifier type.

use std::fmt;
use std::sync::Arc;

/// Identifier of an edge, as assigned by the backend (e.g. `edge0`).
///
/// Cloning is cheap; the name is shared.
///
/// # Examples
///
/// ```
/// use edge_live::event::EdgeId;
///
/// let id = EdgeId::new("edge0");
/// assert_eq!(id.to_string(), "edge0");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(Arc<str>);

impl EdgeId {
    /// Creates an edge identifier.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId({})", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EdgeId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_name() {
        assert_eq!(EdgeId::new("edge0"), EdgeId::from(String::from("edge0")));
        assert_ne!(EdgeId::new("edge0"), EdgeId::new("edge1"));
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", EdgeId::new("edge7")), "EdgeId(edge7)");
    }

    #[test]
    fn hashable() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(EdgeId::new("edge0"));
        assert!(set.contains(&EdgeId::new("edge0")));
    }
}
