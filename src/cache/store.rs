// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Canonical per-edge store of the latest channel values.

use std::sync::Arc;

use parking_lot::RwLock;

use super::{CurrentData, Generation, Snapshot, ViewScope};

/// Latest known value of every channel reported by one edge.
///
/// Snapshots are merged copy-on-write: applying one builds a new
/// [`Generation`] and swaps it in, leaving views of older generations
/// untouched. Values survive connection loss; only a newer report
/// replaces them.
#[derive(Debug, Default)]
pub struct CurrentDataCache {
    current: RwLock<Arc<Generation>>,
}

impl CurrentDataCache {
    /// Creates an empty cache at generation 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a snapshot and publishes the resulting generation.
    ///
    /// Only addresses present in the snapshot change; a `None` value marks
    /// the address as unknown again.
    pub fn apply_snapshot(&self, snapshot: Snapshot) -> Arc<Generation> {
        let mut current = self.current.write();
        let next = Arc::new(current.next(snapshot));
        tracing::trace!(
            generation = next.number(),
            sequence = ?next.sequence(),
            touched = next.touched().len(),
            "Applied snapshot"
        );
        *current = Arc::clone(&next);
        next
    }

    /// Returns a view of the latest generation.
    #[must_use]
    pub fn view(&self, scope: ViewScope) -> CurrentData {
        CurrentData::new(self.current(), scope)
    }

    /// Returns the latest generation.
    #[must_use]
    pub fn current(&self) -> Arc<Generation> {
        Arc::clone(&self.current.read())
    }

    /// Returns the latest generation number.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.current.read().number()
    }

    /// Returns the number of addresses with a known value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    /// Returns `true` if no address has a known value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }
}
