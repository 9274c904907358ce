// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ordering gate for `currentData` notifications.

/// Accepts only strictly increasing sequence numbers.
///
/// Edges number notifications per connection, so the session resets the
/// gate whenever a new physical connection is established.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceGate {
    last: Option<u64>,
}

impl SequenceGate {
    /// Creates a gate that accepts any first sequence number.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` and records `sequence` if it is newer than the last accepted one.
    pub fn accept(&mut self, sequence: u64) -> bool {
        if self.last.is_some_and(|last| sequence <= last) {
            return false;
        }
        self.last = Some(sequence);
        true
    }

    /// Forgets the last accepted sequence number.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Returns the last accepted sequence number.
    #[must_use]
    pub fn last(&self) -> Option<u64> {
        self.last
    }
}
