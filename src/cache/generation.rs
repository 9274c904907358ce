// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Snapshots received from an edge and the immutable generations built from them.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::types::{ChannelAddress, ChannelValue};

/// One batch of channel values pushed by the edge.
///
/// A `None` value means the edge reported the channel as unknown (`null`).
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Sequence number assigned by the edge within one connection.
    pub sequence: u64,
    /// Reported values, keyed by address.
    pub values: BTreeMap<ChannelAddress, Option<ChannelValue>>,
    /// When the snapshot was received.
    pub received_at: DateTime<Utc>,
}

impl Snapshot {
    /// Creates a snapshot stamped with the current time.
    #[must_use]
    pub fn new(sequence: u64, values: BTreeMap<ChannelAddress, Option<ChannelValue>>) -> Self {
        Self {
            sequence,
            values,
            received_at: Utc::now(),
        }
    }
}

/// An immutable state of the cache.
///
/// Each applied snapshot produces a new generation. Published generations
/// are shared behind `Arc` and never mutated, so every reader of one
/// generation observes the same values.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    number: u64,
    sequence: Option<u64>,
    received_at: Option<DateTime<Utc>>,
    values: Arc<HashMap<ChannelAddress, ChannelValue>>,
    touched: Arc<BTreeSet<ChannelAddress>>,
}

impl Generation {
    /// Builds the successor of `self` by merging `snapshot` into it.
    pub(crate) fn next(&self, snapshot: Snapshot) -> Self {
        let mut values = HashMap::clone(&self.values);
        let mut touched = BTreeSet::new();
        for (address, value) in snapshot.values {
            match value {
                Some(value) => {
                    values.insert(address.clone(), value);
                }
                None => {
                    values.remove(&address);
                }
            }
            touched.insert(address);
        }
        Self {
            number: self.number + 1,
            sequence: Some(snapshot.sequence),
            received_at: Some(snapshot.received_at),
            values: Arc::new(values),
            touched: Arc::new(touched),
        }
    }

    /// Returns the generation number. The empty initial generation is 0.
    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Returns the sequence number of the snapshot that produced this generation.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    /// Returns when the snapshot that produced this generation was received.
    #[must_use]
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    /// Returns the known value of an address.
    #[must_use]
    pub fn get(&self, address: &ChannelAddress) -> Option<&ChannelValue> {
        self.values.get(address)
    }

    /// Returns the addresses reported by the snapshot that produced this generation.
    #[must_use]
    pub fn touched(&self) -> &BTreeSet<ChannelAddress> {
        &self.touched
    }

    /// Returns `true` if the producing snapshot reported any of `addresses`.
    #[must_use]
    pub fn touches_any(&self, addresses: &BTreeSet<ChannelAddress>) -> bool {
        if addresses.len() < self.touched.len() {
            addresses.iter().any(|a| self.touched.contains(a))
        } else {
            self.touched.iter().any(|a| addresses.contains(a))
        }
    }

    /// Returns the number of addresses with a known value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no address has a known value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&ChannelAddress, &ChannelValue)> {
        self.values.iter()
    }
}
