// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoders deriving operational states from raw channel values.
//!
//! A decoder names the channels it needs and turns a [`CurrentData`] view
//! into a typed state. Decoders are pure and total: a channel that has not
//! been reported yet decodes to an explicit "unknown" state, never to a
//! default number.
//!
//! # Examples
//!
//! ```
//! use edge_live::decode::{GridOptimizedChargeDecoder, StateDecoder};
//!
//! let decoder = GridOptimizedChargeDecoder::new("ctrlGridOptimizedCharge0");
//! assert!(!decoder.channel_addresses().is_empty());
//! ```

use std::collections::BTreeSet;

use crate::cache::CurrentData;
use crate::types::ChannelAddress;

pub mod grid_optimized_charge;
mod mode;

pub use grid_optimized_charge::{ChargeState, ChargeStatus, GridOptimizedChargeDecoder};
pub use mode::{MODE_CHANNEL, Mode};

/// Derives a typed state from a [`CurrentData`] view.
pub trait StateDecoder {
    /// The decoded state.
    type Output;

    /// Returns the channels this decoder reads.
    fn channel_addresses(&self) -> BTreeSet<ChannelAddress>;

    /// Decodes the current values.
    ///
    /// Must not fail: missing or unrecognized values decode to an explicit
    /// unknown state.
    fn decode(&self, data: &CurrentData) -> Self::Output;
}
