// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Current-data cache.
//!
//! The [`CurrentDataCache`] keeps the latest value of every channel an edge
//! reported. Each applied [`Snapshot`] produces a new immutable
//! [`Generation`]; subscribers read generations through [`CurrentData`]
//! views scoped by a [`ViewScope`].

mod current_data;
mod generation;
mod store;

pub use current_data::{CurrentData, ViewScope};
pub use generation::{Generation, Snapshot};
pub use store::CurrentDataCache;
