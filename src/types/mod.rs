// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared by every layer of the library.
//!
//! - [`ChannelAddress`] - `(componentId, channelId)` naming one telemetry point
//! - [`ChannelValue`] - a scalar value reported for a channel

mod channel_address;
mod channel_value;

pub use channel_address::ChannelAddress;
pub use channel_value::ChannelValue;
