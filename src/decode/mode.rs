// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Operating mode of a controller component.

use std::fmt;

use crate::types::ChannelValue;

/// Channel carrying the configured operating mode of a controller.
pub const MODE_CHANNEL: &str = "_PropertyMode";

/// Operating mode reported through the `_PropertyMode` channel.
///
/// | Text        | Mode                 |
/// |-------------|----------------------|
/// | `MANUAL`    | [`Mode::Manual`]     |
/// | `OFF`       | [`Mode::Off`]        |
/// | `AUTOMATIC` | [`Mode::Automatic`]  |
///
/// Anything else, including a missing value, decodes as [`Mode::Unknown`].
///
/// # Examples
///
/// ```
/// use edge_live::decode::Mode;
/// use edge_live::types::ChannelValue;
///
/// let value = ChannelValue::from("AUTOMATIC");
/// assert_eq!(Mode::from_value(Some(&value)), Mode::Automatic);
/// assert_eq!(Mode::from_value(None), Mode::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Controller follows fixed, manually configured parameters.
    Manual,
    /// Controller is switched off.
    Off,
    /// Controller computes its parameters automatically.
    Automatic,
    /// Mode not reported yet, or not recognized.
    #[default]
    Unknown,
}

impl Mode {
    /// Parses the textual mode. Matching is exact, as sent by the edge.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text {
            "MANUAL" => Self::Manual,
            "OFF" => Self::Off,
            "AUTOMATIC" => Self::Automatic,
            _ => Self::Unknown,
        }
    }

    /// Decodes a raw channel value. Non-textual values decode as unknown.
    #[must_use]
    pub fn from_value(value: Option<&ChannelValue>) -> Self {
        value
            .and_then(ChannelValue::as_str)
            .map_or(Self::Unknown, Self::parse)
    }

    /// Returns the wire spelling, or `"UNKNOWN"`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::Off => "OFF",
            Self::Automatic => "AUTOMATIC",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns `true` if the mode is known.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
