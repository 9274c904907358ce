// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scalar values reported for a channel.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar channel value as reported by the edge.
///
/// "Not known" is never a variant of this type: wherever a value may be
/// missing (never reported, or reported as `null`), the API uses
/// `Option<ChannelValue>` so callers can tell "unknown" apart from "zero".
///
/// # Examples
///
/// ```
/// use edge_live::types::ChannelValue;
///
/// let v: ChannelValue = serde_json::from_str("3").unwrap();
/// assert_eq!(v.as_i64(), Some(3));
///
/// let v: ChannelValue = serde_json::from_str("\"AUTOMATIC\"").unwrap();
/// assert_eq!(v.as_str(), Some("AUTOMATIC"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelValue {
    /// Boolean value.
    Bool(bool),
    /// Integral numeric value.
    Integer(i64),
    /// Floating point numeric value.
    Float(f64),
    /// Textual value (enum names, property strings).
    Text(String),
}

impl ChannelValue {
    /// Returns the value as an integer.
    ///
    /// Floats are accepted when they carry no fractional part, since some
    /// edges serialize integral channels as `3.0`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            // Safe: the range check keeps the cast lossless
            #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            Self::Float(v) if v.fract() == 0.0 && v.abs() <= i64::MAX as f64 => Some(*v as i64),
            _ => None,
        }
    }

    /// Returns the value as a float.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            // Channel values stay far below 2^52
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a string slice, if textual.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a boolean.
    ///
    /// Boolean properties are often reported as `0`/`1`; other integers
    /// are not booleans.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Integer(0) => Some(false),
            Self::Integer(1) => Some(true),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ChannelValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ChannelValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for ChannelValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ChannelValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ChannelValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ChannelValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
