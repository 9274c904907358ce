// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Addressing of a single telemetry channel on an edge.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;

/// Identifier of one scalar telemetry point: `(component_id, channel_id)`.
///
/// Equality, hashing and ordering are structural, so addresses can be used
/// as map keys. The textual form `componentId/channelId` is the one used on
/// the wire.
///
/// # Examples
///
/// ```
/// use edge_live::types::ChannelAddress;
///
/// let addr = ChannelAddress::new("ess0", "Soc");
/// assert_eq!(addr.to_string(), "ess0/Soc");
///
/// let parsed: ChannelAddress = "ess0/Soc".parse().unwrap();
/// assert_eq!(parsed, addr);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelAddress {
    component_id: Arc<str>,
    channel_id: Arc<str>,
}

impl ChannelAddress {
    /// Creates a new channel address.
    #[must_use]
    pub fn new(component_id: impl AsRef<str>, channel_id: impl AsRef<str>) -> Self {
        Self {
            component_id: Arc::from(component_id.as_ref()),
            channel_id: Arc::from(channel_id.as_ref()),
        }
    }

    /// Returns the component part, e.g. `ess0`.
    #[must_use]
    pub fn component_id(&self) -> &str {
        &self.component_id
    }

    /// Returns the channel part, e.g. `Soc`.
    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Returns `true` if this address belongs to the given component.
    #[must_use]
    pub fn is_in_component(&self, component_id: &str) -> bool {
        &*self.component_id == component_id
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.component_id, self.channel_id)
    }
}

impl FromStr for ChannelAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((component, channel)) if !component.is_empty() && !channel.is_empty() => {
                Ok(Self::new(component, channel))
            }
            _ => Err(ParseError::InvalidChannelAddress(s.to_string())),
        }
    }
}

impl Serialize for ChannelAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChannelAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn display_uses_slash_form() {
        let addr = ChannelAddress::new("_sum", "GridActivePower");
        assert_eq!(addr.to_string(), "_sum/GridActivePower");
    }

    #[test]
    fn parse_splits_on_first_slash() {
        let addr: ChannelAddress = "meter0/Sub/Channel".parse().unwrap();
        assert_eq!(addr.component_id(), "meter0");
        assert_eq!(addr.channel_id(), "Sub/Channel");
    }

    #[test]
    fn parse_rejects_missing_parts() {
        for input in ["", "ess0", "ess0/", "/Soc"] {
            assert!(
                input.parse::<ChannelAddress>().is_err(),
                "{input:?} should not parse"
            );
        }
    }

    #[test]
    fn equality_is_structural() {
        let a = ChannelAddress::new("ess0", "Soc");
        let b = ChannelAddress::new(String::from("ess0"), String::from("Soc"));
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn different_component_is_different_address() {
        assert_ne!(
            ChannelAddress::new("ess0", "Soc"),
            ChannelAddress::new("ess1", "Soc")
        );
    }

    #[test]
    fn serde_uses_string_form() {
        let addr = ChannelAddress::new("ctrlGridOptimizedCharge0", "DelayChargeState");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"ctrlGridOptimizedCharge0/DelayChargeState\"");

        let back: ChannelAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);

        assert!(serde_json::from_str::<ChannelAddress>("\"nochannel\"").is_err());
    }

    #[test]
    fn component_membership() {
        let addr = ChannelAddress::new("ess0", "Capacity");
        assert!(addr.is_in_component("ess0"));
        assert!(!addr.is_in_component("ess"));
    }
}
