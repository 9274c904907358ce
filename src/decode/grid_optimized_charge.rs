// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoder for the grid-optimized charge controller.
//!
//! The controller combines two strategies, each reporting its own numeric
//! state channel:
//!
//! - *sell-to-grid limit*: charges the storage so that feed-in never
//!   exceeds the grid operator's limit ([`SellToGridLimitState`]);
//! - *delay charge*: holds charging back until a target time
//!   ([`DelayChargeState`]).
//!
//! [`GridOptimizedChargeDecoder`] folds both into one [`ChargeStatus`].

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};

use super::{MODE_CHANNEL, Mode, StateDecoder};
use crate::cache::CurrentData;
use crate::types::{ChannelAddress, ChannelValue};

const DELAY_CHARGE_STATE: &str = "DelayChargeState";
const SELL_TO_GRID_LIMIT_STATE: &str = "SellToGridLimitState";
const MINIMUM_CHARGE_LIMIT: &str = "SellToGridLimitMinimumChargeLimit";
const MAXIMUM_CHARGE_LIMIT: &str = "DelayChargeMaximumChargeLimit";
const MAXIMUM_SELL_TO_GRID_POWER: &str = "_PropertyMaximumSellToGridPower";
const SELL_TO_GRID_LIMIT_ENABLED: &str = "_PropertySellToGridLimitEnabled";
const TARGET_EPOCH_SECONDS: &str = "TargetEpochSeconds";
const PREDICTED_CHARGE_START: &str = "PredictedChargeStartEpochSeconds";
const CAPACITY: &str = "Capacity";

/// State of the sell-to-grid limit part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SellToGridLimitState {
    /// Not defined (`-1`).
    Undefined,
    /// Active limitation with a fixed limit (`0`).
    ActiveLimitFixed,
    /// No active limitation (`1`).
    NoLimit,
    /// Limit cannot be adapted because of higher-priority constraints (`2`).
    NoFeasibleSolution,
    /// Active limitation through a minimum charge power (`3`).
    ActiveLimitConstraint,
    /// Sell-to-grid limit part is disabled (`4`).
    Disabled,
    /// Not started because there is no or too little production (`5`).
    NotStarted,
}

impl SellToGridLimitState {
    /// Returns the state for a numeric code, or `None` if out of range.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(Self::Undefined),
            0 => Some(Self::ActiveLimitFixed),
            1 => Some(Self::NoLimit),
            2 => Some(Self::NoFeasibleSolution),
            3 => Some(Self::ActiveLimitConstraint),
            4 => Some(Self::Disabled),
            5 => Some(Self::NotStarted),
            _ => None,
        }
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Undefined => -1,
            Self::ActiveLimitFixed => 0,
            Self::NoLimit => 1,
            Self::NoFeasibleSolution => 2,
            Self::ActiveLimitConstraint => 3,
            Self::Disabled => 4,
            Self::NotStarted => 5,
        }
    }

    /// Decodes a raw channel value.
    #[must_use]
    pub fn from_value(value: Option<&ChannelValue>) -> Option<Self> {
        value.and_then(ChannelValue::as_i64).and_then(Self::from_code)
    }
}

/// State of the delay charge part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelayChargeState {
    /// Not defined (`-1`).
    Undefined,
    /// Charge power is actively limited (`0`).
    ActiveLimit,
    /// Target time has passed (`1`).
    NoRemainingTime,
    /// Storage has no capacity left (`2`).
    NoRemainingCapacity,
    /// Target minute could not be calculated (`3`).
    TargetMinuteNotCalculated,
    /// Limit cannot be adapted because of higher-priority constraints (`4`).
    NoFeasibleSolution,
    /// No active limitation (`5`).
    NoChargeLimit,
    /// Delay charge part is disabled (`6`).
    Disabled,
    /// Not started because there is no or too little production (`7`).
    NotStarted,
    /// Charging is held back to avoid inefficient low-power charging (`8`).
    AvoidLowCharging,
}

impl DelayChargeState {
    /// Returns the state for a numeric code, or `None` if out of range.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(Self::Undefined),
            0 => Some(Self::ActiveLimit),
            1 => Some(Self::NoRemainingTime),
            2 => Some(Self::NoRemainingCapacity),
            3 => Some(Self::TargetMinuteNotCalculated),
            4 => Some(Self::NoFeasibleSolution),
            5 => Some(Self::NoChargeLimit),
            6 => Some(Self::Disabled),
            7 => Some(Self::NotStarted),
            8 => Some(Self::AvoidLowCharging),
            _ => None,
        }
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Undefined => -1,
            Self::ActiveLimit => 0,
            Self::NoRemainingTime => 1,
            Self::NoRemainingCapacity => 2,
            Self::TargetMinuteNotCalculated => 3,
            Self::NoFeasibleSolution => 4,
            Self::NoChargeLimit => 5,
            Self::Disabled => 6,
            Self::NotStarted => 7,
            Self::AvoidLowCharging => 8,
        }
    }

    /// Decodes a raw channel value.
    #[must_use]
    pub fn from_value(value: Option<&ChannelValue>) -> Option<Self> {
        value.and_then(ChannelValue::as_i64).and_then(Self::from_code)
    }
}

/// Returns `true` if the controller is currently avoiding the grid feed-in
/// limitation.
///
/// That is the case when the sell-to-grid limit is active with a fixed
/// limit, or when it is active through a minimum charge power while the
/// delay charge part is not limiting and the minimum charge limit is
/// positive.
///
/// Missing inputs never match: a missing `sell_to_grid` state is neither
/// `0` nor `3`, a missing `delay_charge` state is not
/// [`DelayChargeState::ActiveLimit`], and a missing `minimum_charge_limit`
/// is not positive.
///
/// # Examples
///
/// ```
/// use edge_live::decode::grid_optimized_charge::{
///     DelayChargeState, SellToGridLimitState, is_sell_to_grid_limit_avoided,
/// };
///
/// assert!(is_sell_to_grid_limit_avoided(
///     Some(SellToGridLimitState::ActiveLimitConstraint),
///     Some(DelayChargeState::NoRemainingTime),
///     Some(50.0),
/// ));
/// assert!(!is_sell_to_grid_limit_avoided(
///     Some(SellToGridLimitState::ActiveLimitConstraint),
///     Some(DelayChargeState::ActiveLimit),
///     Some(50.0),
/// ));
/// ```
#[must_use]
pub fn is_sell_to_grid_limit_avoided(
    sell_to_grid: Option<SellToGridLimitState>,
    delay_charge: Option<DelayChargeState>,
    minimum_charge_limit: Option<f64>,
) -> bool {
    match sell_to_grid {
        Some(SellToGridLimitState::ActiveLimitFixed) => true,
        Some(SellToGridLimitState::ActiveLimitConstraint) => {
            delay_charge != Some(DelayChargeState::ActiveLimit)
                && minimum_charge_limit.is_some_and(|limit| limit > 0.0)
        }
        _ => false,
    }
}

/// Displayed state of the grid-optimized charge controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChargeState {
    /// Grid feed-in limitation is being avoided.
    GridFeedInLimitationAvoided,
    /// Delay charge state reported as undefined.
    NotDefined,
    /// Charge limit is active.
    ChargeLimitActive,
    /// Target end time has passed.
    PassedEndTime,
    /// Storage is already full.
    StorageAlreadyFull,
    /// End time could not be calculated.
    EndTimeNotCalculated,
    /// No limit is possible.
    NoLimitPossible,
    /// No limit is active.
    NoLimitActive,
    /// Delay charge is disabled.
    Disabled,
    /// Charging is delayed.
    ChargingDelayed,
    /// Delay charge state not reported yet, or not recognized.
    Unknown,
}

impl ChargeState {
    /// Derives the displayed state.
    ///
    /// Avoidance of the grid feed-in limitation takes precedence; otherwise
    /// the delay charge state alone decides.
    #[must_use]
    pub fn decode(
        sell_to_grid: Option<SellToGridLimitState>,
        delay_charge: Option<DelayChargeState>,
        minimum_charge_limit: Option<f64>,
    ) -> Self {
        if is_sell_to_grid_limit_avoided(sell_to_grid, delay_charge, minimum_charge_limit) {
            Self::GridFeedInLimitationAvoided
        } else {
            Self::from_delay_charge(delay_charge)
        }
    }

    /// Maps a delay charge state on its own.
    #[must_use]
    pub const fn from_delay_charge(delay_charge: Option<DelayChargeState>) -> Self {
        let Some(state) = delay_charge else {
            return Self::Unknown;
        };
        match state {
            DelayChargeState::Undefined => Self::NotDefined,
            DelayChargeState::ActiveLimit => Self::ChargeLimitActive,
            DelayChargeState::NoRemainingTime => Self::PassedEndTime,
            DelayChargeState::NoRemainingCapacity => Self::StorageAlreadyFull,
            DelayChargeState::TargetMinuteNotCalculated => Self::EndTimeNotCalculated,
            DelayChargeState::NoFeasibleSolution => Self::NoLimitPossible,
            DelayChargeState::NoChargeLimit | DelayChargeState::NotStarted => Self::NoLimitActive,
            DelayChargeState::Disabled => Self::Disabled,
            DelayChargeState::AvoidLowCharging => Self::ChargingDelayed,
        }
    }

    /// Returns a stable key for this state, suitable for translation lookups.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::GridFeedInLimitationAvoided => "gridFeedInLimitationAvoided",
            Self::NotDefined => "notDefined",
            Self::ChargeLimitActive => "chargeLimitActive",
            Self::PassedEndTime => "passedEndTime",
            Self::StorageAlreadyFull => "storageAlreadyFull",
            Self::EndTimeNotCalculated => "endTimeNotCalculated",
            Self::NoLimitPossible => "noLimitPossible",
            Self::NoLimitActive => "noLimitActive",
            Self::Disabled => "disabled",
            Self::ChargingDelayed => "chargingDelayed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ChargeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Charge limit currently shown for the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChargeLimit {
    /// Minimum charge power enforced to avoid the feed-in limitation [W].
    Minimum(f64),
    /// Maximum charge power allowed by the delay charge part [W].
    Maximum(f64),
}

impl ChargeLimit {
    /// Returns the limit in watts.
    #[must_use]
    pub const fn watts(&self) -> f64 {
        match self {
            Self::Minimum(w) | Self::Maximum(w) => *w,
        }
    }
}

/// Decoded status of a grid-optimized charge controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeStatus {
    /// Configured operating mode.
    pub mode: Mode,
    /// Raw sell-to-grid limit state.
    pub sell_to_grid_limit_state: Option<SellToGridLimitState>,
    /// Raw delay charge state.
    pub delay_charge_state: Option<DelayChargeState>,
    /// Whether the grid feed-in limitation is being avoided.
    pub sell_to_grid_limit_avoided: bool,
    /// Displayed state.
    pub state: ChargeState,
    /// Charge limit matching the displayed state, if known.
    pub charge_limit: Option<ChargeLimit>,
    /// Configured maximum sell-to-grid power [W].
    pub maximum_sell_to_grid_power: Option<f64>,
    /// Whether the sell-to-grid limit part is enabled.
    pub sell_to_grid_limit_enabled: Option<bool>,
    /// Capacity of the linked storage [Wh].
    pub capacity: Option<f64>,
    /// Target time of the delay charge part, as Unix seconds.
    pub target_epoch_seconds: Option<i64>,
    /// Predicted start of charging, as Unix seconds.
    pub predicted_charge_start_epoch_seconds: Option<i64>,
}

impl ChargeStatus {
    /// Returns the target time of the delay charge part.
    #[must_use]
    pub fn target_time(&self) -> Option<DateTime<Utc>> {
        self.target_epoch_seconds
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Returns the predicted start of charging.
    #[must_use]
    pub fn predicted_charge_start(&self) -> Option<DateTime<Utc>> {
        self.predicted_charge_start_epoch_seconds
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Decodes the channels of one grid-optimized charge controller.
///
/// # Examples
///
/// ```
/// use edge_live::decode::{GridOptimizedChargeDecoder, StateDecoder};
///
/// let decoder = GridOptimizedChargeDecoder::new("ctrlGridOptimizedCharge0")
///     .with_ess_id("ess0");
///
/// let addresses = decoder.channel_addresses();
/// assert!(addresses.contains(&"ess0/Capacity".parse().unwrap()));
/// assert!(addresses.contains(&"ctrlGridOptimizedCharge0/DelayChargeState".parse().unwrap()));
/// ```
#[derive(Debug, Clone)]
pub struct GridOptimizedChargeDecoder {
    component_id: String,
    ess_id: Option<String>,
}

impl GridOptimizedChargeDecoder {
    /// Creates a decoder for the given controller component.
    #[must_use]
    pub fn new(component_id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            ess_id: None,
        }
    }

    /// Links the storage component whose capacity should be read.
    #[must_use]
    pub fn with_ess_id(mut self, ess_id: impl Into<String>) -> Self {
        self.ess_id = Some(ess_id.into());
        self
    }

    /// Returns the controller component id.
    #[must_use]
    pub fn component_id(&self) -> &str {
        &self.component_id
    }

    /// Returns the linked storage component id.
    #[must_use]
    pub fn ess_id(&self) -> Option<&str> {
        self.ess_id.as_deref()
    }

    fn channel<'a>(&self, data: &'a CurrentData, channel_id: &str) -> Option<&'a ChannelValue> {
        data.get(&ChannelAddress::new(&self.component_id, channel_id))
    }

    fn number(&self, data: &CurrentData, channel_id: &str) -> Option<f64> {
        self.channel(data, channel_id).and_then(ChannelValue::as_f64)
    }
}

impl StateDecoder for GridOptimizedChargeDecoder {
    type Output = ChargeStatus;

    fn channel_addresses(&self) -> BTreeSet<ChannelAddress> {
        let mut addresses: BTreeSet<ChannelAddress> = [
            DELAY_CHARGE_STATE,
            SELL_TO_GRID_LIMIT_STATE,
            MINIMUM_CHARGE_LIMIT,
            MAXIMUM_CHARGE_LIMIT,
            MODE_CHANNEL,
            MAXIMUM_SELL_TO_GRID_POWER,
            SELL_TO_GRID_LIMIT_ENABLED,
            TARGET_EPOCH_SECONDS,
            PREDICTED_CHARGE_START,
        ]
        .into_iter()
        .map(|channel| ChannelAddress::new(&self.component_id, channel))
        .collect();

        if let Some(ess_id) = &self.ess_id {
            addresses.insert(ChannelAddress::new(ess_id, CAPACITY));
        }
        addresses
    }

    fn decode(&self, data: &CurrentData) -> ChargeStatus {
        let sell_to_grid = SellToGridLimitState::from_value(self.channel(data, SELL_TO_GRID_LIMIT_STATE));
        let delay_charge = DelayChargeState::from_value(self.channel(data, DELAY_CHARGE_STATE));
        let minimum_limit = self.number(data, MINIMUM_CHARGE_LIMIT);

        let avoided = is_sell_to_grid_limit_avoided(sell_to_grid, delay_charge, minimum_limit);
        let state = if avoided {
            ChargeState::GridFeedInLimitationAvoided
        } else {
            ChargeState::from_delay_charge(delay_charge)
        };
        let charge_limit = if avoided {
            minimum_limit.map(ChargeLimit::Minimum)
        } else {
            self.number(data, MAXIMUM_CHARGE_LIMIT).map(ChargeLimit::Maximum)
        };

        let capacity = self.ess_id.as_ref().and_then(|ess_id| {
            data.all_components(&format!("{ess_id}/{CAPACITY}"))
                .and_then(ChannelValue::as_f64)
        });

        ChargeStatus {
            mode: Mode::from_value(self.channel(data, MODE_CHANNEL)),
            sell_to_grid_limit_state: sell_to_grid,
            delay_charge_state: delay_charge,
            sell_to_grid_limit_avoided: avoided,
            state,
            charge_limit,
            maximum_sell_to_grid_power: self.number(data, MAXIMUM_SELL_TO_GRID_POWER),
            sell_to_grid_limit_enabled: self
                .channel(data, SELL_TO_GRID_LIMIT_ENABLED)
                .and_then(ChannelValue::as_bool),
            capacity,
            target_epoch_seconds: self
                .channel(data, TARGET_EPOCH_SECONDS)
                .and_then(ChannelValue::as_i64),
            predicted_charge_start_epoch_seconds: self
                .channel(data, PREDICTED_CHARGE_START)
                .and_then(ChannelValue::as_i64),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::cache::{CurrentDataCache, Snapshot, ViewScope};

    const CTRL: &str = "ctrlGridOptimizedCharge0";

    fn view(values: Vec<(String, Option<ChannelValue>)>) -> CurrentData {
        let cache = CurrentDataCache::new();
        let values: BTreeMap<ChannelAddress, Option<ChannelValue>> = values
            .into_iter()
            .map(|(key, value)| (key.parse().unwrap(), value))
            .collect();
        cache.apply_snapshot(Snapshot::new(1, values));
        cache.view(ViewScope::component(CTRL))
    }

    fn key(channel: &str) -> String {
        format!("{CTRL}/{channel}")
    }

    fn int(value: i64) -> Option<ChannelValue> {
        Some(ChannelValue::Integer(value))
    }

    fn decode_codes(sell: i64, delay: i64, minimum: f64) -> ChargeState {
        ChargeState::decode(
            SellToGridLimitState::from_code(sell),
            DelayChargeState::from_code(delay),
            Some(minimum),
        )
    }

    // ========================================================================
    // Code tables
    // ========================================================================

    #[test]
    fn sell_to_grid_codes() {
        for code in -1..=5 {
            let state = SellToGridLimitState::from_code(code).unwrap();
            assert_eq!(state.code(), code);
        }
        assert!(SellToGridLimitState::from_code(6).is_none());
        assert!(SellToGridLimitState::from_code(-2).is_none());
    }

    #[test]
    fn delay_charge_codes() {
        for code in -1..=8 {
            let state = DelayChargeState::from_code(code).unwrap();
            assert_eq!(state.code(), code);
        }
        assert!(DelayChargeState::from_code(9).is_none());
    }

    #[test]
    fn from_value_accepts_integral_floats_only() {
        let value = ChannelValue::Float(3.0);
        assert_eq!(
            SellToGridLimitState::from_value(Some(&value)),
            Some(SellToGridLimitState::ActiveLimitConstraint)
        );
        let value = ChannelValue::Text("3".into());
        assert_eq!(SellToGridLimitState::from_value(Some(&value)), None);
        assert_eq!(DelayChargeState::from_value(None), None);
    }

    // ========================================================================
    // Avoidance rule
    // ========================================================================

    #[test]
    fn documented_examples() {
        assert_eq!(decode_codes(3, 1, 50.0), ChargeState::GridFeedInLimitationAvoided);

        let state = decode_codes(1, 2, 50.0);
        assert_eq!(state, ChargeState::StorageAlreadyFull);
        assert_eq!(state.key(), "storageAlreadyFull");
    }

    #[test]
    fn exhaustive_state_space() {
        let documented = [
            ChargeState::GridFeedInLimitationAvoided,
            ChargeState::NotDefined,
            ChargeState::ChargeLimitActive,
            ChargeState::PassedEndTime,
            ChargeState::StorageAlreadyFull,
            ChargeState::EndTimeNotCalculated,
            ChargeState::NoLimitPossible,
            ChargeState::NoLimitActive,
            ChargeState::Disabled,
            ChargeState::ChargingDelayed,
        ];
        let by_delay = [
            ChargeState::NotDefined,
            ChargeState::ChargeLimitActive,
            ChargeState::PassedEndTime,
            ChargeState::StorageAlreadyFull,
            ChargeState::EndTimeNotCalculated,
            ChargeState::NoLimitPossible,
            ChargeState::NoLimitActive,
            ChargeState::Disabled,
            ChargeState::NoLimitActive,
            ChargeState::ChargingDelayed,
        ];

        let mut cases = 0;
        for sell in -1..=5_i64 {
            for delay in -1..=8_i64 {
                for minimum in [0.0, 1.0, 100.0] {
                    let avoided = sell == 0 || (sell == 3 && delay != 0 && minimum > 0.0);
                    let state = decode_codes(sell, delay, minimum);

                    assert!(documented.contains(&state));
                    let expected = if avoided {
                        ChargeState::GridFeedInLimitationAvoided
                    } else {
                        by_delay[usize::try_from(delay + 1).unwrap()]
                    };
                    assert_eq!(state, expected, "sell={sell} delay={delay} min={minimum}");
                    cases += 1;
                }
            }
        }
        assert_eq!(cases, 7 * 10 * 3);
    }

    #[test]
    fn active_delay_limit_blocks_constraint_avoidance() {
        assert!(!is_sell_to_grid_limit_avoided(
            Some(SellToGridLimitState::ActiveLimitConstraint),
            Some(DelayChargeState::ActiveLimit),
            Some(100.0),
        ));
        // Fixed limit wins even while the delay charge limit is active
        assert!(is_sell_to_grid_limit_avoided(
            Some(SellToGridLimitState::ActiveLimitFixed),
            Some(DelayChargeState::ActiveLimit),
            Some(0.0),
        ));
    }

    // ========================================================================
    // Missing inputs
    // ========================================================================

    #[test]
    fn missing_sell_state_never_avoids() {
        assert!(!is_sell_to_grid_limit_avoided(
            None,
            Some(DelayChargeState::NoChargeLimit),
            Some(100.0)
        ));
    }

    #[test]
    fn missing_delay_state_is_not_active_limit() {
        assert!(is_sell_to_grid_limit_avoided(
            Some(SellToGridLimitState::ActiveLimitConstraint),
            None,
            Some(100.0)
        ));
    }

    #[test]
    fn missing_minimum_limit_is_not_positive() {
        assert!(!is_sell_to_grid_limit_avoided(
            Some(SellToGridLimitState::ActiveLimitConstraint),
            Some(DelayChargeState::NoChargeLimit),
            None
        ));
    }

    #[test]
    fn missing_delay_state_is_unknown_not_undefined() {
        assert_eq!(ChargeState::decode(None, None, None), ChargeState::Unknown);
        assert_eq!(
            ChargeState::from_delay_charge(Some(DelayChargeState::Undefined)),
            ChargeState::NotDefined
        );
        assert_ne!(ChargeState::Unknown.key(), ChargeState::NotDefined.key());
    }

    // ========================================================================
    // Decoder
    // ========================================================================

    #[test]
    fn channel_addresses_without_ess() {
        let decoder = GridOptimizedChargeDecoder::new(CTRL);
        let addresses = decoder.channel_addresses();

        assert_eq!(addresses.len(), 9);
        assert!(addresses.iter().all(|a| a.is_in_component(CTRL)));
    }

    #[test]
    fn decode_avoided_with_minimum_limit() {
        let decoder = GridOptimizedChargeDecoder::new(CTRL).with_ess_id("ess0");
        let data = view(vec![
            (key(SELL_TO_GRID_LIMIT_STATE), int(3)),
            (key(DELAY_CHARGE_STATE), int(1)),
            (key(MINIMUM_CHARGE_LIMIT), int(1500)),
            (key(MAXIMUM_CHARGE_LIMIT), int(4000)),
            (key(MODE_CHANNEL), Some("AUTOMATIC".into())),
            ("ess0/Capacity".to_string(), int(10_000)),
        ]);

        let status = decoder.decode(&data);

        assert!(status.sell_to_grid_limit_avoided);
        assert_eq!(status.state, ChargeState::GridFeedInLimitationAvoided);
        assert_eq!(status.charge_limit, Some(ChargeLimit::Minimum(1500.0)));
        assert_eq!(status.mode, Mode::Automatic);
        assert_eq!(status.capacity, Some(10_000.0));
    }

    #[test]
    fn decode_not_avoided_uses_maximum_limit() {
        let decoder = GridOptimizedChargeDecoder::new(CTRL);
        let data = view(vec![
            (key(SELL_TO_GRID_LIMIT_STATE), int(1)),
            (key(DELAY_CHARGE_STATE), int(0)),
            (key(MAXIMUM_CHARGE_LIMIT), int(2500)),
        ]);

        let status = decoder.decode(&data);

        assert!(!status.sell_to_grid_limit_avoided);
        assert_eq!(status.state, ChargeState::ChargeLimitActive);
        assert_eq!(status.charge_limit.map(|l| l.watts()), Some(2500.0));
        assert_eq!(status.capacity, None);
    }

    #[test]
    fn decode_null_values_stay_unknown() {
        let decoder = GridOptimizedChargeDecoder::new(CTRL);
        let data = view(vec![
            (key(SELL_TO_GRID_LIMIT_STATE), None),
            (key(DELAY_CHARGE_STATE), None),
            (key(MAXIMUM_CHARGE_LIMIT), None),
        ]);

        let status = decoder.decode(&data);

        assert_eq!(status.state, ChargeState::Unknown);
        assert_eq!(status.delay_charge_state, None);
        assert_eq!(status.charge_limit, None);
        assert_eq!(status.mode, Mode::Unknown);
    }

    #[test]
    fn decode_epoch_seconds() {
        let decoder = GridOptimizedChargeDecoder::new(CTRL);
        let data = view(vec![
            (key(TARGET_EPOCH_SECONDS), int(1_700_000_000)),
            (key(SELL_TO_GRID_LIMIT_ENABLED), Some(true.into())),
        ]);

        let status = decoder.decode(&data);

        assert_eq!(status.target_epoch_seconds, Some(1_700_000_000));
        assert_eq!(
            status.target_time().map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
        assert_eq!(status.predicted_charge_start(), None);
        assert_eq!(status.sell_to_grid_limit_enabled, Some(true));
    }

    #[test]
    fn numeric_enabled_flag_is_read() {
        let decoder = GridOptimizedChargeDecoder::new(CTRL);
        let data = view(vec![(key(SELL_TO_GRID_LIMIT_ENABLED), int(0))]);

        assert_eq!(decoder.decode(&data).sell_to_grid_limit_enabled, Some(false));
    }

    #[test]
    fn decode_reads_explicit_addresses_regardless_of_scope() {
        let cache = CurrentDataCache::new();
        let mut values = BTreeMap::new();
        values.insert(
            ChannelAddress::new(CTRL, DELAY_CHARGE_STATE),
            Some(ChannelValue::Integer(8)),
        );
        cache.apply_snapshot(Snapshot::new(1, values));

        let decoder = GridOptimizedChargeDecoder::new(CTRL);
        let status = decoder.decode(&cache.view(ViewScope::all()));

        assert_eq!(status.state, ChargeState::ChargingDelayed);
    }
}
