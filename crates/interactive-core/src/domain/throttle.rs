//! Bandwidth throttle settings negotiated per remote method name.
//!
//! On the wire both the request to `setBandwidthThrottle` and the result of
//! `getThrottleState` are objects keyed by method name:
//!
//! ```json
//! {"giveInput": {"capacityPerPeriod": 10000000, "periodMillis": 3000000}}
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A desired limit for one method: `capacity_per_period` calls (or bytes, as
/// the server accounts them) refill every `period_millis`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleSetting {
    pub method: String,
    pub capacity_per_period: u64,
    pub period_millis: u64,
}

impl ThrottleSetting {
    pub fn new(method: impl Into<String>, capacity_per_period: u64, period_millis: u64) -> Self {
        Self {
            method: method.into(),
            capacity_per_period,
            period_millis,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_millis)
    }

    /// The limit half of the setting, as sent on the wire.
    pub fn limit(&self) -> ThrottleLimit {
        ThrottleLimit {
            capacity_per_period: self.capacity_per_period,
            period_millis: self.period_millis,
        }
    }
}

/// Wire form of one method's limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleLimit {
    pub capacity_per_period: u64,
    pub period_millis: u64,
}

/// The server's view of one method's throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleState {
    pub capacity_per_period: u64,
    pub period_millis: u64,
    /// Calls accepted in the current period.
    #[serde(default)]
    pub inserted: u64,
    /// Calls rejected in the current period.
    #[serde(default)]
    pub rejected: u64,
}

impl ThrottleState {
    /// Converts the server view back into a setting for `method`.
    pub fn to_setting(&self, method: impl Into<String>) -> ThrottleSetting {
        ThrottleSetting::new(method, self.capacity_per_period, self.period_millis)
    }
}

/// Builds the `setBandwidthThrottle` params object.
///
/// A later entry for the same method replaces an earlier one.
pub fn settings_to_wire(settings: &[ThrottleSetting]) -> BTreeMap<String, ThrottleLimit> {
    settings
        .iter()
        .map(|s| (s.method.clone(), s.limit()))
        .collect()
}
