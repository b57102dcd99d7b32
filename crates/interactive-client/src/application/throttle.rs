//! Local mirror of the server's per-method bandwidth throttles.
//!
//! The server is the one that enforces limits.  This manager only tracks what
//! was negotiated and counts outbound calls in fixed windows, so the host can
//! see in its logs when it is about to be rate limited.  It never holds back
//! or drops a call.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Instant;

use interactive_core::domain::validation::validate_throttle;
use interactive_core::{ThrottleSetting, ThrottleState, ValidationError};
use tracing::{debug, warn};

use crate::application::lock;

/// What the local counter thinks of one outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleVerdict {
    /// No throttle is known for this method.
    Unthrottled,
    /// Within budget: `used` of `capacity` in the current window.
    Within { used: u64, capacity: u64 },
    /// Over budget.  The call is still sent.
    Exceeded { used: u64, capacity: u64 },
}

#[derive(Debug)]
struct Counter {
    setting: ThrottleSetting,
    used: u64,
    window_start: Instant,
}

impl Counter {
    fn fresh(setting: ThrottleSetting, now: Instant) -> Self {
        Self {
            setting,
            used: 0,
            window_start: now,
        }
    }
}

#[derive(Debug, Default)]
pub struct ThrottleManager {
    counters: Mutex<HashMap<String, Counter>>,
}

impl ThrottleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks settings before they are sent to the server.
    pub fn validate(settings: &[ThrottleSetting]) -> Result<(), ValidationError> {
        settings.iter().try_for_each(validate_throttle)
    }

    /// Records settings the server accepted.  Counters for those methods restart.
    pub fn apply(&self, settings: &[ThrottleSetting]) {
        let now = Instant::now();
        let mut counters = lock(&self.counters);
        for setting in settings {
            debug!(
                method = %setting.method,
                capacity = setting.capacity_per_period,
                period_ms = setting.period_millis,
                "throttle applied"
            );
            counters.insert(setting.method.clone(), Counter::fresh(setting.clone(), now));
        }
    }

    /// Replaces every local setting with the server's view.
    ///
    /// Counters for methods whose limits did not change keep running.
    pub fn replace_with(&self, states: &BTreeMap<String, ThrottleState>) {
        let now = Instant::now();
        let mut counters = lock(&self.counters);
        let mut next = HashMap::with_capacity(states.len());
        for (method, state) in states {
            let setting = state.to_setting(method.clone());
            let counter = match counters.remove(method) {
                Some(existing) if existing.setting == setting => existing,
                _ => Counter::fresh(setting, now),
            };
            next.insert(method.clone(), counter);
        }
        *counters = next;
    }

    /// Counts one outbound call to `method`.
    pub fn record(&self, method: &str) -> ThrottleVerdict {
        self.record_at(method, Instant::now())
    }

    /// [`record`](Self::record) with an explicit clock reading.
    pub fn record_at(&self, method: &str, now: Instant) -> ThrottleVerdict {
        let mut counters = lock(&self.counters);
        let Some(counter) = counters.get_mut(method) else {
            return ThrottleVerdict::Unthrottled;
        };
        if now.saturating_duration_since(counter.window_start) >= counter.setting.period() {
            counter.used = 0;
            counter.window_start = now;
        }
        counter.used += 1;
        let capacity = counter.setting.capacity_per_period;
        if counter.used > capacity {
            warn!(
                method,
                used = counter.used,
                capacity,
                "call exceeds the negotiated throttle; the server may reject it"
            );
            ThrottleVerdict::Exceeded {
                used: counter.used,
                capacity,
            }
        } else {
            ThrottleVerdict::Within {
                used: counter.used,
                capacity,
            }
        }
    }

    pub fn setting(&self, method: &str) -> Option<ThrottleSetting> {
        lock(&self.counters).get(method).map(|c| c.setting.clone())
    }

    /// All known settings, sorted by method name.
    pub fn settings(&self) -> Vec<ThrottleSetting> {
        let mut settings: Vec<_> = lock(&self.counters)
            .values()
            .map(|c| c.setting.clone())
            .collect();
        settings.sort_by(|a, b| a.method.cmp(&b.method));
        settings
    }

    /// Restarts every window without forgetting the settings.
    pub fn reset_counters(&self) {
        let now = Instant::now();
        for counter in lock(&self.counters).values_mut() {
            counter.used = 0;
            counter.window_start = now;
        }
    }
}
