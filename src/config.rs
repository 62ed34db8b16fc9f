//! Solver configuration.
//!
//! Built once by the caller and passed into every solve. Nothing here is
//! cached process-wide.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// How malformed "HH:MM" strings are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindowPolicy {
    /// Log a warning and treat the value as midnight.
    #[default]
    Lenient,
    /// Reject the solve with `InvalidTimeWindowFormat`.
    Strict,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SolveOptions {
    /// Wall-clock budget for the improvement phase.
    pub time_limit_seconds: u64,
    /// Maximum number of accepted moves in the improvement phase.
    pub solution_limit: usize,
    /// Fleet-wide cap on elapsed route time. A vehicle's own
    /// `max_driving_minutes` applies when it is lower.
    pub max_driving_hours_per_day: u32,
    /// Longest a vehicle may wait at a stop for its window to open.
    pub waiting_slack_minutes: u32,
    /// Loading/unloading time spent at every stop.
    pub service_minutes: u32,
    /// Whether the closing arc back to the depot counts toward cost and time.
    pub return_to_depot: bool,
    pub enforce_weight_limit: bool,
    pub time_window_policy: TimeWindowPolicy,
    /// Scales the arc penalty weight relative to the mean arc cost of the
    /// first solution.
    pub penalty_factor: f64,
    /// Consecutive penalty rounds without an accepted move before the
    /// search gives up.
    pub max_stalled_rounds: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            time_limit_seconds: 300,
            solution_limit: 100,
            max_driving_hours_per_day: 10,
            waiting_slack_minutes: 30,
            service_minutes: 0,
            return_to_depot: true,
            enforce_weight_limit: true,
            time_window_policy: TimeWindowPolicy::Lenient,
            penalty_factor: 0.1,
            max_stalled_rounds: 200,
        }
    }
}

impl SolveOptions {
    /// Defaults overridden by any recognised environment variable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();
        override_from(&lookup, "SOLVER_TIME_LIMIT_SECONDS", &mut options.time_limit_seconds);
        override_from(&lookup, "SOLVER_SOLUTION_LIMIT", &mut options.solution_limit);
        override_from(&lookup, "MAX_DRIVING_HOURS_PER_DAY", &mut options.max_driving_hours_per_day);
        override_from(&lookup, "WAITING_SLACK_MINUTES", &mut options.waiting_slack_minutes);
        override_from(&lookup, "LOADING_UNLOADING_TIME_MINUTES", &mut options.service_minutes);
        options
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_seconds)
    }

    pub fn max_driving_minutes(&self) -> i64 {
        i64::from(self.max_driving_hours_per_day) * 60
    }
}

pub(crate) fn override_from<T: FromStr>(lookup: impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => warn!(key, value = %raw, "ignoring unparsable configuration override"),
    }
}
