//! # Reminder Schedule Policy
//!
//! Maps a deadline's due time onto the countdown of configured thresholds.
//! Index `i` addresses `thresholds[i]`; thresholds are kept ascending, so the
//! highest index is the earliest-firing reminder and the countdown walks
//! towards index 0 before reaching the expiration sentinel.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Precomputed next-event pair replaces the per-tick threshold rescan
//! - 1.0.0: Initial threshold list

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::core::error::ConfigError;

/// Index stored once no reminder is left and only the expiration remains.
pub const EXPIRATION_INDEX: i64 = -1;

/// Longest lead time a single threshold may have.
pub const MAX_THRESHOLD_DAYS: i64 = 3650;

/// Ordered durations-before-due at which reminders fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderSchedule {
    thresholds: Vec<Duration>,
}

impl ReminderSchedule {
    /// Build a schedule, sorting ascending and dropping duplicates.
    pub fn new(mut thresholds: Vec<Duration>) -> Result<Self, ConfigError> {
        if thresholds.is_empty() {
            return Err(ConfigError::Invalid {
                key: "REMINDER_SCHEDULE",
                reason: "at least one threshold is required".to_string(),
            });
        }
        if let Some(bad) = thresholds.iter().find(|t| **t <= Duration::zero()) {
            return Err(ConfigError::Invalid {
                key: "REMINDER_SCHEDULE",
                reason: format!("threshold must be positive, got {}s", bad.num_seconds()),
            });
        }
        if let Some(bad) = thresholds.iter().find(|t| t.num_days() > MAX_THRESHOLD_DAYS) {
            return Err(ConfigError::Invalid {
                key: "REMINDER_SCHEDULE",
                reason: format!(
                    "threshold of {} days exceeds the {MAX_THRESHOLD_DAYS} day limit",
                    bad.num_days()
                ),
            });
        }

        thresholds.sort();
        thresholds.dedup();
        Ok(Self { thresholds })
    }

    /// Parse a comma separated list such as `3h,6h,12h,24h,48h`.
    pub fn parse(list: &str) -> Result<Self, ConfigError> {
        let thresholds = list
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                parse_threshold(part).ok_or_else(|| ConfigError::Invalid {
                    key: "REMINDER_SCHEDULE",
                    reason: format!("cannot parse duration '{part}', use formats like 30m, 2h, 1d or 1h30m"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(thresholds)
    }

    pub fn thresholds(&self) -> &[Duration] {
        &self.thresholds
    }

    /// First pending event for a deadline created at `now`.
    ///
    /// Returns the largest index whose reminder instant is strictly after
    /// `now`, or `(due_at, EXPIRATION_INDEX)` when every reminder instant has
    /// already passed. Instants that fall outside chrono's range are skipped.
    pub fn compute_initial_reminder(
        &self,
        due_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> (DateTime<Utc>, i64) {
        for (index, threshold) in self.thresholds.iter().enumerate().rev() {
            let Some(remind_at) = due_at.checked_sub_signed(*threshold) else {
                continue;
            };
            if remind_at > now {
                return (remind_at, index as i64);
            }
        }

        (due_at, EXPIRATION_INDEX)
    }

    /// Reminder instant for `index`; the sentinel (or anything out of range)
    /// maps to the due time itself.
    pub fn reminder_at(&self, due_at: DateTime<Utc>, index: i64) -> DateTime<Utc> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.thresholds.get(i))
            .and_then(|threshold| due_at.checked_sub_signed(*threshold))
            .unwrap_or(due_at)
    }

    /// Event that follows firing `current_index`.
    ///
    /// An index stored under a longer schedule is clamped to the last
    /// threshold, so the next event never lands before an earlier one.
    pub fn next_event(&self, due_at: DateTime<Utc>, current_index: i64) -> (DateTime<Utc>, i64) {
        let last = self.thresholds.len() as i64 - 1;
        let next_index = advance(current_index).min(last);
        (self.reminder_at(due_at, next_index), next_index)
    }
}

impl Default for ReminderSchedule {
    fn default() -> Self {
        Self {
            thresholds: [3, 6, 12, 24, 48].into_iter().map(Duration::hours).collect(),
        }
    }
}

impl fmt::Display for ReminderSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .thresholds
            .iter()
            .map(|t| {
                let minutes = t.num_minutes();
                if minutes % (60 * 24) == 0 {
                    format!("{}d", minutes / (60 * 24))
                } else if minutes % 60 == 0 {
                    format!("{}h", minutes / 60)
                } else {
                    format!("{minutes}m")
                }
            })
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Index after firing `current_index`. Never goes below the sentinel.
pub fn advance(current_index: i64) -> i64 {
    (current_index - 1).max(EXPIRATION_INDEX)
}

/// Parse a duration like "30m", "2h", "1d", "1h30m"
pub fn parse_threshold(spec: &str) -> Option<Duration> {
    let spec = spec.trim().to_lowercase();
    let mut total_seconds: i64 = 0;
    let mut current_number = String::new();

    for c in spec.chars() {
        if c.is_ascii_digit() {
            current_number.push(c);
            continue;
        }

        if current_number.is_empty() {
            return None;
        }
        let value: i64 = current_number.parse().ok()?;
        current_number.clear();

        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 60 * 60 * 24,
            'w' => 60 * 60 * 24 * 7,
            _ => return None,
        };
        total_seconds = total_seconds.checked_add(value.checked_mul(unit)?)?;
    }

    // Trailing digits without a unit
    if !current_number.is_empty() {
        return None;
    }

    if total_seconds > 0 {
        Duration::try_seconds(total_seconds)
    } else {
        None
    }
}
