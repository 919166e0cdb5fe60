//! # Reminders Feature
//!
//! Deadline countdowns. Each deadline walks a fixed ladder of reminder
//! thresholds (largest first) and ends with an expiration notice.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Precomputed next event per deadline, configurable thresholds,
//!   timezone-aware expiration notices
//! - 1.0.0: Initial release

pub mod format;
pub mod policy;
pub mod scheduler;

pub use format::{expiration_message, format_local, format_remaining, reminder_message};
pub use policy::{advance, parse_threshold, ReminderSchedule, EXPIRATION_INDEX};
pub use scheduler::{ReminderScheduler, TickReport};
