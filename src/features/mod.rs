//! # Features
//!
//! - `reminders`: deadline countdown policy, message text and the scheduler
//! - `notify`: outbound delivery to the chat channel
//! - `rate_limiting`: per-user command throttling

pub mod notify;
pub mod rate_limiting;
pub mod reminders;

pub use notify::{DiscordNotifier, Notifier};
pub use rate_limiting::RateLimiter;
pub use reminders::{ReminderSchedule, ReminderScheduler};
