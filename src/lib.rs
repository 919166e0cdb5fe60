// Core layer - shared types, configuration, errors
pub mod core;

// Features layer - reminders, delivery, rate limiting
pub mod features;

// Infrastructure
pub mod database;

// Application layer
pub mod commands;

pub use core::Config;

pub use commands::{CommandContext, CommandDispatcher};
pub use database::{open_store, Deadline, MemoryStore, Pin, SqliteStore, Store};
pub use features::{
    // Delivery
    DiscordNotifier, Notifier,
    // Rate limiting
    RateLimiter,
    // Reminders
    ReminderSchedule, ReminderScheduler,
};
