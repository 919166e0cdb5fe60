//! Shared context for command handlers
//!
//! - **Version**: 2.0.0
//! - **Since**: 3.38.0
//!
//! ## Changelog
//! - 2.0.0: Store, clock and display timezone
//! - 1.0.0: Initial implementation with core shared state

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

use crate::core::clock::Clock;
use crate::database::Store;

/// Services every command handler can reach.
#[derive(Clone)]
pub struct CommandContext {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub timezone: Tz,
    pub prefix: String,
}

impl CommandContext {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, timezone: Tz, prefix: impl Into<String>) -> Self {
        Self {
            store,
            clock,
            timezone,
            prefix: prefix.into(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
