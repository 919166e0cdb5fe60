//! # Storage
//!
//! Deadlines, baskets and pins behind a single [`Store`] trait with two
//! backends: SQLite for production and an in-memory map for tests and
//! throwaway runs. The backend is picked from configuration in
//! [`open_store`].
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 2.0.0: Deadlines carry their precomputed next reminder (`next_reminder`,
//!   `next_remind_index`) so the scheduler only fetches the due set
//! - 1.1.0: Baskets and pins
//! - 1.0.0: Initial SQLite deadline table

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use log::info;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::core::clock::Clock;
use crate::core::config::{Config, StoreBackend};
use crate::core::error::StoreError;
use crate::features::reminders::{ReminderSchedule, EXPIRATION_INDEX};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A user deadline plus the precomputed next scheduler event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deadline {
    pub id: i64,
    pub title: String,
    pub due_at: DateTime<Utc>,
    /// Instant at or after which the next reminder (or the expiration) is due
    pub next_reminder_at: DateTime<Utc>,
    /// Threshold index of the next reminder, or [`EXPIRATION_INDEX`]
    pub next_reminder_index: i64,
}

impl Deadline {
    pub fn is_expiring(&self) -> bool {
        self.next_reminder_index == EXPIRATION_INDEX
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pin {
    pub id: i64,
    pub content: String,
}

/// Shared storage capability used by the scheduler and the command path.
///
/// Every call is atomic on its own and bounded in time; a call that runs past
/// its bound fails with [`StoreError::Cancelled`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a deadline, computing its first reminder from the store clock.
    async fn add_deadline(&self, title: &str, due_at: DateTime<Utc>) -> Result<Deadline, StoreError>;

    /// All deadlines ordered by due time.
    async fn list_deadlines(&self) -> Result<Vec<Deadline>, StoreError>;

    /// Deadlines whose next event is at or before `now`, ordered by that event.
    async fn list_due_deadlines(&self, now: DateTime<Utc>) -> Result<Vec<Deadline>, StoreError>;

    async fn update_next_reminder(
        &self,
        id: i64,
        next_reminder_at: DateTime<Utc>,
        next_reminder_index: i64,
    ) -> Result<(), StoreError>;

    async fn delete_deadline(&self, id: i64) -> Result<(), StoreError>;

    async fn add_basket(&self, name: &str) -> Result<(), StoreError>;

    async fn list_baskets(&self) -> Result<Vec<String>, StoreError>;

    async fn delete_basket(&self, name: &str) -> Result<(), StoreError>;

    async fn add_pin(&self, basket: &str, content: &str) -> Result<Pin, StoreError>;

    async fn list_pins(&self, basket: &str) -> Result<Vec<Pin>, StoreError>;

    async fn delete_pin(&self, basket: &str, id: i64) -> Result<(), StoreError>;
}

/// Run a store operation under its time bound.
pub(crate) async fn bounded<T, F>(
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Cancelled {
            operation,
            after: limit,
        }),
    }
}

pub(crate) fn validate_title(title: &str) -> Result<String, StoreError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(StoreError::Validation("deadline title cannot be empty".to_string()));
    }
    Ok(title.to_string())
}

/// Stored timestamps are four-digit-year RFC 3339 text
pub(crate) fn validate_instant(field: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
    if (0..=9999).contains(&at.year()) {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "{field} must fall between years 0000 and 9999"
        )))
    }
}

/// Basket names are case-insensitive and stored lower-cased
pub(crate) fn normalize_basket(name: &str) -> Result<String, StoreError> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(StoreError::Validation("basket name cannot be empty".to_string()));
    }
    Ok(name)
}

/// Open the backend selected in the config.
pub fn open_store(
    config: &Config,
    schedule: ReminderSchedule,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Arc<dyn Store>> {
    match config.store_backend {
        StoreBackend::Sqlite => {
            if let Some(parent) = Path::new(&config.database_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let store =
                SqliteStore::open(&config.database_path, schedule, clock, config.store_timeout)?;
            info!("💾 Connected to SQLite database at {}", config.database_path);
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!("💾 Using in-memory store, nothing will survive a restart");
            Ok(Arc::new(MemoryStore::new(schedule, clock).with_timeout(config.store_timeout)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let result = bounded("noop", Duration::from_secs(1), async { Ok::<_, StoreError>(3) }).await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_bounded_cancels_slow_operation() {
        let result = bounded("slow", Duration::from_millis(20), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StoreError>(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_normalize_basket() {
        assert_eq!(normalize_basket("  Recipes ").unwrap(), "recipes");
        assert!(normalize_basket("   ").is_err());
    }
}
