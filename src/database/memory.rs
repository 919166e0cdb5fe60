//! In-memory [`Store`] backend.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{bounded, normalize_basket, validate_instant, validate_title, Deadline, Pin, Store};
use crate::core::clock::Clock;
use crate::core::error::StoreError;
use crate::features::reminders::ReminderSchedule;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct State {
    deadlines: BTreeMap<i64, Deadline>,
    next_deadline_id: i64,
    baskets: BTreeMap<String, Vec<Pin>>,
    next_pin_id: i64,
}

pub struct MemoryStore {
    state: RwLock<State>,
    schedule: ReminderSchedule,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl MemoryStore {
    pub fn new(schedule: ReminderSchedule, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(State {
                next_deadline_id: 1,
                next_pin_id: 1,
                ..State::default()
            }),
            schedule,
            clock,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn add_deadline(&self, title: &str, due_at: DateTime<Utc>) -> Result<Deadline, StoreError> {
        let title = validate_title(title)?;
        validate_instant("due date", due_at)?;
        let due_at = due_at.trunc_subsecs(0);

        bounded("add_deadline", self.timeout, async {
            let mut state = self.state.write().await;
            let now = self.clock.now();
            let (next_reminder_at, next_reminder_index) =
                self.schedule.compute_initial_reminder(due_at, now);
            validate_instant("first reminder", next_reminder_at)?;

            let deadline = Deadline {
                id: state.next_deadline_id,
                title,
                due_at,
                next_reminder_at,
                next_reminder_index,
            };
            state.next_deadline_id += 1;
            state.deadlines.insert(deadline.id, deadline.clone());
            Ok(deadline)
        })
        .await
    }

    async fn list_deadlines(&self) -> Result<Vec<Deadline>, StoreError> {
        bounded("list_deadlines", self.timeout, async {
            let state = self.state.read().await;
            let mut deadlines: Vec<Deadline> = state.deadlines.values().cloned().collect();
            deadlines.sort_by_key(|d| (d.due_at, d.id));
            Ok(deadlines)
        })
        .await
    }

    async fn list_due_deadlines(&self, now: DateTime<Utc>) -> Result<Vec<Deadline>, StoreError> {
        bounded("list_due_deadlines", self.timeout, async {
            let state = self.state.read().await;
            let mut due: Vec<Deadline> = state
                .deadlines
                .values()
                .filter(|d| d.next_reminder_at <= now)
                .cloned()
                .collect();
            due.sort_by_key(|d| (d.next_reminder_at, d.id));
            Ok(due)
        })
        .await
    }

    async fn update_next_reminder(
        &self,
        id: i64,
        next_reminder_at: DateTime<Utc>,
        next_reminder_index: i64,
    ) -> Result<(), StoreError> {
        validate_instant("next reminder", next_reminder_at)?;

        bounded("update_next_reminder", self.timeout, async {
            let mut state = self.state.write().await;
            let deadline = state
                .deadlines
                .get_mut(&id)
                .ok_or_else(|| StoreError::not_found("deadline", id))?;
            deadline.next_reminder_at = next_reminder_at.trunc_subsecs(0);
            deadline.next_reminder_index = next_reminder_index;
            Ok(())
        })
        .await
    }

    async fn delete_deadline(&self, id: i64) -> Result<(), StoreError> {
        bounded("delete_deadline", self.timeout, async {
            let mut state = self.state.write().await;
            state
                .deadlines
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| StoreError::not_found("deadline", id))
        })
        .await
    }

    async fn add_basket(&self, name: &str) -> Result<(), StoreError> {
        let name = normalize_basket(name)?;

        bounded("add_basket", self.timeout, async {
            let mut state = self.state.write().await;
            if state.baskets.contains_key(&name) {
                return Err(StoreError::AlreadyExists {
                    entity: "basket",
                    key: name,
                });
            }
            state.baskets.insert(name, Vec::new());
            Ok(())
        })
        .await
    }

    async fn list_baskets(&self) -> Result<Vec<String>, StoreError> {
        bounded("list_baskets", self.timeout, async {
            let state = self.state.read().await;
            Ok(state.baskets.keys().cloned().collect())
        })
        .await
    }

    async fn delete_basket(&self, name: &str) -> Result<(), StoreError> {
        let name = normalize_basket(name)?;

        bounded("delete_basket", self.timeout, async {
            let mut state = self.state.write().await;
            state
                .baskets
                .remove(&name)
                .map(|_| ())
                .ok_or_else(|| StoreError::not_found("basket", &name))
        })
        .await
    }

    async fn add_pin(&self, basket: &str, content: &str) -> Result<Pin, StoreError> {
        let basket = normalize_basket(basket)?;
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(StoreError::Validation("pin content cannot be empty".to_string()));
        }

        bounded("add_pin", self.timeout, async {
            let mut state = self.state.write().await;
            let id = state.next_pin_id;
            let pins = state
                .baskets
                .get_mut(&basket)
                .ok_or_else(|| StoreError::not_found("basket", &basket))?;

            let pin = Pin { id, content };
            pins.push(pin.clone());
            state.next_pin_id += 1;
            Ok(pin)
        })
        .await
    }

    async fn list_pins(&self, basket: &str) -> Result<Vec<Pin>, StoreError> {
        let basket = normalize_basket(basket)?;

        bounded("list_pins", self.timeout, async {
            let state = self.state.read().await;
            state
                .baskets
                .get(&basket)
                .cloned()
                .ok_or_else(|| StoreError::not_found("basket", &basket))
        })
        .await
    }

    async fn delete_pin(&self, basket: &str, id: i64) -> Result<(), StoreError> {
        let basket = normalize_basket(basket)?;

        bounded("delete_pin", self.timeout, async {
            let mut state = self.state.write().await;
            let pins = state
                .baskets
                .get_mut(&basket)
                .ok_or_else(|| StoreError::not_found("basket", &basket))?;

            let position = pins
                .iter()
                .position(|p| p.id == id)
                .ok_or_else(|| StoreError::not_found("pin", id))?;
            pins.remove(position);
            Ok(())
        })
        .await
    }
}
