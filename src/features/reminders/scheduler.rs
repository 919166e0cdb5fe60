//! # Reminder Scheduler
//!
//! Polls the store for the due set on a fixed interval and walks each due
//! deadline one step down its countdown:
//!
//! - `PENDING(i)`: send a reminder, persist `PENDING(i-1)` (or `EXPIRING`
//!   after index 0)
//! - `EXPIRING`: send the expiration notice, delete the deadline
//!
//! Sends happen before the state is persisted. A failed send still advances
//! the deadline; a failed persist leaves it due, so the next tick sends the
//! same reminder again.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 2.0.0: Query only the due set using the stored next reminder instead of
//!   rescanning every active deadline
//! - 1.0.0: Initial release with fixed reminder thresholds

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::format::{expiration_message, reminder_message};
use super::policy::ReminderSchedule;
use crate::core::clock::Clock;
use crate::core::error::StoreError;
use crate::database::{Deadline, Store};
use crate::features::notify::{deliver, Notifier};

/// What a single tick did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Threshold reminders processed
    pub reminded: usize,
    /// Expiration notices processed (deadline deleted)
    pub expired: usize,
    /// Messages the transport did not accept
    pub send_failures: usize,
    /// Deadlines whose new state could not be persisted
    pub failed: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        *self == TickReport::default()
    }
}

enum Outcome {
    Reminded { sent: bool },
    Expired { sent: bool },
}

pub struct ReminderScheduler {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    schedule: ReminderSchedule,
    clock: Arc<dyn Clock>,
    target: u64,
    timezone: Tz,
    poll_interval: Duration,
    send_timeout: Duration,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        schedule: ReminderSchedule,
        clock: Arc<dyn Clock>,
        target: u64,
    ) -> Self {
        Self {
            store,
            notifier,
            schedule,
            clock,
            target,
            timezone: Tz::UTC,
            poll_interval: Duration::from_secs(600),
            send_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Run until `shutdown` is cancelled. Ticks once immediately, then every
    /// poll interval; a tick always finishes before the next one starts.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "⏰ Reminder scheduler started, checking every {}s (schedule: {})",
            self.poll_interval.as_secs(),
            self.schedule
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("⏰ Reminder scheduler shutting down");
                    return;
                }
                _ = interval.tick() => {
                    let report = self.tick().await;
                    if report.is_idle() {
                        debug!("⏰ Tick finished, nothing due");
                    } else {
                        info!(
                            "⏰ Tick finished: {} reminded, {} expired, {} send failures, {} not persisted",
                            report.reminded, report.expired, report.send_failures, report.failed
                        );
                    }
                }
            }
        }
    }

    /// One pass over the due set, processed strictly in order.
    pub async fn tick(&self) -> TickReport {
        let now = self.clock.now();
        let mut report = TickReport::default();

        let due = match self.store.list_due_deadlines(now).await {
            Ok(due) => due,
            Err(e) => {
                error!("Failed to list due deadlines: {e}");
                return report;
            }
        };

        if !due.is_empty() {
            debug!("⏰ {} deadline(s) due at {}", due.len(), now);
        }

        for deadline in &due {
            match self.process(deadline, now).await {
                Ok(Outcome::Reminded { sent }) => {
                    report.reminded += 1;
                    report.send_failures += usize::from(!sent);
                }
                Ok(Outcome::Expired { sent }) => {
                    report.expired += 1;
                    report.send_failures += usize::from(!sent);
                }
                Err(e) if e.is_not_found() => {
                    warn!(
                        "Deadline #{} vanished while being processed (deleted by a user?): {e}",
                        deadline.id
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        "Failed to persist reminder state for deadline #{}: {e}",
                        deadline.id
                    );
                }
            }
        }

        report
    }

    async fn process(&self, deadline: &Deadline, now: DateTime<Utc>) -> Result<Outcome, StoreError> {
        if deadline.is_expiring() {
            let text = expiration_message(&deadline.title, deadline.due_at, &self.timezone);
            let sent = self.send(&text).await;

            self.store.delete_deadline(deadline.id).await?;
            info!("🏁 Deadline #{} '{}' expired and was removed", deadline.id, deadline.title);
            return Ok(Outcome::Expired { sent });
        }

        let text = reminder_message(&deadline.title, deadline.due_at - now);
        let sent = self.send(&text).await;

        let (next_at, next_index) = self
            .schedule
            .next_event(deadline.due_at, deadline.next_reminder_index);
        self.store
            .update_next_reminder(deadline.id, next_at, next_index)
            .await?;

        info!(
            "🔔 Reminder {} sent for deadline #{} '{}', next event at {} (index {})",
            deadline.next_reminder_index, deadline.id, deadline.title, next_at, next_index
        );
        Ok(Outcome::Reminded { sent })
    }

    async fn send(&self, text: &str) -> bool {
        deliver(self.notifier.as_ref(), self.target, text, self.send_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::testing::ManualClock;
    use crate::database::MemoryStore;
    use crate::features::notify::testing::RecordingNotifier;
    use crate::features::reminders::EXPIRATION_INDEX;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};

    const CHANNEL: u64 = 4242;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    struct Harness {
        clock: Arc<ManualClock>,
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
        scheduler: ReminderScheduler,
    }

    fn harness_with(notifier: RecordingNotifier) -> Harness {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(MemoryStore::new(ReminderSchedule::default(), clock.clone()));
        let notifier = Arc::new(notifier);
        let scheduler = ReminderScheduler::new(
            store.clone(),
            notifier.clone(),
            ReminderSchedule::default(),
            clock.clone(),
            CHANNEL,
        )
        .with_send_timeout(Duration::from_millis(50));

        Harness {
            clock,
            store,
            notifier,
            scheduler,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingNotifier::default())
    }

    #[tokio::test]
    async fn test_first_threshold_fires_and_counts_down() {
        let h = harness();
        let d = h.store.add_deadline("Thesis", t0() + ChronoDuration::hours(50)).await.unwrap();
        assert_eq!(d.next_reminder_index, 4);
        assert_eq!(d.next_reminder_at, t0() + ChronoDuration::hours(2));

        // Nothing due before the 48h mark
        h.clock.advance(ChronoDuration::hours(1));
        assert!(h.scheduler.tick().await.is_idle());
        assert!(h.notifier.sent().is_empty());

        h.clock.set(t0() + ChronoDuration::hours(2));
        let report = h.scheduler.tick().await;
        assert_eq!(report.reminded, 1);

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, CHANNEL);
        assert!(sent[0].1.contains("**Thesis**"));
        assert!(sent[0].1.contains("2 days 0 hours"));

        let stored = h.store.list_deadlines().await.unwrap().remove(0);
        assert_eq!(stored.next_reminder_index, 3);
        assert_eq!(stored.next_reminder_at, d.due_at - ChronoDuration::hours(24));

        // Already fired; ticking again at the same instant sends nothing
        assert!(h.scheduler.tick().await.is_idle());
        assert_eq!(h.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_full_lifecycle_visits_every_threshold_once() {
        let h = harness();
        let d = h.store.add_deadline("Exam", t0() + ChronoDuration::hours(50)).await.unwrap();

        let mut indices = vec![d.next_reminder_index];
        loop {
            let current = match h.store.list_deadlines().await.unwrap().pop() {
                Some(current) => current,
                None => break,
            };
            assert!(current.next_reminder_at <= current.due_at);
            h.clock.set(current.next_reminder_at);
            h.scheduler.tick().await;

            if let Some(next) = h.store.list_deadlines().await.unwrap().pop() {
                assert!(next.next_reminder_at >= current.next_reminder_at);
                indices.push(next.next_reminder_index);
            }
        }

        assert_eq!(indices, vec![4, 3, 2, 1, 0, EXPIRATION_INDEX]);
        // Five reminders and one expiration notice
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 6);
        assert!(sent[5].1.contains("Deadline Completed/Expired"));
    }

    #[tokio::test]
    async fn test_index_zero_moves_to_expiring() {
        let h = harness();
        let d = h.store.add_deadline("Quiz", t0() + ChronoDuration::hours(4)).await.unwrap();
        assert_eq!(d.next_reminder_index, 0);

        h.clock.set(d.next_reminder_at);
        h.scheduler.tick().await;

        let stored = h.store.list_deadlines().await.unwrap().remove(0);
        assert_eq!(stored.next_reminder_index, EXPIRATION_INDEX);
        assert_eq!(stored.next_reminder_at, d.due_at);
    }

    #[tokio::test]
    async fn test_short_deadline_only_expires() {
        let h = harness();
        let d = h.store.add_deadline("Call mom", t0() + ChronoDuration::hours(1)).await.unwrap();
        assert_eq!(d.next_reminder_index, EXPIRATION_INDEX);
        assert_eq!(d.next_reminder_at, d.due_at);

        h.clock.advance(ChronoDuration::minutes(59));
        assert!(h.scheduler.tick().await.is_idle());

        h.clock.advance(ChronoDuration::minutes(11));
        let report = h.scheduler.tick().await;
        assert_eq!(report.expired, 1);
        assert!(h.store.list_deadlines().await.unwrap().is_empty());

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("**Call mom**"));
        assert!(sent[0].1.contains("Sat, 01 Mar 2025 10:00 UTC"));
    }

    #[tokio::test]
    async fn test_send_failure_still_advances() {
        let h = harness_with(RecordingNotifier::failing());
        let d = h.store.add_deadline("Taxes", t0() + ChronoDuration::hours(50)).await.unwrap();

        h.clock.set(d.next_reminder_at);
        let report = h.scheduler.tick().await;
        assert_eq!(report.reminded, 1);
        assert_eq!(report.send_failures, 1);

        let stored = h.store.list_deadlines().await.unwrap().remove(0);
        assert_eq!(stored.next_reminder_index, 3);
    }

    #[tokio::test]
    async fn test_hung_transport_is_bounded() {
        let h = harness_with(RecordingNotifier::hanging());
        h.store.add_deadline("a", t0() + ChronoDuration::minutes(30)).await.unwrap();
        h.store.add_deadline("b", t0() + ChronoDuration::minutes(40)).await.unwrap();

        h.clock.advance(ChronoDuration::hours(1));
        let report = h.scheduler.tick().await;
        assert_eq!(report.expired, 2);
        assert_eq!(report.send_failures, 2);
        assert!(h.store.list_deadlines().await.unwrap().is_empty());
    }

    /// Store wrapper that injects faults around a [`MemoryStore`].
    ///
    /// `delete_first_due` removes the first due deadline right after the due
    /// query returns, like a user running `del` mid-tick. `fail_updates`
    /// makes every `update_next_reminder` fail as if the disk went away.
    struct FaultyStore {
        inner: Arc<MemoryStore>,
        delete_first_due: bool,
        fail_updates: bool,
    }

    impl FaultyStore {
        fn racing(inner: Arc<MemoryStore>) -> Self {
            Self {
                inner,
                delete_first_due: true,
                fail_updates: false,
            }
        }

        fn read_only(inner: Arc<MemoryStore>) -> Self {
            Self {
                inner,
                delete_first_due: false,
                fail_updates: true,
            }
        }
    }

    #[async_trait]
    impl Store for FaultyStore {
        async fn add_deadline(&self, title: &str, due_at: DateTime<Utc>) -> Result<Deadline, StoreError> {
            self.inner.add_deadline(title, due_at).await
        }

        async fn list_deadlines(&self) -> Result<Vec<Deadline>, StoreError> {
            self.inner.list_deadlines().await
        }

        async fn list_due_deadlines(&self, now: DateTime<Utc>) -> Result<Vec<Deadline>, StoreError> {
            let due = self.inner.list_due_deadlines(now).await?;
            if self.delete_first_due {
                if let Some(first) = due.first() {
                    self.inner.delete_deadline(first.id).await?;
                }
            }
            Ok(due)
        }

        async fn update_next_reminder(
            &self,
            id: i64,
            next_reminder_at: DateTime<Utc>,
            next_reminder_index: i64,
        ) -> Result<(), StoreError> {
            if self.fail_updates {
                return Err(StoreError::Storage("disk I/O error".to_string()));
            }
            self.inner
                .update_next_reminder(id, next_reminder_at, next_reminder_index)
                .await
        }

        async fn delete_deadline(&self, id: i64) -> Result<(), StoreError> {
            self.inner.delete_deadline(id).await
        }

        async fn add_basket(&self, name: &str) -> Result<(), StoreError> {
            self.inner.add_basket(name).await
        }

        async fn list_baskets(&self) -> Result<Vec<String>, StoreError> {
            self.inner.list_baskets().await
        }

        async fn delete_basket(&self, name: &str) -> Result<(), StoreError> {
            self.inner.delete_basket(name).await
        }

        async fn add_pin(&self, basket: &str, content: &str) -> Result<crate::database::Pin, StoreError> {
            self.inner.add_pin(basket, content).await
        }

        async fn list_pins(&self, basket: &str) -> Result<Vec<crate::database::Pin>, StoreError> {
            self.inner.list_pins(basket).await
        }

        async fn delete_pin(&self, basket: &str, id: i64) -> Result<(), StoreError> {
            self.inner.delete_pin(basket, id).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_delete_is_benign() {
        let clock = Arc::new(ManualClock::new(t0()));
        let inner = Arc::new(MemoryStore::new(ReminderSchedule::default(), clock.clone()));
        let notifier = Arc::new(RecordingNotifier::default());

        let gone = inner.add_deadline("gone", t0() + ChronoDuration::hours(49)).await.unwrap();
        let kept = inner.add_deadline("kept", t0() + ChronoDuration::hours(50)).await.unwrap();

        let scheduler = ReminderScheduler::new(
            Arc::new(FaultyStore::racing(inner.clone())),
            notifier.clone(),
            ReminderSchedule::default(),
            clock.clone(),
            CHANNEL,
        );

        clock.set(kept.next_reminder_at);
        let report = scheduler.tick().await;

        // The deleted one is skipped without counting as a failure
        assert_eq!(report.failed, 0);
        assert_eq!(report.reminded, 1);
        assert_eq!(notifier.sent().len(), 2);

        let remaining = inner.list_deadlines().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, kept.id);
        assert_eq!(remaining[0].next_reminder_index, 3);
        assert_ne!(remaining[0].id, gone.id);
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_deadline_due() {
        let clock = Arc::new(ManualClock::new(t0()));
        let inner = Arc::new(MemoryStore::new(ReminderSchedule::default(), clock.clone()));
        let notifier = Arc::new(RecordingNotifier::default());
        let d = inner.add_deadline("Report", t0() + ChronoDuration::hours(50)).await.unwrap();

        let scheduler = ReminderScheduler::new(
            Arc::new(FaultyStore::read_only(inner.clone())),
            notifier.clone(),
            ReminderSchedule::default(),
            clock.clone(),
            CHANNEL,
        );

        clock.set(d.next_reminder_at);
        let report = scheduler.tick().await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.reminded, 0);
        assert_eq!(report.send_failures, 0);
        assert_eq!(notifier.sent().len(), 1);

        // The record is untouched, so the same reminder goes out again
        assert_eq!(inner.list_deadlines().await.unwrap(), vec![d.clone()]);

        clock.advance(ChronoDuration::minutes(10));
        let report = scheduler.tick().await;
        assert_eq!(report.failed, 1);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].1.contains("**Report**"));
        assert_eq!(inner.list_deadlines().await.unwrap(), vec![d]);
    }

    #[tokio::test]
    async fn test_run_ticks_immediately_and_stops_on_shutdown() {
        let h = harness();
        h.store.add_deadline("now", t0() - ChronoDuration::minutes(1)).await.unwrap();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(
            h.scheduler
                .with_poll_interval(Duration::from_secs(3600))
                .run(shutdown.clone()),
        );

        for _ in 0..100 {
            if !h.notifier.sent().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.notifier.sent().len(), 1);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
