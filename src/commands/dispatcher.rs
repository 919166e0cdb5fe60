//! # Command Dispatcher
//!
//! Turns a chat message into a reply: strips the prefix, looks up the
//! handler for the command word and renders errors as user-facing text.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use log::{debug, error, info, warn};

use super::context::CommandContext;
use super::handler::{Args, CommandError};
use super::handlers::create_all_handlers;
use super::registry::CommandRegistry;
use crate::core::error::StoreError;

pub struct CommandDispatcher {
    ctx: CommandContext,
    registry: CommandRegistry,
}

impl CommandDispatcher {
    pub fn new(ctx: CommandContext) -> Self {
        let mut registry = CommandRegistry::new();
        for handler in create_all_handlers() {
            registry.register(handler);
        }
        Self { ctx, registry }
    }

    pub fn context(&self) -> &CommandContext {
        &self.ctx
    }

    /// Split `input` into command word and arguments if it carries the prefix
    pub fn parse<'a>(&self, input: &'a str) -> Option<(&'a str, Args<'a>)> {
        let body = input.trim_start().strip_prefix(self.ctx.prefix.as_str())?;
        // A bare prefix or a prefix followed by a space is not a command
        if body.is_empty() || body.starts_with(char::is_whitespace) {
            return None;
        }
        let (word, rest) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
        Some((word, Args::new(rest)))
    }

    /// Handle one message. `None` means the message was not a command.
    pub async fn dispatch(&self, input: &str, request_id: &str) -> Option<String> {
        let (word, args) = self.parse(input)?;

        let Some(handler) = self.registry.get(word) else {
            debug!("[{request_id}] Unknown command '{word}'");
            return Some(format!(
                "❓ unknown command, use {}h for help",
                self.ctx.prefix
            ));
        };

        info!("[{request_id}] ⚙️ Running command '{word}'");
        let reply = match handler.handle(&self.ctx, &word.to_lowercase(), args).await {
            Ok(reply) => reply,
            Err(e) => self.render_error(&e, word, request_id),
        };
        Some(reply)
    }

    fn render_error(&self, e: &CommandError, word: &str, request_id: &str) -> String {
        match e {
            CommandError::Usage(form) => format!("❌ Usage: `{form}`"),
            CommandError::Invalid(reason) => format!("❌ {reason}"),
            CommandError::Store(StoreError::Validation(reason)) => format!("❌ {reason}"),
            CommandError::Store(
                err @ (StoreError::NotFound { .. } | StoreError::AlreadyExists { .. }),
            ) => {
                format!("❌ {}", capitalize(&err.to_string()))
            }
            CommandError::Store(err) if err.is_transient() => {
                warn!("[{request_id}] Command '{word}' timed out in the store: {err}");
                "⏳ The database is busy, try again in a moment.".to_string()
            }
            CommandError::Store(err) => {
                error!("[{request_id}] Command '{word}' failed: {err}");
                "⚠️ Something went wrong while saving that, please try again later.".to_string()
            }
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::testing::ManualClock;
    use crate::database::{MemoryStore, Store};
    use crate::features::reminders::{ReminderSchedule, EXPIRATION_INDEX};
    use chrono::{DateTime, TimeZone, Utc};
    use chrono_tz::Tz;
    use std::sync::Arc;

    const REQ: &str = "test";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn dispatcher_in(tz: Tz) -> (CommandDispatcher, Arc<MemoryStore>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(MemoryStore::new(ReminderSchedule::default(), clock.clone()));
        let ctx = CommandContext::new(store.clone(), clock, tz, ".");
        (CommandDispatcher::new(ctx), store)
    }

    fn dispatcher() -> (CommandDispatcher, Arc<MemoryStore>) {
        dispatcher_in(Tz::UTC)
    }

    async fn reply(d: &CommandDispatcher, input: &str) -> String {
        d.dispatch(input, REQ).await.expect("expected a reply")
    }

    #[tokio::test]
    async fn test_non_commands_are_ignored() {
        let (d, _) = dispatcher();
        assert!(d.dispatch("hello there", REQ).await.is_none());
        assert!(d.dispatch(".", REQ).await.is_none());
        assert!(d.dispatch(". d", REQ).await.is_none());
        assert!(d.dispatch("", REQ).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (d, _) = dispatcher();
        assert_eq!(reply(&d, ".xyz").await, "❓ unknown command, use .h for help");
    }

    #[tokio::test]
    async fn test_help() {
        let (d, _) = dispatcher();
        let text = reply(&d, ".h").await;
        assert!(text.contains("`.d add YYYY-MM-DD HH:MM title`"));
        assert_eq!(reply(&d, ".HELP").await, text);
    }

    #[tokio::test]
    async fn test_add_and_list_deadlines() {
        let (d, store) = dispatcher();

        let added = reply(&d, ".d add 2025-03-03 11:00 Submit thesis draft").await;
        assert!(added.starts_with("✅ Deadline #1 added: **Submit thesis draft**"), "{added}");
        assert!(added.contains("Mon, 03 Mar 2025 11:00 UTC"));
        // 50h away: first reminder is the 48h one, 2h from now
        assert!(added.contains("First reminder in 2 hours 0 minutes"), "{added}");

        let stored = store.list_deadlines().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].due_at, Utc.with_ymd_and_hms(2025, 3, 3, 11, 0, 0).unwrap());
        assert_eq!(stored[0].next_reminder_index, 4);

        let close = reply(&d, ".d add 2025-03-01 10:00 Standup").await;
        assert!(close.contains("only the expiration notice"), "{close}");
        assert_eq!(store.list_deadlines().await.unwrap()[0].next_reminder_index, EXPIRATION_INDEX);

        let list = reply(&d, ".d").await;
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "#2 Standup, due Sat, 01 Mar 2025 10:00 UTC (in 1 hour 0 minutes)");
        assert!(lines[2].starts_with("#1 Submit thesis draft"));
        assert_eq!(reply(&d, ".d list").await, list);
    }

    #[tokio::test]
    async fn test_add_in_display_timezone() {
        let (d, store) = dispatcher_in(chrono_tz::Asia::Kolkata);
        let added = reply(&d, ".d add 2025-03-02 18:00 Pay rent").await;
        assert!(added.contains("Sun, 02 Mar 2025 18:00 IST"), "{added}");

        let stored = store.list_deadlines().await.unwrap();
        assert_eq!(stored[0].due_at, Utc.with_ymd_and_hms(2025, 3, 2, 12, 30, 0).unwrap());
    }

    #[tokio::test]
    async fn test_add_rejections() {
        let (d, store) = dispatcher();

        assert!(reply(&d, ".d add 2025-03-01 08:59 Too late").await.contains("not in the future"));
        assert!(reply(&d, ".d add 2025-03-01 09:00 Right now").await.contains("not in the future"));
        assert!(reply(&d, ".d add 01/03/2025 10:00 Wrong").await.contains("expected YYYY-MM-DD"));
        assert!(reply(&d, ".d add 2025-03-02 10:00").await.starts_with("❌ Usage:"));
        assert!(reply(&d, ".d add").await.starts_with("❌ Usage:"));
        assert!(store.list_deadlines().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_deadline() {
        let (d, store) = dispatcher();
        reply(&d, ".d add 2025-03-05 12:00 Exam").await;

        assert_eq!(reply(&d, ".d del 1").await, "🗑️ Deadline #1 deleted");
        assert!(store.list_deadlines().await.unwrap().is_empty());
        assert_eq!(reply(&d, ".d del 1").await, "❌ Deadline 1 does not exist");
        assert!(reply(&d, ".d del abc").await.contains("must be a number"));
        assert!(reply(&d, ".d nope").await.starts_with("❌ Usage:"));
    }

    #[tokio::test]
    async fn test_pin_flow() {
        let (d, _) = dispatcher();

        assert!(reply(&d, ".p").await.contains("No baskets yet"));
        assert_eq!(reply(&d, ".p new Reading").await, "🧺 Basket **reading** created");
        assert_eq!(reply(&d, ".p new reading").await, "❌ Basket reading already exists");
        assert_eq!(reply(&d, ".p baskets").await, "🧺 **Baskets**\n- reading");

        assert_eq!(
            reply(&d, ".p add reading Designing Data-Intensive Applications").await,
            "📌 Pinned #1 to **reading**"
        );
        assert_eq!(
            reply(&d, ".p list READING").await,
            "📌 **reading** (1)\n#1 Designing Data-Intensive Applications"
        );

        assert_eq!(reply(&d, ".p del reading 1").await, "🗑️ Pin #1 removed from **reading**");
        assert!(reply(&d, ".p list reading").await.contains("is empty"));
        assert_eq!(reply(&d, ".p add missing text").await, "❌ Basket missing does not exist");

        assert!(reply(&d, ".p drop reading").await.contains("dropped"));
        assert!(reply(&d, ".p add reading").await.starts_with("❌ Usage:"));
    }
}
