//! Deadline command handlers
//!
//! Handles: d (list, add, del)
//!
//! - **Version**: 2.0.0
//! - **Since**: 3.38.0
//!
//! ## Changelog
//! - 2.0.0: Absolute due times in the display timezone replace relative reminders
//! - 1.0.0: Extracted from command_handler.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::info;

use crate::commands::context::CommandContext;
use crate::commands::handler::{Args, CommandError, CommandHandler, CommandResult};
use crate::features::reminders::{format_local, format_remaining};

const ADD_USAGE: &str = "d add YYYY-MM-DD HH:MM title";
const DEL_USAGE: &str = "d del id";

pub struct DeadlineHandler;

#[async_trait]
impl CommandHandler for DeadlineHandler {
    fn command_names(&self) -> &'static [&'static str] {
        &["d"]
    }

    async fn handle(&self, ctx: &CommandContext, _command: &str, mut args: Args<'_>) -> CommandResult {
        match args.next_word().map(str::to_lowercase).as_deref() {
            None | Some("list") => self.handle_list(ctx).await,
            Some("add") => self.handle_add(ctx, args).await,
            Some("del") => self.handle_del(ctx, args).await,
            Some(_) => Err(CommandError::Usage(format!(
                "{p}d, {p}{ADD_USAGE} or {p}{DEL_USAGE}",
                p = ctx.prefix
            ))),
        }
    }
}

impl DeadlineHandler {
    async fn handle_list(&self, ctx: &CommandContext) -> CommandResult {
        let deadlines = ctx.store.list_deadlines().await?;
        if deadlines.is_empty() {
            return Ok(format!(
                "📭 No deadlines. Add one with `{}{ADD_USAGE}`",
                ctx.prefix
            ));
        }

        let now = ctx.now();
        let mut lines = vec![format!("📅 **Deadlines** ({})", deadlines.len())];
        for d in &deadlines {
            lines.push(format!(
                "#{} {}, due {} (in {})",
                d.id,
                d.title,
                format_local(d.due_at, &ctx.timezone),
                format_remaining(d.due_at - now)
            ));
        }
        Ok(lines.join("\n"))
    }

    async fn handle_add(&self, ctx: &CommandContext, mut args: Args<'_>) -> CommandResult {
        let usage = || CommandError::Usage(format!("{}{ADD_USAGE}", ctx.prefix));

        let date = args.next_word().ok_or_else(usage)?;
        let time = args.next_word().ok_or_else(usage)?;
        let title = args.remainder();
        if title.is_empty() {
            return Err(usage());
        }

        let due_at = parse_local_due(date, time, &ctx.timezone)?;
        let now = ctx.now();
        if due_at <= now {
            return Err(CommandError::Invalid(format!(
                "{} is not in the future",
                format_local(due_at, &ctx.timezone)
            )));
        }

        let deadline = ctx.store.add_deadline(title, due_at).await?;
        info!(
            "📅 Deadline #{} '{}' added, due {} (next event index {})",
            deadline.id, deadline.title, deadline.due_at, deadline.next_reminder_index
        );

        let follow_up = if deadline.is_expiring() {
            "Too close for reminders, only the expiration notice will be sent.".to_string()
        } else {
            format!(
                "First reminder in {} ({}).",
                format_remaining(deadline.next_reminder_at - now),
                format_local(deadline.next_reminder_at, &ctx.timezone)
            )
        };

        Ok(format!(
            "✅ Deadline #{} added: **{}**, due {}\n{}",
            deadline.id,
            deadline.title,
            format_local(deadline.due_at, &ctx.timezone),
            follow_up
        ))
    }

    async fn handle_del(&self, ctx: &CommandContext, mut args: Args<'_>) -> CommandResult {
        let raw = args
            .next_word()
            .ok_or_else(|| CommandError::Usage(format!("{}{DEL_USAGE}", ctx.prefix)))?;
        let id = parse_id(raw, "deadline")?;

        ctx.store.delete_deadline(id).await?;
        info!("🗑️ Deadline #{id} deleted");
        Ok(format!("🗑️ Deadline #{id} deleted"))
    }
}

/// Resolve a wall-clock date and time in `tz` to a UTC instant.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant; times
/// skipped by a DST jump are rejected.
pub fn parse_local_due(date: &str, time: &str, tz: &Tz) -> Result<DateTime<Utc>, CommandError> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| CommandError::Invalid(format!("'{date}' is not a date, expected YYYY-MM-DD")))?;
    let time = NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| CommandError::Invalid(format!("'{time}' is not a time, expected HH:MM")))?;
    let local = date.and_time(time);

    tz.from_local_datetime(&local)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
        .ok_or_else(|| {
            CommandError::Invalid(format!("{local} does not exist in {}", tz.name()))
        })
}

pub(crate) fn parse_id(raw: &str, entity: &str) -> Result<i64, CommandError> {
    raw.trim_start_matches('#')
        .parse::<i64>()
        .map_err(|_| CommandError::Invalid(format!("{entity} id must be a number, got '{raw}'")))
}
