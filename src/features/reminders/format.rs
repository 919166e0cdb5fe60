//! Reminder and expiration message text.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

/// Display format for due times in the configured timezone
pub const DISPLAY_FORMAT: &str = "%a, %d %b %Y %H:%M %Z";

const MS_PER_MINUTE: i64 = 60_000;
const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = MINUTES_PER_HOUR * 24;

fn unit(count: i64, name: &str) -> String {
    format!("{} {}{}", count, name, if count == 1 { "" } else { "s" })
}

/// Render time left until a deadline using its two most significant units.
///
/// Remaining time is rounded to whole minutes, with an exact half minute
/// rounding down. Zero or negative renders "now", anything that rounds to
/// zero minutes renders "less than a minute".
pub fn format_remaining(remaining: Duration) -> String {
    if remaining <= Duration::zero() {
        return "now".to_string();
    }

    let ms = remaining.num_milliseconds();
    let total_minutes = ms / MS_PER_MINUTE + i64::from(ms % MS_PER_MINUTE > MS_PER_MINUTE / 2);
    if total_minutes == 0 {
        return "less than a minute".to_string();
    }

    let days = total_minutes / MINUTES_PER_DAY;
    let hours = (total_minutes % MINUTES_PER_DAY) / MINUTES_PER_HOUR;
    let minutes = total_minutes % MINUTES_PER_HOUR;

    if days > 0 {
        format!("{} {}", unit(days, "day"), unit(hours, "hour"))
    } else if hours > 0 {
        format!("{} {}", unit(hours, "hour"), unit(minutes, "minute"))
    } else {
        unit(minutes, "minute")
    }
}

/// Format a UTC instant for humans in the display timezone
pub fn format_local(at: DateTime<Utc>, tz: &Tz) -> String {
    at.with_timezone(tz).format(DISPLAY_FORMAT).to_string()
}

/// Text sent when a reminder threshold fires
pub fn reminder_message(title: &str, remaining: Duration) -> String {
    let when = format_remaining(remaining);
    if when == "now" {
        format!("⏰ **Deadline Alert!**\nTask: **{title}**\nThis is due **now**!")
    } else {
        format!("⏰ **Deadline Alert!**\nTask: **{title}**\nThis is due in **{when}**!")
    }
}

/// Text sent when the deadline itself passes
pub fn expiration_message(title: &str, due_at: DateTime<Utc>, tz: &Tz) -> String {
    format!(
        "🏁 **Deadline Completed/Expired!**\n\nTask: **{}**\nWas due on: {}",
        title,
        format_local(due_at, tz)
    )
}
