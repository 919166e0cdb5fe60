//! Help command handler
//!
//! Handles: h, help

use async_trait::async_trait;

use crate::commands::context::CommandContext;
use crate::commands::handler::{Args, CommandHandler, CommandResult};

pub struct HelpHandler;

#[async_trait]
impl CommandHandler for HelpHandler {
    fn command_names(&self) -> &'static [&'static str] {
        &["h", "help"]
    }

    async fn handle(&self, ctx: &CommandContext, _command: &str, _args: Args<'_>) -> CommandResult {
        Ok(help_text(&ctx.prefix, ctx.timezone.name()))
    }
}

pub fn help_text(prefix: &str, timezone: &str) -> String {
    let p = prefix;
    format!(
        "📖 **Remy commands**\n\
         \n\
         **Deadlines** (times are {timezone})\n\
         `{p}d` list deadlines\n\
         `{p}d add YYYY-MM-DD HH:MM title` add a deadline\n\
         `{p}d del id` delete a deadline\n\
         \n\
         **Pins**\n\
         `{p}p` list baskets\n\
         `{p}p new basket` / `{p}p drop basket` create or delete a basket\n\
         `{p}p add basket text` pin text to a basket\n\
         `{p}p list basket` show a basket\n\
         `{p}p del basket id` remove a pin\n\
         \n\
         `{p}h` this help"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_uses_prefix_and_timezone() {
        let text = help_text("!", "Asia/Kolkata");
        assert!(text.contains("`!d add YYYY-MM-DD HH:MM title`"));
        assert!(text.contains("`!p del basket id`"));
        assert!(text.contains("times are Asia/Kolkata"));
        assert!(!text.contains("`.d"));
    }
}
