//! Pin basket command handlers
//!
//! Handles: p (baskets, new, drop, add, list, del)

use async_trait::async_trait;
use log::info;

use super::deadline::parse_id;
use crate::commands::context::CommandContext;
use crate::commands::handler::{Args, CommandError, CommandHandler, CommandResult};

pub struct PinHandler;

#[async_trait]
impl CommandHandler for PinHandler {
    fn command_names(&self) -> &'static [&'static str] {
        &["p"]
    }

    async fn handle(&self, ctx: &CommandContext, _command: &str, mut args: Args<'_>) -> CommandResult {
        let p = &ctx.prefix;
        let usage = |form: &str| CommandError::Usage(format!("{p}p {form}"));

        match args.next_word().map(str::to_lowercase).as_deref() {
            None | Some("baskets") => {
                let baskets = ctx.store.list_baskets().await?;
                if baskets.is_empty() {
                    return Ok(format!("🧺 No baskets yet. Create one with `{p}p new name`"));
                }
                let mut lines = vec!["🧺 **Baskets**".to_string()];
                lines.extend(baskets.iter().map(|b| format!("- {b}")));
                Ok(lines.join("\n"))
            }
            Some("new") => {
                let name = args.next_word().ok_or_else(|| usage("new name"))?;
                ctx.store.add_basket(name).await?;
                info!("🧺 Basket '{name}' created");
                Ok(format!("🧺 Basket **{}** created", name.to_lowercase()))
            }
            Some("drop") => {
                let name = args.next_word().ok_or_else(|| usage("drop name"))?;
                ctx.store.delete_basket(name).await?;
                info!("🧺 Basket '{name}' dropped");
                Ok(format!("🗑️ Basket **{}** dropped with all its pins", name.to_lowercase()))
            }
            Some("add") => {
                let basket = args.next_word().ok_or_else(|| usage("add basket text"))?;
                let content = args.remainder();
                if content.is_empty() {
                    return Err(usage("add basket text"));
                }
                let pin = ctx.store.add_pin(basket, content).await?;
                Ok(format!("📌 Pinned #{} to **{}**", pin.id, basket.to_lowercase()))
            }
            Some("list") => {
                let basket = args.next_word().ok_or_else(|| usage("list basket"))?;
                let pins = ctx.store.list_pins(basket).await?;
                let basket = basket.to_lowercase();
                if pins.is_empty() {
                    return Ok(format!("📭 Basket **{basket}** is empty"));
                }
                let mut lines = vec![format!("📌 **{basket}** ({})", pins.len())];
                lines.extend(pins.iter().map(|pin| format!("#{} {}", pin.id, pin.content)));
                Ok(lines.join("\n"))
            }
            Some("del") => {
                let basket = args.next_word().ok_or_else(|| usage("del basket id"))?;
                let raw = args.next_word().ok_or_else(|| usage("del basket id"))?;
                let id = parse_id(raw, "pin")?;
                ctx.store.delete_pin(basket, id).await?;
                Ok(format!("🗑️ Pin #{id} removed from **{}**", basket.to_lowercase()))
            }
            Some(_) => Err(usage("[baskets|new|drop|add|list|del]")),
        }
    }
}
