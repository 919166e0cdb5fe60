use anyhow::Result;
use chrono::Utc;
use dotenvy::dotenv;
use log::{debug, error, info, warn};
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use remy::commands::{CommandContext, CommandDispatcher};
use remy::core::config::COMMAND_RATE_WINDOW;
use remy::core::{chunk_for_message, Clock, Config, SystemClock};
use remy::database::open_store;
use remy::features::notify::{deliver, DiscordNotifier, Notifier};
use remy::features::rate_limiting::{Admission, RateLimiter};
use remy::features::reminders::ReminderScheduler;

const GREETING: &str = "Remy has entered the chat. Type .h for help!";
const FAREWELL: &str = "Remy left the chat. See you soon!";

struct Handler {
    dispatcher: Arc<CommandDispatcher>,
    rate_limiter: Arc<RateLimiter>,
    target_channel: u64,
    send_timeout: Duration,
    greeted: AtomicBool,
}

impl Handler {
    fn greeting(&self) -> String {
        GREETING.replacen(".h", &format!("{}h", self.dispatcher.context().prefix), 1)
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || msg.channel_id.0 != self.target_channel {
            return;
        }
        if self.dispatcher.parse(&msg.content).is_none() {
            return;
        }

        let request_id = Uuid::new_v4();
        let user_id = msg.author.id.0;
        debug!(
            "[{request_id}] 📥 Command from {} ({user_id}): {}",
            msg.author.name, msg.content
        );

        if let Admission::Limited { retry_after } = self.rate_limiter.check(user_id) {
            warn!("[{request_id}] 🚫 Rate limit exceeded for user: {user_id}");
            let text = format!(
                "🐢 Slow down! Try again in {}s.",
                retry_after.as_secs().max(1)
            );
            if let Err(why) = msg.channel_id.say(&ctx.http, text).await {
                error!("[{request_id}] Failed to send rate limit message: {why}");
            }
            return;
        }

        let Some(reply) = self.dispatcher.dispatch(&msg.content, &request_id.to_string()).await else {
            return;
        };

        for chunk in chunk_for_message(&reply) {
            if let Err(why) = msg.channel_id.say(&ctx.http, chunk).await {
                error!("[{request_id}] ❌ Failed to send reply: {why}");
                return;
            }
        }
        debug!("[{request_id}] 📤 Reply sent");
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🎉 {} is connected and ready!", ready.user.name);
        info!("📡 Connected to {} guilds", ready.guilds.len());
        info!("🤖 Bot ID: {}", ready.user.id);

        if let Some(shard) = ready.shard {
            info!("⚡ Shard: {}/{}", shard[0] + 1, shard[1]);
        }

        // Reconnects deliver Ready again; greet only once per process
        if self.greeted.swap(true, Ordering::SeqCst) {
            debug!("🔁 Gateway reconnected, skipping greeting");
            return;
        }

        let notifier = DiscordNotifier::new(ctx.http.clone());
        if deliver(&notifier, self.target_channel, &self.greeting(), self.send_timeout).await {
            info!("👋 Greeting sent to channel {}", self.target_channel);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting Remy...");

    let now_local = Utc::now().with_timezone(&config.display_timezone);
    info!(
        "🕒 Display timezone: {} ({}, UTC{})",
        config.display_timezone.name(),
        now_local.format("%Z"),
        now_local.format("%:z")
    );
    info!("⏰ Reminder schedule: {}", config.reminder_schedule);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = open_store(&config, config.reminder_schedule.clone(), clock.clone())?;

    let dispatcher = Arc::new(CommandDispatcher::new(CommandContext::new(
        store.clone(),
        clock.clone(),
        config.display_timezone,
        config.command_prefix.clone(),
    )));
    let rate_limiter = Arc::new(RateLimiter::new(config.command_rate_limit, COMMAND_RATE_WINDOW));

    let handler = Handler {
        dispatcher,
        rate_limiter: rate_limiter.clone(),
        target_channel: config.target_channel_id,
        send_timeout: config.send_timeout,
        greeted: AtomicBool::new(false),
    };

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| {
            error!("Failed to create Discord client: {e}");
            error!("This could indicate:");
            error!("  - Invalid bot token format");
            error!("  - Network issues reaching Discord API");
            anyhow::anyhow!("Client creation failed: {}", e)
        })?;

    info!("Bot configured successfully. Connecting to Discord gateway...");

    let shutdown = CancellationToken::new();
    let notifier: Arc<dyn Notifier> = Arc::new(DiscordNotifier::new(client.cache_and_http.http.clone()));

    // Start the reminder scheduler
    let scheduler = ReminderScheduler::new(
        store,
        notifier.clone(),
        config.reminder_schedule.clone(),
        clock,
        config.target_channel_id,
    )
    .with_timezone(config.display_timezone)
    .with_poll_interval(config.poll_interval)
    .with_send_timeout(config.send_timeout);
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));

    // Forget idle users in the rate limiter
    let prune_token = shutdown.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = prune_token.cancelled() => return,
                _ = interval.tick() => rate_limiter.prune(),
            }
        }
    });

    let shard_manager = client.shard_manager.clone();
    let signal_token = shutdown.clone();
    let target_channel = config.target_channel_id;
    let send_timeout = config.send_timeout;
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {e}");
            return;
        }
        info!("🛑 Shutdown requested");
        signal_token.cancel();

        if deliver(notifier.as_ref(), target_channel, FAREWELL, send_timeout).await {
            info!("👋 Farewell sent to channel {target_channel}");
        }
        shard_manager.lock().await.shutdown_all().await;
    });

    info!("Establishing WebSocket connection to Discord gateway...");
    info!("Gateway intents: {intents:?}");

    let result = client.start().await;

    shutdown.cancel();
    if let Err(e) = scheduler_handle.await {
        error!("Reminder scheduler task failed: {e}");
    }

    if let Err(why) = result {
        error!("Gateway connection failed: {why:?}");
        error!("This could be due to:");
        error!("  - Invalid bot token");
        error!("  - Network connectivity issues");
        error!("  - Discord API outage");
        return Err(anyhow::anyhow!(
            "Failed to establish gateway connection: {}",
            why
        ));
    }

    info!("Remy stopped");
    Ok(())
}
