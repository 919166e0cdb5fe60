//! # Notifier
//!
//! Outbound message delivery. The scheduler only knows the [`Notifier`]
//! trait; production posts to a Discord channel through serenity's HTTP
//! client.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use async_trait::async_trait;
use log::{debug, error};
use serenity::http::Http;
use serenity::model::id::ChannelId;
use std::sync::Arc;
use std::time::Duration;

use crate::core::error::TransportError;
use crate::core::response::truncate_for_message;

/// Delivery capability: post `text` to the channel identified by `target`.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, target: u64, text: &str) -> Result<(), TransportError>;
}

/// Posts to Discord channels
pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, target: u64, text: &str) -> Result<(), TransportError> {
        ChannelId(target)
            .say(&self.http, truncate_for_message(text))
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Rejected(e.to_string()))
    }
}

/// Fire-and-forget send bounded by `limit`.
///
/// Failures are logged here and reported back only as `false`, so callers
/// can count them without ever propagating them.
pub async fn deliver(notifier: &dyn Notifier, target: u64, text: &str, limit: Duration) -> bool {
    let result = match tokio::time::timeout(limit, notifier.send(target, text)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(limit)),
    };

    match result {
        Ok(()) => {
            debug!("📤 Delivered message to channel {target}");
            true
        }
        Err(e) => {
            error!("❌ Failed to deliver message to channel {target}: {e}");
            false
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;

    #[tokio::test]
    async fn test_deliver_success() {
        let notifier = RecordingNotifier::default();
        assert!(deliver(&notifier, 7, "hi", Duration::from_secs(1)).await);
        assert_eq!(notifier.sent(), vec![(7, "hi".to_string())]);
    }

    #[tokio::test]
    async fn test_deliver_failure_is_swallowed() {
        let notifier = RecordingNotifier::failing();
        assert!(!deliver(&notifier, 7, "hi", Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_deliver_times_out() {
        let notifier = RecordingNotifier::hanging();
        assert!(!deliver(&notifier, 7, "hi", Duration::from_millis(20)).await);
        assert!(notifier.sent().is_empty());
    }
}
