//! Outbound notification channels and the deduplicating dispatcher.

pub mod dispatcher;
pub mod email;
pub mod slack;
pub mod telegram;
pub mod throttle;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use govwatch_core::Result;
use govwatch_core::config::ChannelConfig;
use govwatch_core::lifecycle::LifecycleObserver;
use govwatch_core::types::Notification;

pub use dispatcher::NotificationDispatcher;

/// An independent outbound notification transport. Each channel
/// renders its own content for a notification and delivers it.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Minimum spacing between two sends on this channel, enforced by
    /// the dispatcher's per-channel throttle.
    fn min_interval(&self) -> Duration;

    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Construct every channel with usable configuration. Channels with
/// missing configuration are reported once through the observer and
/// excluded for the process lifetime.
pub fn build_channels(
    config: &ChannelConfig,
    observer: &dyn LifecycleObserver,
) -> Vec<Arc<dyn Channel>> {
    let mut channels: Vec<Arc<dyn Channel>> = Vec::new();

    match &config.telegram {
        Some(cfg) if !cfg.bot_token.is_empty() && !cfg.chat_id.is_empty() => {
            channels.push(Arc::new(telegram::TelegramChannel::new(cfg.clone())));
            observer.channel_ready(telegram::CHANNEL_NAME);
        }
        _ => observer.channel_disabled(telegram::CHANNEL_NAME, &["bot_token", "chat_id"]),
    }

    match &config.slack {
        Some(cfg) if !cfg.webhook_url.is_empty() => {
            channels.push(Arc::new(slack::SlackChannel::new(cfg.clone())));
            observer.channel_ready(slack::CHANNEL_NAME);
        }
        _ => observer.channel_disabled(slack::CHANNEL_NAME, &["webhook_url"]),
    }

    match &config.email {
        Some(cfg) => match email::EmailChannel::new(cfg.clone()) {
            Ok(channel) => {
                channels.push(Arc::new(channel));
                observer.channel_ready(email::CHANNEL_NAME);
            }
            Err(_) => observer.channel_disabled(
                email::CHANNEL_NAME,
                &["smtp_host", "smtp_user", "smtp_password", "from", "to"],
            ),
        },
        None => observer.channel_disabled(
            email::CHANNEL_NAME,
            &["smtp_host", "smtp_user", "smtp_password", "from", "to"],
        ),
    }

    channels
}
