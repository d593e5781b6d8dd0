//! Notification dispatcher: fans a notification out to every
//! configured channel, each behind its own throttle, with a persisted
//! per-(event, channel) dedup ledger so an event is delivered at most
//! once per channel across restarts.

use std::sync::Arc;

use futures::future::join_all;

use govwatch_core::Result;
use govwatch_core::notify::Notifier;
use govwatch_core::types::Notification;
use govwatch_store::Store;

use crate::Channel;
use crate::throttle::Throttle;

struct ChannelSlot {
    channel: Arc<dyn Channel>,
    throttle: Throttle,
}

/// Owns the channel clients and the ledger access. One instance per
/// process; the throttles inside are the channel-wide serialization
/// points shared by all spaces.
pub struct NotificationDispatcher {
    channels: Vec<ChannelSlot>,
    store: Arc<dyn Store>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn Store>, channels: Vec<Arc<dyn Channel>>) -> Self {
        let channels = channels
            .into_iter()
            .map(|channel| ChannelSlot {
                throttle: Throttle::new(channel.min_interval()),
                channel,
            })
            .collect();
        Self { channels, store }
    }

    /// Names of the configured channels.
    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|s| s.channel.name()).collect()
    }

    async fn dispatch_inner(&self, notification: &Notification) -> Result<()> {
        let delivered = self
            .store
            .delivered_channels(notification.tx_hash())
            .await?;

        let pending: Vec<&ChannelSlot> = self
            .channels
            .iter()
            .filter(|slot| !delivered.iter().any(|name| name == slot.channel.name()))
            .collect();

        // Channels proceed in parallel; overall latency is bounded by
        // the slowest one. A failed channel leaves no ledger row and
        // never affects its siblings; recovery happens if the same
        // event is dispatched again.
        join_all(pending.into_iter().map(|slot| async move {
            slot.throttle.acquire().await;
            let name = slot.channel.name();
            match slot.channel.deliver(notification).await {
                Ok(()) => {
                    if let Err(e) = self
                        .store
                        .record_delivery(
                            notification.tx_hash(),
                            notification.block_number(),
                            name,
                        )
                        .await
                    {
                        tracing::warn!(
                            channel = name,
                            tx_hash = notification.tx_hash(),
                            "Delivered but failed to record: {e}"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        channel = name,
                        tx_hash = notification.tx_hash(),
                        "Delivery failed: {e}"
                    );
                }
            }
        }))
        .await;

        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for NotificationDispatcher {
    async fn dispatch(&self, notification: &Notification) -> Result<()> {
        self.dispatch_inner(notification).await
    }
}
