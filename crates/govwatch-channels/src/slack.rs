//! Slack channel — posts to an incoming webhook.

use async_trait::async_trait;
use std::time::Duration;

use govwatch_core::config::SlackConfig;
use govwatch_core::types::Notification;
use govwatch_core::{GovWatchError, Result};

use crate::Channel;

pub const CHANNEL_NAME: &str = "slack";

// https://api.slack.com/apis/rate-limits#overview
const MIN_INTERVAL: Duration = Duration::from_millis(1000);

pub struct SlackChannel {
    config: SlackConfig,
    client: reqwest::Client,
}

impl SlackChannel {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Channel for SlackChannel {
    fn name(&self) -> &'static str {
        CHANNEL_NAME
    }

    fn min_interval(&self) -> Duration {
        MIN_INTERVAL
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let resp = self
            .client
            .post(&self.config.webhook_url)
            .json(&serde_json::json!({ "text": compose_message(notification) }))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| GovWatchError::Channel(format!("Slack send failed: {e}")))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(GovWatchError::Channel(format!(
                "Slack webhook error {status}: {body}"
            )))
        }
    }
}

/// Single-line mrkdwn body for a notification.
pub fn compose_message(notification: &Notification) -> String {
    let space = notification.space();
    let common = format!(
        "Space: `{}` | Transaction: `{}` (block `{}`) | Question: `{}`",
        space.ens,
        notification.tx_hash(),
        notification.block_number(),
        notification.question_id(),
    );

    match notification {
        Notification::ProposalCreated { event, .. } => format!(
            "*New proposal found*. {common} | Proposal: `{}` | <{}|Snapshot>",
            event.proposal_id,
            notification.snapshot_proposal_link(),
        ),
        Notification::AnswerIssued { event, .. } => format!(
            "*New vote issued*. {common} | User: `{}` | Bond: `{}` | Answer: `{}` | <{}|Reality>",
            event.user,
            event.bond,
            event.answer,
            notification.reality_question_link(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govwatch_core::types::{NewAnswer, Space};

    #[test]
    fn answer_message_carries_the_vote_details() {
        let n = Notification::AnswerIssued {
            space: Space {
                ens: "1inch.eth".into(),
                start_block: 1,
                last_processed_block: None,
                module_address: "0xm".into(),
                oracle_address: "0xo".into(),
            },
            event: NewAnswer {
                question_id: "0xq".into(),
                answer: "0x0".into(),
                bond: 5,
                user: "0xvoter".into(),
                ts: 0,
                tx_hash: "0xt".into(),
                block_number: 99,
            },
            snapshot_id: "0xsnap".into(),
        };

        let message = compose_message(&n);
        assert!(message.starts_with("*New vote issued*"));
        assert!(message.contains("Space: `1inch.eth`"));
        assert!(message.contains("(block `99`)"));
        assert!(message.contains("User: `0xvoter`"));
    }
}
