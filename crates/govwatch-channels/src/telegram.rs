//! Telegram channel — sends notifications via the Bot API.

use async_trait::async_trait;
use std::time::Duration;

use govwatch_core::config::TelegramConfig;
use govwatch_core::types::Notification;
use govwatch_core::{GovWatchError, Result};

use crate::Channel;

pub const CHANNEL_NAME: &str = "telegram";

// https://core.telegram.org/bots/faq#my-bot-is-hitting-limits-how-do-i-avoid-this
// roughly 30 messages per second.
const MIN_INTERVAL: Duration = Duration::from_millis(34);

pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{}",
            self.config.bot_token, method
        )
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&serde_json::json!({
                "chat_id": self.config.chat_id,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| GovWatchError::Channel(format!("Telegram send failed: {e}")))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(GovWatchError::Channel(format!(
                "Telegram API error {status}: {body}"
            )))
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        CHANNEL_NAME
    }

    fn min_interval(&self) -> Duration {
        MIN_INTERVAL
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        self.send_message(&compose_message(notification)).await
    }
}

/// Markdown message body for a notification.
pub fn compose_message(notification: &Notification) -> String {
    let space = notification.space();
    let common = format!(
        "Space: `{}`\nTransaction: `{}` (block `{}`)\nQuestion: `{}`",
        space.ens,
        notification.tx_hash(),
        notification.block_number(),
        notification.question_id(),
    );
    let links = format!(
        "[Proposal on Snapshot]({})\n[Question on Reality]({})",
        notification.snapshot_proposal_link(),
        notification.reality_question_link(),
    );

    match notification {
        Notification::ProposalCreated { event, .. } => format!(
            "*New proposal found*\n{common}\nProposal: `{}`\n{links}",
            event.proposal_id
        ),
        Notification::AnswerIssued { event, .. } => format!(
            "*New vote issued*\n{common}\nUser: `{}`\nBond: `{}`\nAnswer: `{}`\n{links}",
            event.user, event.bond, event.answer
        ),
    }
}
