//! Email channel — async SMTP sending via lettre, one message per
//! configured recipient.

use async_trait::async_trait;
use std::time::Duration;

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use govwatch_core::config::{EmailConfig, parse_email_recipients};
use govwatch_core::types::Notification;
use govwatch_core::{GovWatchError, Result};

use crate::Channel;

pub const CHANNEL_NAME: &str = "email";

const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl EmailChannel {
    /// Build the SMTP transport and parse the addresses. Any invalid
    /// or missing field disables the channel.
    pub fn new(config: EmailConfig) -> Result<Self> {
        if config.smtp_host.is_empty() || config.from.is_empty() || config.to.is_empty() {
            return Err(GovWatchError::Config("incomplete email configuration".into()));
        }

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| GovWatchError::Config(format!("SMTP relay: {e}")))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.smtp_user.clone(),
                config.smtp_password.clone(),
            ))
            .build();

        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| GovWatchError::Config(format!("from address: {e}")))?;
        let recipients = parse_email_recipients(&config.to)
            .iter()
            .map(|addr| {
                addr.parse()
                    .map_err(|e| GovWatchError::Config(format!("to address {addr}: {e}")))
            })
            .collect::<Result<Vec<Mailbox>>>()?;
        if recipients.is_empty() {
            return Err(GovWatchError::Config("no email recipients".into()));
        }

        Ok(Self {
            transport,
            from,
            recipients,
        })
    }
}

#[async_trait]
impl Channel for EmailChannel {
    fn name(&self) -> &'static str {
        CHANNEL_NAME
    }

    fn min_interval(&self) -> Duration {
        MIN_INTERVAL
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let (subject, text) = compose_message(notification);

        for recipient in &self.recipients {
            let message = Message::builder()
                .from(self.from.clone())
                .to(recipient.clone())
                .subject(subject.clone())
                .header(ContentType::TEXT_PLAIN)
                .body(text.clone())
                .map_err(|e| GovWatchError::Channel(format!("Email build failed: {e}")))?;

            self.transport
                .send(message)
                .await
                .map_err(|e| GovWatchError::Channel(format!("Email send failed: {e}")))?;
        }
        Ok(())
    }
}

/// Subject and plain-text body for a notification.
pub fn compose_message(notification: &Notification) -> (String, String) {
    let space = notification.space();
    let question_id = notification.question_id();
    let short_question_id = &question_id[..question_id.len().min(6)];
    let common = format!(
        "  - Transaction: {} (block {})\n  - Question: {}\n  - Space: {}\n  - Snapshot: {}\n  - Reality: {}",
        notification.tx_hash(),
        notification.block_number(),
        question_id,
        space.ens,
        notification.snapshot_proposal_link(),
        notification.reality_question_link(),
    );

    match notification {
        Notification::ProposalCreated { .. } => {
            let subject = format!("New proposal for {} ({short_question_id})", space.ens);
            let text = format!("{subject}:\n\n{common}\n");
            (subject, text)
        }
        Notification::AnswerIssued { event, .. } => {
            let subject = format!("Vote issued for {} (question {short_question_id})", space.ens);
            let text = format!(
                "{subject}:\n\n{common}\n  - Answer: {}\n  - Bond: {}\n  - User: {}\n  - Timestamp: {}\n",
                event.answer, event.bond, event.user, event.ts,
            );
            (subject, text)
        }
    }
}
