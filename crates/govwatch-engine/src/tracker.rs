//! Proposal tracker: correlates module and oracle events into
//! notifications and keeps the active proposal table current.

use std::sync::Arc;

use govwatch_core::lifecycle::LifecycleObserver;
use govwatch_core::notify::Notifier;
use govwatch_core::types::{
    ActiveProposal, BlockRange, NewAnswer, Notification, ProposalCreated, Space,
};
use govwatch_core::Result;
use govwatch_store::Store;

use crate::scanner::EventScanner;

/// Snapshot encodes the question fields as a single string joined with
/// the unit separator symbol; the first field is the proposal id on
/// Snapshot.
const UNIT_SEPARATOR: char = '\u{241f}';

pub struct ProposalTracker {
    store: Arc<dyn Store>,
    scanner: Arc<dyn EventScanner>,
    notifier: Arc<dyn Notifier>,
    observer: Arc<dyn LifecycleObserver>,
}

impl ProposalTracker {
    pub fn new(
        store: Arc<dyn Store>,
        scanner: Arc<dyn EventScanner>,
        notifier: Arc<dyn Notifier>,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Self {
        Self {
            store,
            scanner,
            notifier,
            observer,
        }
    }

    /// Handle `ProposalQuestionCreated` events for one space. A missing
    /// or malformed correlating question skips only that event; store,
    /// RPC and dispatch failures propagate so the caller leaves the
    /// space's checkpoint untouched.
    pub async fn process_proposals(&self, space: &Space, events: &[ProposalCreated]) -> Result<()> {
        for event in events {
            // The oracle emits LogNewQuestion in the same transaction,
            // so the same block is enough of a window.
            let questions = self
                .scanner
                .new_questions(
                    &space.oracle_address,
                    BlockRange {
                        from: event.block_number,
                        to: event.block_number.saturating_add(1),
                    },
                )
                .await?;

            let Some(question) = questions
                .iter()
                .find(|q| q.question_id == event.question_id)
            else {
                self.observer.event_skipped(
                    &space.ens,
                    &event.tx_hash,
                    "no matching question event in block",
                );
                continue;
            };

            let mut fields = question.question.split(UNIT_SEPARATOR);
            let snapshot_id = match (fields.next(), fields.next()) {
                (Some(first), Some(_)) => first.to_string(),
                _ => {
                    self.observer.event_skipped(
                        &space.ens,
                        &event.tx_hash,
                        "question payload has no unit separator",
                    );
                    continue;
                }
            };

            // Both values come straight off the log, so the deadline
            // saturates instead of trusting them to stay in range.
            let started_at = question.opening_ts;
            let finished_at = question.opening_ts.saturating_add(question.timeout);

            self.store
                .insert_proposal(&ActiveProposal {
                    ens: space.ens.clone(),
                    proposal_id: event.proposal_id.clone(),
                    question_id: event.question_id.clone(),
                    tx_hash: event.tx_hash.clone(),
                    happened_at: event.happened_at,
                    snapshot_id: snapshot_id.clone(),
                    started_at,
                    finished_at,
                    timeout: question.timeout,
                })
                .await?;

            self.notifier
                .dispatch(&Notification::ProposalCreated {
                    space: space.clone(),
                    event: event.clone(),
                    snapshot_id,
                    started_at,
                    finished_at,
                    timeout: question.timeout,
                })
                .await?;
        }
        Ok(())
    }

    /// Handle `LogNewAnswer` events for one space. Answers to questions
    /// that were never registered as proposals of this space are not
    /// ours and are dropped silently.
    pub async fn process_answers(&self, space: &Space, events: &[NewAnswer]) -> Result<()> {
        for event in events {
            let Some(proposal) = self
                .store
                .find_proposal_by_question_id(&event.question_id)
                .await?
            else {
                continue;
            };
            if proposal.ens != space.ens {
                continue;
            }

            self.notifier
                .dispatch(&Notification::AnswerIssued {
                    space: space.clone(),
                    event: event.clone(),
                    snapshot_id: proposal.snapshot_id,
                })
                .await?;
        }
        Ok(())
    }
}
