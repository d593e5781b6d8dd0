//! Domain types: spaces, decoded chain events and notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A `ens:start_block` pair taken from configuration, before the
/// contract addresses and checkpoint are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceConfig {
    pub ens: String,
    pub start_block: u64,
}

/// A fully resolved governance space under watch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Space {
    /// ENS name of the Snapshot space, also the stable space id.
    pub ens: String,
    /// First block worth scanning.
    pub start_block: u64,
    /// Checkpoint: last block height fully scanned, exclusive.
    /// `None` until the first window completes.
    pub last_processed_block: Option<u64>,
    /// Reality Module contract address.
    pub module_address: String,
    /// Reality oracle contract address.
    pub oracle_address: String,
}

/// Half-open block window `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

/// Decoded `ProposalQuestionCreated` event from the Reality Module.
#[derive(Debug, Clone)]
pub struct ProposalCreated {
    /// Keccak hash of the proposal id string (the id is an indexed
    /// string parameter, so only its hash reaches the log).
    pub proposal_id: String,
    pub question_id: String,
    pub tx_hash: String,
    pub block_number: u64,
    /// Timestamp of the containing block.
    pub happened_at: DateTime<Utc>,
}

/// Decoded `LogNewAnswer` event from the Reality oracle.
#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub question_id: String,
    pub answer: String,
    pub bond: u128,
    pub user: String,
    pub ts: u64,
    pub tx_hash: String,
    pub block_number: u64,
}

/// Decoded `LogNewQuestion` event from the Reality oracle. This is the
/// correlating event carrying the question metadata for a proposal
/// created in the same block.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question_id: String,
    /// Raw question string; fields are joined with the unit separator.
    pub question: String,
    pub timeout: u64,
    pub opening_ts: u64,
    pub block_number: u64,
}

/// A proposal registered as active so later answers can be matched
/// back to it.
#[derive(Debug, Clone)]
pub struct ActiveProposal {
    pub ens: String,
    pub proposal_id: String,
    pub question_id: String,
    pub tx_hash: String,
    pub happened_at: DateTime<Utc>,
    pub snapshot_id: String,
    pub started_at: u64,
    pub finished_at: u64,
    pub timeout: u64,
}

/// A notification about to be fanned out to the channels. The payload
/// tx hash is the dedup key against the delivery ledger.
#[derive(Debug, Clone)]
pub enum Notification {
    ProposalCreated {
        space: Space,
        event: ProposalCreated,
        snapshot_id: String,
        started_at: u64,
        finished_at: u64,
        timeout: u64,
    },
    AnswerIssued {
        space: Space,
        event: NewAnswer,
        snapshot_id: String,
    },
}

impl Notification {
    pub fn space(&self) -> &Space {
        match self {
            Notification::ProposalCreated { space, .. } => space,
            Notification::AnswerIssued { space, .. } => space,
        }
    }

    pub fn tx_hash(&self) -> &str {
        match self {
            Notification::ProposalCreated { event, .. } => &event.tx_hash,
            Notification::AnswerIssued { event, .. } => &event.tx_hash,
        }
    }

    pub fn block_number(&self) -> u64 {
        match self {
            Notification::ProposalCreated { event, .. } => event.block_number,
            Notification::AnswerIssued { event, .. } => event.block_number,
        }
    }

    pub fn question_id(&self) -> &str {
        match self {
            Notification::ProposalCreated { event, .. } => &event.question_id,
            Notification::AnswerIssued { event, .. } => &event.question_id,
        }
    }

    pub fn snapshot_id(&self) -> &str {
        match self {
            Notification::ProposalCreated { snapshot_id, .. } => snapshot_id,
            Notification::AnswerIssued { snapshot_id, .. } => snapshot_id,
        }
    }

    /// Link to the proposal on Snapshot.
    pub fn snapshot_proposal_link(&self) -> String {
        format!(
            "https://snapshot.org/#/{}/proposal/{}",
            self.space().ens,
            self.snapshot_id()
        )
    }

    /// Link to the question on the Reality.eth UI.
    pub fn reality_question_link(&self) -> String {
        format!(
            "https://reality.eth.limo/app/#!/question/{}-{}/token/ETH",
            self.space().oracle_address,
            self.question_id()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> Space {
        Space {
            ens: "kleros.eth".into(),
            start_block: 100,
            last_processed_block: None,
            module_address: "0xa62D2a75eb39C12e908e9F6BF50f189641692F2E".into(),
            oracle_address: "0x5b7dD1E86623548AF054A4985F7fc8Ccbb554E25".into(),
        }
    }

    #[test]
    fn notification_accessors_and_links() {
        let n = Notification::AnswerIssued {
            space: space(),
            event: NewAnswer {
                question_id: "0xq".into(),
                answer: "0x1".into(),
                bond: 42,
                user: "0xu".into(),
                ts: 1_700_000_000,
                tx_hash: "0xt".into(),
                block_number: 123,
            },
            snapshot_id: "0xsnap".into(),
        };

        assert_eq!(n.tx_hash(), "0xt");
        assert_eq!(n.block_number(), 123);
        assert_eq!(
            n.snapshot_proposal_link(),
            "https://snapshot.org/#/kleros.eth/proposal/0xsnap"
        );
        assert!(n.reality_question_link().contains("0x5b7dD1E8"));
        assert!(n.reality_question_link().ends_with("-0xq/token/ETH"));
    }
}
