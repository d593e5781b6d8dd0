//! Persistent state: space checkpoints, active proposals and the
//! per-(event, channel) delivery ledger.

pub mod memory;
pub mod pg;

use async_trait::async_trait;

use govwatch_core::Result;
use govwatch_core::types::ActiveProposal;

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Persisted space row: the static start block plus the moving
/// checkpoint. Contract addresses are resolved at startup and never
/// stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceRecord {
    pub ens: String,
    pub start_block: u64,
    pub last_processed_block: Option<u64>,
}

/// The operations the engine needs from the relational store. The
/// pool behind the production implementation is shared by all
/// concurrent space tasks.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch the persisted spaces among the given ENS names.
    async fn find_spaces(&self, enss: &[String]) -> Result<Vec<SpaceRecord>>;

    /// Persist newly observed spaces (null checkpoint).
    async fn insert_spaces(&self, spaces: &[SpaceRecord]) -> Result<()>;

    /// Advance the checkpoint of a space.
    async fn update_space(&self, ens: &str, last_processed_block: u64) -> Result<()>;

    /// Register an active proposal. Inserting an already known
    /// proposal id is a silent no-op.
    async fn insert_proposal(&self, proposal: &ActiveProposal) -> Result<()>;

    /// Look up the active proposal correlated to a question id.
    async fn find_proposal_by_question_id(
        &self,
        question_id: &str,
    ) -> Result<Option<ActiveProposal>>;

    /// Append to the delivery ledger: channel `channel` has delivered
    /// the event with `tx_hash`.
    async fn record_delivery(&self, tx_hash: &str, block: u64, channel: &str) -> Result<()>;

    /// Channel names that already delivered the event with `tx_hash`.
    async fn delivered_channels(&self, tx_hash: &str) -> Result<Vec<String>>;
}
