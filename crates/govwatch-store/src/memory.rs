//! In-memory store. Backs unit tests across the workspace and doubles
//! as a throwaway backend for local runs without Postgres; it honors
//! the same constraints as the Postgres schema.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use govwatch_core::Result;
use govwatch_core::types::ActiveProposal;

use crate::{SpaceRecord, Store};

#[derive(Default)]
struct Inner {
    spaces: HashMap<String, SpaceRecord>,
    proposals: HashMap<String, ActiveProposal>,
    deliveries: HashSet<(String, String)>,
}

/// Store keeping everything behind a single mutex.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ledger rows, across all events and channels.
    pub fn delivery_count(&self) -> usize {
        self.inner.lock().unwrap().deliveries.len()
    }

    /// Number of registered proposals.
    pub fn proposal_count(&self) -> usize {
        self.inner.lock().unwrap().proposals.len()
    }

    /// Current checkpoint of a space, if the space is known.
    pub fn checkpoint(&self, ens: &str) -> Option<Option<u64>> {
        self.inner
            .lock()
            .unwrap()
            .spaces
            .get(ens)
            .map(|s| s.last_processed_block)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_spaces(&self, enss: &[String]) -> Result<Vec<SpaceRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(enss
            .iter()
            .filter_map(|ens| inner.spaces.get(ens).cloned())
            .collect())
    }

    async fn insert_spaces(&self, spaces: &[SpaceRecord]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for space in spaces {
            inner.spaces.insert(space.ens.clone(), space.clone());
        }
        Ok(())
    }

    async fn update_space(&self, ens: &str, last_processed_block: u64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(space) = inner.spaces.get_mut(ens) {
            space.last_processed_block = Some(last_processed_block);
        }
        Ok(())
    }

    async fn insert_proposal(&self, proposal: &ActiveProposal) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .proposals
            .entry(proposal.proposal_id.clone())
            .or_insert_with(|| proposal.clone());
        Ok(())
    }

    async fn find_proposal_by_question_id(
        &self,
        question_id: &str,
    ) -> Result<Option<ActiveProposal>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .proposals
            .values()
            .find(|p| p.question_id == question_id)
            .cloned())
    }

    async fn record_delivery(&self, tx_hash: &str, _block: u64, channel: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .deliveries
            .insert((tx_hash.to_string(), channel.to_string()));
        Ok(())
    }

    async fn delivered_channels(&self, tx_hash: &str) -> Result<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .deliveries
            .iter()
            .filter(|(tx, _)| tx == tx_hash)
            .map(|(_, channel)| channel.clone())
            .collect())
    }
}
