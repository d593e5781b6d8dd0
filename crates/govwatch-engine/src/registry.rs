//! Space registry: turns the configured space list into fully resolved
//! `Space` values at startup, recovering checkpoints from the store and
//! seeding rows for spaces seen for the first time.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::info;

use govwatch_core::Result;
use govwatch_core::types::{Space, SpaceConfig};
use govwatch_store::{SpaceRecord, Store};

use crate::directory::SpaceDirectory;

pub struct SpaceRegistry {
    store: Arc<dyn Store>,
    directory: Arc<dyn SpaceDirectory>,
}

impl SpaceRegistry {
    pub fn new(store: Arc<dyn Store>, directory: Arc<dyn SpaceDirectory>) -> Self {
        Self { store, directory }
    }

    /// Resolve every configured space and reconcile it with the store.
    /// Any resolution failure aborts startup; watching a space whose
    /// contracts are unknown would silently drop events.
    pub async fn initialize(&self, configured: &[SpaceConfig]) -> Result<Vec<Space>> {
        let resolved = try_join_all(configured.iter().map(|cfg| async move {
            let addresses = self.directory.resolve(&cfg.ens).await?;
            Ok::<_, govwatch_core::GovWatchError>((cfg, addresses))
        }))
        .await?;

        let names: Vec<String> = configured.iter().map(|c| c.ens.clone()).collect();
        let known = self.store.find_spaces(&names).await?;

        let missing: Vec<SpaceRecord> = resolved
            .iter()
            .filter(|(cfg, _)| !known.iter().any(|rec| rec.ens == cfg.ens))
            .map(|(cfg, _)| SpaceRecord {
                ens: cfg.ens.clone(),
                start_block: cfg.start_block,
                last_processed_block: None,
            })
            .collect();
        if !missing.is_empty() {
            self.store.insert_spaces(&missing).await?;
        }

        let spaces = resolved
            .into_iter()
            .map(|(cfg, addresses)| {
                let last_processed_block = known
                    .iter()
                    .find(|rec| rec.ens == cfg.ens)
                    .and_then(|rec| rec.last_processed_block);
                info!(
                    ens = %cfg.ens,
                    module = %addresses.module_address,
                    oracle = %addresses.oracle_address,
                    checkpoint = ?last_processed_block,
                    "space initialized"
                );
                Space {
                    ens: cfg.ens.clone(),
                    start_block: cfg.start_block,
                    last_processed_block,
                    module_address: addresses.module_address,
                    oracle_address: addresses.oracle_address,
                }
            })
            .collect();

        Ok(spaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::SpaceAddresses;
    use async_trait::async_trait;
    use govwatch_core::GovWatchError;
    use govwatch_store::MemoryStore;

    struct FixedDirectory;

    #[async_trait]
    impl SpaceDirectory for FixedDirectory {
        async fn resolve(&self, ens: &str) -> Result<SpaceAddresses> {
            if ens == "broken.eth" {
                return Err(GovWatchError::Directory("no safeSnap plugin".into()));
            }
            Ok(SpaceAddresses {
                module_address: format!("0xmodule-{ens}"),
                oracle_address: format!("0xoracle-{ens}"),
            })
        }
    }

    fn cfg(ens: &str, start_block: u64) -> SpaceConfig {
        SpaceConfig {
            ens: ens.into(),
            start_block,
        }
    }

    #[tokio::test]
    async fn seeds_new_spaces_and_recovers_checkpoints() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_spaces(&[SpaceRecord {
                ens: "old.eth".into(),
                start_block: 10,
                last_processed_block: Some(500),
            }])
            .await
            .unwrap();

        let registry = SpaceRegistry::new(store.clone(), Arc::new(FixedDirectory));
        let spaces = registry
            .initialize(&[cfg("old.eth", 10), cfg("new.eth", 42)])
            .await
            .unwrap();

        let old = spaces.iter().find(|s| s.ens == "old.eth").unwrap();
        assert_eq!(old.last_processed_block, Some(500));
        assert_eq!(old.module_address, "0xmodule-old.eth");

        let new = spaces.iter().find(|s| s.ens == "new.eth").unwrap();
        assert_eq!(new.last_processed_block, None);
        assert_eq!(store.checkpoint("new.eth"), Some(None));
        assert_eq!(store.proposal_count(), 0);

        // The new space is now persisted for the next run.
        let records = store.find_spaces(&["new.eth".into()]).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].start_block, 42);
    }

    #[tokio::test]
    async fn a_resolution_failure_aborts_startup() {
        let store = Arc::new(MemoryStore::new());
        let registry = SpaceRegistry::new(store.clone(), Arc::new(FixedDirectory));

        let result = registry
            .initialize(&[cfg("fine.eth", 1), cfg("broken.eth", 1)])
            .await;
        assert!(result.is_err());
    }
}
