//! The scheduler loop: one iteration scans every space concurrently,
//! then the loop sleeps for the cooldown or exits on shutdown.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tracing::warn;

use govwatch_core::lifecycle::LifecycleObserver;
use govwatch_core::types::Space;
use govwatch_core::Result;
use govwatch_store::Store;

use crate::planner;
use crate::scanner::EventScanner;
use crate::tracker::ProposalTracker;

pub struct SchedulerLoop {
    store: Arc<dyn Store>,
    scanner: Arc<dyn EventScanner>,
    tracker: ProposalTracker,
    observer: Arc<dyn LifecycleObserver>,
    cooldown: Duration,
    max_batch_size: u64,
}

impl SchedulerLoop {
    pub fn new(
        store: Arc<dyn Store>,
        scanner: Arc<dyn EventScanner>,
        tracker: ProposalTracker,
        observer: Arc<dyn LifecycleObserver>,
        cooldown: Duration,
        max_batch_size: u64,
    ) -> Self {
        Self {
            store,
            scanner,
            tracker,
            observer,
            cooldown,
            max_batch_size,
        }
    }

    /// Run until the shutdown flag flips. In-flight work finishes; the
    /// loop never stops in the middle of an iteration.
    pub async fn run(&self, mut spaces: Vec<Space>, mut shutdown: watch::Receiver<bool>) {
        self.observer.started();
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_iteration(&mut spaces).await;

            tokio::select! {
                _ = tokio::time::sleep(self.cooldown) => {}
                _ = shutdown.changed() => {
                    self.observer.shutdown_requested();
                    break;
                }
            }
        }
    }

    /// One pass over all spaces. The head is fetched once so every
    /// space sees the same upper bound; a failed space keeps its old
    /// checkpoint and the others carry on.
    async fn run_iteration(&self, spaces: &mut [Space]) {
        self.observer.iteration_started();

        let chain_head = match self.scanner.chain_head().await {
            Ok(head) => head,
            Err(error) => {
                warn!("Could not fetch the chain head: {error}");
                self.observer.iteration_ended();
                return;
            }
        };

        let results = join_all(
            spaces
                .iter()
                .map(|space| self.try_process_space(space, chain_head)),
        )
        .await;

        for (space, result) in spaces.iter_mut().zip(results) {
            match result {
                Ok(Some(processed_to)) => space.last_processed_block = Some(processed_to),
                Ok(None) => {}
                Err(error) => self.observer.space_failed(&space.ens, &error),
            }
        }

        self.observer.iteration_ended();
    }

    /// Process one space's next window. Returns the new checkpoint, or
    /// `None` when the space had no blocks to scan. The checkpoint is
    /// persisted only after every event of the window was handled.
    async fn try_process_space(&self, space: &Space, chain_head: u64) -> Result<Option<u64>> {
        self.observer.space_started(&space.ens);

        let Some(range) = planner::plan(space, chain_head, self.max_batch_size) else {
            let from = space
                .last_processed_block
                .unwrap_or(space.start_block)
                .max(space.start_block);
            self.observer.space_skipped(&space.ens, from, chain_head);
            return Ok(None);
        };

        let (proposals, answers) = tokio::try_join!(
            self.scanner.proposals_created(&space.module_address, range),
            self.scanner.new_answers(&space.oracle_address, range),
        )?;
        self.observer
            .space_events_fetched(&space.ens, proposals.len(), answers.len());

        self.tracker.process_proposals(space, &proposals).await?;
        self.tracker.process_answers(space, &answers).await?;
        if !proposals.is_empty() || !answers.is_empty() {
            self.observer.space_notified(&space.ens);
        }

        self.store.update_space(&space.ens, range.to).await?;
        self.observer.space_ended(&space.ens);
        Ok(Some(range.to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use govwatch_core::lifecycle::NullObserver;
    use govwatch_core::notify::Notifier;
    use govwatch_core::types::{
        BlockRange, NewAnswer, NewQuestion, Notification, ProposalCreated,
    };
    use govwatch_core::GovWatchError;
    use govwatch_store::{MemoryStore, SpaceRecord};
    use std::sync::Mutex;

    struct FakeScanner {
        head: Result<u64>,
        failing_module: Option<String>,
        proposals: Vec<(String, ProposalCreated)>,
        questions: Vec<NewQuestion>,
    }

    impl FakeScanner {
        fn quiet(head: u64) -> Self {
            Self {
                head: Ok(head),
                failing_module: None,
                proposals: vec![],
                questions: vec![],
            }
        }
    }

    #[async_trait]
    impl EventScanner for FakeScanner {
        async fn chain_head(&self) -> Result<u64> {
            match &self.head {
                Ok(head) => Ok(*head),
                Err(_) => Err(GovWatchError::Rpc("head unavailable".into())),
            }
        }

        async fn proposals_created(
            &self,
            module: &str,
            range: BlockRange,
        ) -> Result<Vec<ProposalCreated>> {
            if self.failing_module.as_deref() == Some(module) {
                return Err(GovWatchError::Rpc("getLogs failed".into()));
            }
            Ok(self
                .proposals
                .iter()
                .filter(|(m, e)| {
                    m == module && e.block_number >= range.from && e.block_number < range.to
                })
                .map(|(_, e)| e.clone())
                .collect())
        }

        async fn new_answers(&self, _oracle: &str, _range: BlockRange) -> Result<Vec<NewAnswer>> {
            Ok(vec![])
        }

        async fn new_questions(
            &self,
            _oracle: &str,
            range: BlockRange,
        ) -> Result<Vec<NewQuestion>> {
            Ok(self
                .questions
                .iter()
                .filter(|q| q.block_number >= range.from && q.block_number < range.to)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn dispatch(&self, notification: &Notification) -> Result<()> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn space(ens: &str, module: &str, checkpoint: Option<u64>) -> Space {
        Space {
            ens: ens.into(),
            start_block: 1,
            last_processed_block: checkpoint,
            module_address: module.into(),
            oracle_address: format!("0xoracle-{ens}"),
        }
    }

    async fn seeded_store(spaces: &[Space]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let records: Vec<SpaceRecord> = spaces
            .iter()
            .map(|s| SpaceRecord {
                ens: s.ens.clone(),
                start_block: s.start_block,
                last_processed_block: s.last_processed_block,
            })
            .collect();
        store.insert_spaces(&records).await.unwrap();
        store
    }

    fn scheduler(
        store: Arc<MemoryStore>,
        scanner: FakeScanner,
        notifier: Arc<RecordingNotifier>,
    ) -> SchedulerLoop {
        let scanner: Arc<dyn EventScanner> = Arc::new(scanner);
        let observer: Arc<dyn LifecycleObserver> = Arc::new(NullObserver);
        let tracker = ProposalTracker::new(
            store.clone(),
            scanner.clone(),
            notifier,
            observer.clone(),
        );
        SchedulerLoop::new(
            store,
            scanner,
            tracker,
            observer,
            Duration::from_secs(300),
            100,
        )
    }

    #[tokio::test]
    async fn an_iteration_advances_checkpoints_and_notifies() {
        let mut spaces = vec![space("kleros.eth", "0xmodule", None)];
        let store = seeded_store(&spaces).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let scanner = FakeScanner {
            head: Ok(50),
            failing_module: None,
            proposals: vec![(
                "0xmodule".into(),
                ProposalCreated {
                    proposal_id: "0xp1".into(),
                    question_id: "0xq1".into(),
                    tx_hash: "0xtx1".into(),
                    block_number: 10,
                    happened_at: Utc::now(),
                },
            )],
            questions: vec![NewQuestion {
                question_id: "0xq1".into(),
                question: "0xsnap1\u{241f}kleros.eth".into(),
                timeout: 3_600,
                opening_ts: 1_700_000_000,
                block_number: 10,
            }],
        };

        let scheduler = scheduler(store.clone(), scanner, notifier.clone());
        scheduler.run_iteration(&mut spaces).await;

        assert_eq!(spaces[0].last_processed_block, Some(50));
        assert_eq!(store.checkpoint("kleros.eth"), Some(Some(50)));
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn a_failed_space_keeps_its_checkpoint_and_spares_siblings() {
        let mut spaces = vec![
            space("broken.eth", "0xbad", Some(20)),
            space("fine.eth", "0xgood", Some(20)),
        ];
        let store = seeded_store(&spaces).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let mut scanner = FakeScanner::quiet(50);
        scanner.failing_module = Some("0xbad".into());

        let scheduler = scheduler(store.clone(), scanner, notifier);
        scheduler.run_iteration(&mut spaces).await;

        assert_eq!(spaces[0].last_processed_block, Some(20));
        assert_eq!(store.checkpoint("broken.eth"), Some(Some(20)));
        assert_eq!(spaces[1].last_processed_block, Some(50));
        assert_eq!(store.checkpoint("fine.eth"), Some(Some(50)));
    }

    #[tokio::test]
    async fn a_caught_up_space_is_left_alone() {
        let mut spaces = vec![space("kleros.eth", "0xmodule", Some(50))];
        let store = seeded_store(&spaces).await;
        let notifier = Arc::new(RecordingNotifier::default());

        let scheduler = scheduler(store.clone(), FakeScanner::quiet(50), notifier);
        scheduler.run_iteration(&mut spaces).await;

        assert_eq!(spaces[0].last_processed_block, Some(50));
        assert_eq!(store.checkpoint("kleros.eth"), Some(Some(50)));
    }

    #[tokio::test]
    async fn a_head_failure_touches_nothing() {
        let mut spaces = vec![space("kleros.eth", "0xmodule", Some(20))];
        let store = seeded_store(&spaces).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let scanner = FakeScanner {
            head: Err(GovWatchError::Rpc("down".into())),
            failing_module: None,
            proposals: vec![],
            questions: vec![],
        };

        let scheduler = scheduler(store.clone(), scanner, notifier);
        scheduler.run_iteration(&mut spaces).await;

        assert_eq!(spaces[0].last_processed_block, Some(20));
        assert_eq!(store.checkpoint("kleros.eth"), Some(Some(20)));
    }

    #[tokio::test]
    async fn the_loop_exits_on_shutdown() {
        let spaces = vec![space("kleros.eth", "0xmodule", Some(50))];
        let store = seeded_store(&spaces).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler = scheduler(store, FakeScanner::quiet(50), notifier);

        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        // Completes because the select sees the already-flipped flag.
        scheduler.run(spaces, rx).await;
    }
}
