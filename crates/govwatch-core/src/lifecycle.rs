//! Lifecycle observer seam.
//!
//! The scanning loop reports progress through an explicit observer
//! instead of logging inline, so control flow stays decoupled from
//! logging and tests can assert on lifecycle transitions.

use crate::error::GovWatchError;

/// Callbacks fired by the scheduler loop and channel setup. All have
/// no-op defaults; implementors override what they care about.
pub trait LifecycleObserver: Send + Sync {
    fn started(&self) {}
    fn iteration_started(&self) {}
    fn iteration_ended(&self) {}
    fn space_started(&self, _ens: &str) {}
    fn space_skipped(&self, _ens: &str, _from: u64, _to: u64) {}
    fn space_events_fetched(&self, _ens: &str, _proposals: usize, _answers: usize) {}
    fn space_notified(&self, _ens: &str) {}
    fn space_ended(&self, _ens: &str) {}
    fn space_failed(&self, _ens: &str, _error: &GovWatchError) {}
    fn event_skipped(&self, _ens: &str, _tx_hash: &str, _reason: &str) {}
    fn channel_ready(&self, _name: &str) {}
    fn channel_disabled(&self, _name: &str, _missing: &[&str]) {}
    fn heartbeat_sent(&self) {}
    fn heartbeat_failed(&self) {}
    fn shutdown_requested(&self) {}
}

/// Observer that is silent about everything. Useful in tests.
pub struct NullObserver;

impl LifecycleObserver for NullObserver {}

/// Observer that turns lifecycle callbacks into tracing lines.
pub struct LogObserver;

impl LifecycleObserver for LogObserver {
    fn started(&self) {
        tracing::info!("Watcher started");
    }

    fn iteration_started(&self) {
        tracing::info!("Checking all the spaces for new events");
    }

    fn iteration_ended(&self) {
        tracing::info!("All spaces checked. Sleeping for a while...");
    }

    fn space_started(&self, ens: &str) {
        tracing::info!(space = ens, "Processing of {ens} started");
    }

    fn space_skipped(&self, ens: &str, from: u64, to: u64) {
        tracing::info!(
            space = ens,
            from,
            to,
            "Skipping {ens} due to insufficient blocks"
        );
    }

    fn space_events_fetched(&self, ens: &str, proposals: usize, answers: usize) {
        tracing::info!(
            space = ens,
            proposals,
            answers,
            "Fetched {} events for {ens}",
            proposals + answers
        );
    }

    fn space_notified(&self, ens: &str) {
        tracing::info!(space = ens, "Notifications for {ens} events sent");
    }

    fn space_ended(&self, ens: &str) {
        tracing::info!(space = ens, "Processing of {ens} ended");
    }

    fn space_failed(&self, ens: &str, error: &GovWatchError) {
        tracing::warn!(space = ens, "Processing of {ens} failed: {error}");
    }

    fn event_skipped(&self, ens: &str, tx_hash: &str, reason: &str) {
        tracing::warn!(
            space = ens,
            tx_hash,
            "Skipping event {tx_hash} for {ens}: {reason}"
        );
    }

    fn channel_ready(&self, name: &str) {
        tracing::info!(channel = name, "{name} channel configured");
    }

    fn channel_disabled(&self, name: &str, missing: &[&str]) {
        tracing::warn!(
            channel = name,
            ?missing,
            "{name} configuration missing. Ignoring channel"
        );
    }

    fn heartbeat_sent(&self) {
        tracing::debug!("Heartbeat sent");
    }

    fn heartbeat_failed(&self) {
        tracing::warn!("Heartbeat ping failed");
    }

    fn shutdown_requested(&self) {
        tracing::info!("Shutdown requested, finishing in-flight iteration");
    }
}
