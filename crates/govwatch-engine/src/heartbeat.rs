//! Liveness heartbeat: pings a monitoring URL on a fixed interval for
//! dead-man-switch style alerting.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use govwatch_core::lifecycle::LifecycleObserver;

const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Spawn the pinger. It runs until the shutdown flag flips; a failed
/// ping is reported and retried on the next tick.
pub fn spawn(
    url: String,
    interval: Duration,
    observer: Arc<dyn LifecycleObserver>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let http = reqwest::Client::new();
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let ok = matches!(
                        http.get(&url).timeout(PING_TIMEOUT).send().await,
                        Ok(resp) if resp.status().is_success()
                    );
                    if ok {
                        observer.heartbeat_sent();
                    } else {
                        observer.heartbeat_failed();
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}
