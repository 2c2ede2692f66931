//! Change sources drive the sweep

use parking_lot::Mutex;
use std::sync::Weak;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use super::TableSyncEngine;

/// Something that decides when tracked files are checked for changes.
///
/// Every implementation ends in [`TableSyncEngine::sweep`], so the sync lock
/// and timestamp rules apply whether changes are polled or pushed by the OS.
pub trait ChangeSource: Send + Sync {
    /// Begin calling `sweep` on `engine`; replaces any earlier run
    fn start(&self, engine: Weak<TableSyncEngine>);

    /// Stop calling `sweep`. A sweep already running is allowed to finish.
    fn stop(&self);

    fn is_running(&self) -> bool;
}

/// Sweeps on a fixed interval from a spawned task
pub struct PollingChangeSource {
    interval: Duration,
    token: Mutex<Option<CancellationToken>>,
}

impl PollingChangeSource {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            token: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl ChangeSource for PollingChangeSource {
    fn start(&self, engine: Weak<TableSyncEngine>) {
        let token = CancellationToken::new();
        if let Some(previous) = self.token.lock().replace(token.clone()) {
            previous.cancel();
        }

        let period = self.interval;
        tracing::info!(interval_ms = period.as_millis() as u64, "file watcher started");

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if token.is_cancelled() {
                            break;
                        }
                        let Some(engine) = engine.upgrade() else {
                            break;
                        };
                        engine.sweep().await;
                    }
                }
            }
            tracing::debug!("file watcher task exited");
        });
    }

    fn stop(&self) {
        if let Some(token) = self.token.lock().take() {
            token.cancel();
            tracing::info!("file watcher stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.token
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }
}

impl Drop for PollingChangeSource {
    fn drop(&mut self) {
        if let Some(token) = self.token.get_mut().take() {
            token.cancel();
        }
    }
}
