//! Timeout watchdog for a single run.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One-shot timer armed when a run starts.
///
/// On expiry it calls `on_expire` exactly once, unless it was disarmed first.
/// `on_expire` decides whether the expiry still matters (the run may already
/// have left `Running`) and returns whether it actually stopped the run.
/// Dropping the watchdog disarms it.
#[derive(Debug)]
pub struct TimeoutWatchdog {
    timeout: Duration,
    disarm: CancellationToken,
    handle: Option<JoinHandle<bool>>,
}

impl TimeoutWatchdog {
    pub fn arm<F>(timeout: Duration, on_expire: F) -> Self
    where
        F: FnOnce() -> bool + Send + 'static,
    {
        let disarm = CancellationToken::new();
        let disarmed = disarm.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = disarmed.cancelled() => {
                    debug!("Watchdog disarmed");
                    false
                }

                _ = tokio::time::sleep(timeout) => {
                    let fired = on_expire();
                    if fired {
                        warn!(timeout_ms = timeout.as_millis() as u64, "Watchdog expired, run stopped");
                    } else {
                        debug!("Watchdog expired after the run had already left Running");
                    }
                    fired
                }
            }
        });

        debug!(timeout_ms = timeout.as_millis() as u64, "Watchdog armed");
        Self {
            timeout,
            disarm,
            handle: Some(handle),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn disarm(&self) {
        self.disarm.cancel();
    }

    /// Disarm and wait for the timer task. Returns whether the watchdog fired.
    pub async fn join(mut self) -> bool {
        self.disarm.cancel();
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or(false),
            None => false,
        }
    }
}

impl Drop for TimeoutWatchdog {
    fn drop(&mut self) {
        self.disarm.cancel();
    }
}
