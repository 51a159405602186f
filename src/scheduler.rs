//! The single auto-shuffle deadline.

use std::time::Duration;

use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::ControlEvent;

/// Owns the at-most-one pending auto-shuffle deadline.
///
/// Arming supersedes any previously armed deadline, so two shuffles can
/// never be pending at once. Last write wins.
#[derive(Debug)]
pub struct Scheduler {
    tx: Sender<ControlEvent>,
    pending: Option<CancellationToken>,
}

impl Scheduler {
    #[must_use]
    pub fn new(tx: Sender<ControlEvent>) -> Self {
        Self { tx, pending: None }
    }

    /// Schedule a one-shot shuffle after `interval`, invalidating any
    /// previously armed deadline.
    pub fn arm(&mut self, interval: Duration) {
        self.cancel();
        let token = CancellationToken::new();
        let guard = token.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = guard.cancelled() => {}
                () = tokio::time::sleep(interval) => {
                    debug!("auto-shuffle deadline fired");
                    let _ = tx.send(ControlEvent::Shuffle).await;
                    // A fired deadline is no longer pending.
                    guard.cancel();
                }
            }
        });
        self.pending = Some(token);
        debug!(interval = %humantime::format_duration(interval), "auto-shuffle deadline armed");
    }

    /// Invalidate the pending deadline; no-op when none is armed.
    pub fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }

    /// Whether a deadline is currently armed and has not yet fired.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.pending.as_ref().is_some_and(|t| !t.is_cancelled())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
