//! Background timeout driver
//!
//! Advances a conversation's countdown at a fixed interval. Expiry is
//! noticed on the next tick at the latest, so a timeout fires up to one
//! interval late.

use crate::error::DialogError;
use crate::state_machine::ConversationStateMachine;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Something whose countdown can be advanced
pub trait TimeoutClock: Send + Sync + 'static {
    fn tick(&self, delta: Duration) -> Result<(), DialogError>;
}

impl TimeoutClock for ConversationStateMachine {
    fn tick(&self, delta: Duration) -> Result<(), DialogError> {
        self.tick_timeout(delta)
    }
}

/// Periodic task ticking a [`TimeoutClock`].
///
/// Tick errors are logged and ticking goes on. The task stops on
/// [`TimeoutTicker::terminate`] or when the ticker is dropped.
pub struct TimeoutTicker {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    _guard: DropGuard,
}

impl TimeoutTicker {
    /// Start ticking on the current tokio runtime.
    pub fn spawn(clock: Arc<dyn TimeoutClock>, interval: Duration) -> Result<Self, DialogError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DialogError::usage(format!("timeout ticker needs a tokio runtime: {e}")))?;

        let cancel = CancellationToken::new();
        let task = runtime.spawn(run(clock, interval, cancel.clone()));
        tracing::debug!(interval_ms = interval.as_millis(), "Timeout ticker started");

        Ok(Self {
            _guard: cancel.clone().drop_guard(),
            cancel,
            task,
        })
    }

    /// Ask the task to stop. A tick already running finishes first.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }

    /// Wait for the task to stop. Call [`TimeoutTicker::terminate`] first.
    pub async fn join(self) {
        let Self { task, _guard, .. } = self;
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Timeout ticker task failed");
        }
    }
}

async fn run(clock: Arc<dyn TimeoutClock>, interval: Duration, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                tracing::debug!("Timeout ticker stopped");
                return;
            }

            () = tokio::time::sleep(interval) => {}
        }

        // Handlers run under the conversation lock and may block.
        let clock = Arc::clone(&clock);
        match tokio::task::spawn_blocking(move || clock.tick(interval)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Timeout handling failed"),
            Err(e) => tracing::error!(error = %e, "Timeout handling panicked"),
        }
    }
}
