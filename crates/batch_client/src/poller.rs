//! Recurring status fetch for one batch.
//!
//! Each poller is a spawned task that owns a cancellation token. Fetches are
//! strictly sequential: the next tick is not awaited until the previous fetch
//! has settled, so at most one request is in flight and snapshots are emitted
//! in the order they were fetched. Ticks missed during a slow fetch are
//! delayed, not burst.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::{BatchId, BatchStatus},
    protocol::BatchJob,
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::service::ValidationService;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Terminal(BatchStatus),
    TransportError(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Snapshot(BatchJob),
    Stopped(StopReason),
}

pub struct StatusPoller {
    service: Arc<dyn ValidationService>,
    interval: Duration,
}

impl StatusPoller {
    /// A zero interval falls back to `DEFAULT_POLL_INTERVAL`.
    pub fn new(service: Arc<dyn ValidationService>, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!("poller: zero interval requested; using the default");
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };
        Self { service, interval }
    }

    /// Spawns the polling task for `batch_id`. Events arrive on the returned
    /// receiver; the task ends with exactly one `PollEvent::Stopped`.
    pub fn start(&self, batch_id: BatchId) -> (PollerHandle, mpsc::UnboundedReceiver<PollEvent>) {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(PollerState::Polling);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        info!(batch_id = %batch_id, interval_ms = self.interval.as_millis() as u64, "poller: started");
        let task = tokio::spawn(run_poll_loop(
            Arc::clone(&self.service),
            batch_id.clone(),
            self.interval,
            cancel.clone(),
            state_tx,
            events_tx,
        ));

        let handle = PollerHandle {
            batch_id,
            cancel,
            state: state_rx,
            task: Some(task),
        };
        (handle, events_rx)
    }
}

/// Owning handle of a running poller. Dropping it cancels the task.
pub struct PollerHandle {
    batch_id: BatchId,
    cancel: CancellationToken,
    state: watch::Receiver<PollerState>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }

    /// Idempotent.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            debug!(batch_id = %self.batch_id, "poller: cancel requested");
            self.cancel.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for the polling task to finish.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_poll_loop(
    service: Arc<dyn ValidationService>,
    batch_id: BatchId,
    period: Duration,
    cancel: CancellationToken,
    state: watch::Sender<PollerState>,
    events: mpsc::UnboundedSender<PollEvent>,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break StopReason::Cancelled,
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => break StopReason::Cancelled,
            fetched = service.batch_status(&batch_id) => fetched,
        };

        match fetched {
            Ok(job) => {
                let status = job.status;
                debug!(
                    batch_id = %batch_id,
                    status = %status,
                    processed = job.processed_merchants,
                    total = job.total_merchants,
                    "poller: snapshot"
                );
                if events.send(PollEvent::Snapshot(job)).is_err() {
                    break StopReason::Cancelled;
                }
                if status.is_terminal() {
                    break StopReason::Terminal(status);
                }
            }
            Err(err) => {
                warn!(batch_id = %batch_id, error = %err, "poller: status fetch failed; keeping last snapshot");
                break StopReason::TransportError(err.to_string());
            }
        }
    };

    info!(batch_id = %batch_id, reason = ?reason, "poller: stopped");
    state.send_replace(PollerState::Stopped);
    let _ = events.send(PollEvent::Stopped(reason));
}

#[cfg(test)]
#[path = "tests/poller_tests.rs"]
mod tests;
