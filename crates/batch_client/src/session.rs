//! One batch validation session: select, submit, poll, summarize, export.
//!
//! `SessionState` transitions are pure functions so the state machine can be
//! exercised without any runtime. `BatchSession` owns the current state and
//! the poller handle; nothing else mutates either.

use std::{path::Path, sync::Arc, time::Duration};

use shared::{
    domain::{BatchId, BatchStatus},
    protocol::{BatchJob, MerchantRecord},
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    aggregate::{summarize, ResultSummary},
    error::SessionError,
    export::{export_job, CsvExport},
    ingest::{accept_records, inspect_file, BatchInput},
    poller::{PollEvent, PollerHandle, PollerState, StatusPoller, StopReason},
    service::ValidationService,
    submitter::BatchSubmitter,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Empty,
    Selected {
        input: BatchInput,
        last_error: Option<SessionError>,
    },
    Submitting {
        input: BatchInput,
    },
    Polling {
        input: BatchInput,
        job: BatchJob,
    },
    /// Polling halted on a transport error; `job` is the last good snapshot.
    Stalled {
        input: BatchInput,
        job: BatchJob,
        reason: String,
    },
    Terminal {
        input: BatchInput,
        job: BatchJob,
    },
}

impl SessionState {
    pub fn input(&self) -> Option<&BatchInput> {
        match self {
            SessionState::Empty => None,
            SessionState::Selected { input, .. }
            | SessionState::Submitting { input }
            | SessionState::Polling { input, .. }
            | SessionState::Stalled { input, .. }
            | SessionState::Terminal { input, .. } => Some(input),
        }
    }

    pub fn job(&self) -> Option<&BatchJob> {
        match self {
            SessionState::Polling { job, .. }
            | SessionState::Stalled { job, .. }
            | SessionState::Terminal { job, .. } => Some(job),
            _ => None,
        }
    }

    pub fn batch_id(&self) -> Option<&BatchId> {
        self.job().map(|job| &job.batch_id)
    }

    /// A job is active while it is being submitted or polled.
    pub fn has_active_job(&self) -> bool {
        matches!(
            self,
            SessionState::Submitting { .. } | SessionState::Polling { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::Selected { .. } => "selected",
            SessionState::Submitting { .. } => "submitting",
            SessionState::Polling { .. } => "polling",
            SessionState::Stalled { .. } => "stalled",
            SessionState::Terminal { .. } => "terminal",
        }
    }

    /// Error to surface for the current state, if any.
    pub fn error(&self) -> Option<SessionError> {
        match self {
            SessionState::Selected { last_error, .. } => last_error.clone(),
            SessionState::Stalled { reason, .. } => {
                Some(SessionError::PollTransport(reason.clone()))
            }
            SessionState::Terminal { job, .. } if job.status == BatchStatus::Failed => {
                Some(SessionError::BatchFailed {
                    batch_id: job.batch_id.clone(),
                })
            }
            _ => None,
        }
    }

    /// A new selection discards any finished, failed, or stalled job.
    pub fn select(&self, input: BatchInput) -> Result<SessionState, SessionError> {
        if self.has_active_job() {
            return Err(SessionError::JobActive);
        }
        Ok(SessionState::Selected {
            input,
            last_error: None,
        })
    }

    pub fn begin_submit(&self) -> Result<SessionState, SessionError> {
        match self {
            SessionState::Empty => Err(SessionError::NoFileSelected),
            SessionState::Selected { input, .. } => Ok(SessionState::Submitting {
                input: input.clone(),
            }),
            SessionState::Submitting { .. } | SessionState::Polling { .. } => {
                Err(SessionError::JobActive)
            }
            SessionState::Stalled { .. } | SessionState::Terminal { .. } => {
                Err(SessionError::AlreadySubmitted)
            }
        }
    }

    pub fn submitted(self, job: BatchJob) -> SessionState {
        match self {
            SessionState::Submitting { input } if job.is_terminal() => {
                SessionState::Terminal { input, job }
            }
            SessionState::Submitting { input } => SessionState::Polling { input, job },
            other => other,
        }
    }

    pub fn submission_failed(self, error: SessionError) -> SessionState {
        match self {
            SessionState::Submitting { input } => SessionState::Selected {
                input,
                last_error: Some(error),
            },
            other => other,
        }
    }

    /// Applies a polled snapshot. Snapshots for another batch, ones that
    /// change its size or creation time, or ones that would move the job
    /// backwards leave the state unchanged.
    pub fn snapshot(self, next: BatchJob) -> SessionState {
        match self {
            SessionState::Polling { input, job } => {
                if !snapshot_follows(&job, &next) {
                    return SessionState::Polling { input, job };
                }
                if next.is_terminal() {
                    SessionState::Terminal { input, job: next }
                } else {
                    SessionState::Polling { input, job: next }
                }
            }
            other => other,
        }
    }

    pub fn poll_stopped(self, reason: &StopReason) -> SessionState {
        match (self, reason) {
            (SessionState::Polling { input, job }, StopReason::TransportError(reason)) => {
                SessionState::Stalled {
                    input,
                    job,
                    reason: reason.clone(),
                }
            }
            (SessionState::Polling { input, job }, StopReason::Terminal(_)) => {
                SessionState::Stalled {
                    input,
                    job,
                    reason: "service reported a terminal status that could not be applied"
                        .to_string(),
                }
            }
            (state, _) => state,
        }
    }
}

fn snapshot_follows(current: &BatchJob, next: &BatchJob) -> bool {
    if next.batch_id != current.batch_id {
        warn!(
            expected = %current.batch_id,
            received = %next.batch_id,
            "session: ignoring snapshot for another batch"
        );
        return false;
    }
    if next.total_merchants != current.total_merchants || next.created_at != current.created_at {
        warn!(
            batch_id = %current.batch_id,
            total_from = current.total_merchants,
            total_to = next.total_merchants,
            "session: ignoring snapshot that redefines the batch"
        );
        return false;
    }
    if !current.status.can_advance_to(next.status)
        || next.processed_merchants < current.processed_merchants
    {
        warn!(
            batch_id = %current.batch_id,
            from = %current.status,
            to = %next.status,
            processed_from = current.processed_merchants,
            processed_to = next.processed_merchants,
            "session: ignoring snapshot that moves the batch backwards"
        );
        return false;
    }
    true
}

/// Owner of one batch session and its poller.
pub struct BatchSession {
    submitter: BatchSubmitter,
    poller: StatusPoller,
    state: SessionState,
    active_poller: Option<PollerHandle>,
    poll_events: Option<mpsc::UnboundedReceiver<PollEvent>>,
}

impl BatchSession {
    pub fn new(service: Arc<dyn ValidationService>, poll_interval: Duration) -> Self {
        Self {
            submitter: BatchSubmitter::new(Arc::clone(&service)),
            poller: StatusPoller::new(service, poll_interval),
            state: SessionState::Empty,
            active_poller: None,
            poll_events: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn poller_state(&self) -> PollerState {
        if let Some(handle) = &self.active_poller {
            return handle.state();
        }
        match self.state {
            SessionState::Stalled { .. } | SessionState::Terminal { .. } => PollerState::Stopped,
            _ => PollerState::Idle,
        }
    }

    /// Routes a file through the ingest gate. A rejected file leaves the
    /// session untouched.
    pub fn select_file(
        &mut self,
        path: &Path,
        declared_type: Option<&str>,
    ) -> Result<&SessionState, SessionError> {
        let selected = inspect_file(path, declared_type).map_err(|err| {
            warn!(path = %path.display(), error = %err, "session: file rejected");
            err
        })?;
        self.select(BatchInput::CsvFile(selected))
    }

    pub fn select_records(
        &mut self,
        records: Vec<MerchantRecord>,
    ) -> Result<&SessionState, SessionError> {
        let input = accept_records(records)?;
        self.select(input)
    }

    fn select(&mut self, input: BatchInput) -> Result<&SessionState, SessionError> {
        let next = self.state.select(input)?;
        self.release_poller();
        info!(input = %next.input().map(BatchInput::describe).unwrap_or_default(), "session: input selected");
        self.state = next;
        Ok(&self.state)
    }

    /// Uploads the selected input and starts polling. A failed upload is
    /// recorded on the state, not returned; only precondition failures are.
    pub async fn submit(&mut self) -> Result<&SessionState, SessionError> {
        self.state = self.state.begin_submit()?;
        let Some(input) = self.state.input().cloned() else {
            return Err(SessionError::NoFileSelected);
        };

        match self.submitter.submit(&input).await {
            Ok(job) => {
                let batch_id = job.batch_id.clone();
                let state = std::mem::take(&mut self.state);
                self.state = state.submitted(job);
                if matches!(self.state, SessionState::Polling { .. }) {
                    let (handle, events) = self.poller.start(batch_id);
                    self.active_poller = Some(handle);
                    self.poll_events = Some(events);
                }
            }
            Err(err) => {
                let state = std::mem::take(&mut self.state);
                self.state = state.submission_failed(err);
            }
        }
        Ok(&self.state)
    }

    /// Waits for the next poller event and applies it. Returns `None` once no
    /// poller is attached.
    pub async fn next_update(&mut self) -> Option<&SessionState> {
        let event = self.poll_events.as_mut()?.recv().await;
        let state = std::mem::take(&mut self.state);
        match event {
            Some(PollEvent::Snapshot(job)) => {
                self.state = state.snapshot(job);
                if matches!(self.state, SessionState::Terminal { .. }) {
                    self.release_poller();
                }
            }
            Some(PollEvent::Stopped(reason)) => {
                debug!(reason = ?reason, "session: poller stopped");
                self.state = state.poll_stopped(&reason);
                self.release_poller();
            }
            None => {
                self.state = state.poll_stopped(&StopReason::TransportError(
                    "poller exited unexpectedly".to_string(),
                ));
                self.release_poller();
            }
        }
        Some(&self.state)
    }

    /// Drives polling until the session settles on a terminal or stalled
    /// state.
    pub async fn wait_until_settled(&mut self) -> &SessionState {
        while self.next_update().await.is_some() {}
        &self.state
    }

    pub fn summary(&self) -> Option<ResultSummary> {
        match &self.state {
            SessionState::Terminal { job, .. } => summarize(job),
            _ => None,
        }
    }

    pub fn export(&self) -> Result<CsvExport, SessionError> {
        match &self.state {
            SessionState::Terminal { job, .. } => export_job(job),
            _ => Err(SessionError::ExportUnavailable),
        }
    }

    /// Returns to the empty session from any state. Idempotent.
    pub fn reset(&mut self) {
        self.release_poller();
        if !matches!(self.state, SessionState::Empty) {
            info!(from = self.state.label(), "session: reset");
        }
        self.state = SessionState::Empty;
    }

    fn release_poller(&mut self) {
        if let Some(handle) = self.active_poller.take() {
            handle.cancel();
        }
        self.poll_events = None;
    }
}

impl Drop for BatchSession {
    fn drop(&mut self) {
        self.release_poller();
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
