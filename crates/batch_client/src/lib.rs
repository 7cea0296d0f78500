//! Batch merchant validation client: CSV ingest, job submission, status
//! polling, result aggregation, and CSV export against a remote validation
//! service.

pub mod aggregate;
pub mod error;
pub mod export;
pub mod ingest;
pub mod poller;
pub mod service;
pub mod session;
mod submitter;

pub use aggregate::{summarize, ResultSummary};
pub use error::{ServiceError, SessionError};
pub use export::{export_filename, export_job, render_csv, CsvExport, EXPORT_HEADER};
pub use ingest::{BatchInput, SelectedFile};
pub use poller::{PollEvent, PollerHandle, PollerState, StatusPoller, StopReason, DEFAULT_POLL_INTERVAL};
pub use service::{CsvUpload, HttpValidationService, ValidationService};
pub use session::{BatchSession, SessionState};
pub use submitter::BatchSubmitter;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
