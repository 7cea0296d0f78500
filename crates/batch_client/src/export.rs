//! Serializes completed batch results to the download CSV.
//!
//! Column order is fixed. The merchant name and the two address-like columns
//! are always quote-wrapped; other text columns are quoted only when they
//! would otherwise break the row. Embedded quotes are doubled.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use csv::{QuoteStyle, Terminator, WriterBuilder};
use shared::{
    domain::{BatchId, BatchStatus},
    protocol::{BatchJob, ValidationResult},
};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::SessionError;

pub const EXPORT_HEADER: [&str; 10] = [
    "merchant_name",
    "validation_status",
    "risk_level",
    "risk_score",
    "google_name",
    "google_address",
    "phone",
    "website",
    "rating",
    "business_status",
];

const SEARCH_QUERY_NAME_PREFIX: &str = "name: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub filename: String,
    pub contents: String,
}

impl CsvExport {
    /// Writes the export into `dir` under its filename. The file appears
    /// under the final name only once fully written.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf, SessionError> {
        let final_path = dir.join(&self.filename);
        let io_error = |reason: std::io::Error| SessionError::Io {
            path: final_path.clone(),
            reason: reason.to_string(),
        };

        fs::create_dir_all(dir).map_err(io_error)?;
        let mut temp = NamedTempFile::new_in(dir).map_err(io_error)?;
        temp.write_all(self.contents.as_bytes()).map_err(io_error)?;
        temp.flush().map_err(io_error)?;
        temp.persist(&final_path)
            .map_err(|err| io_error(err.error))?;

        info!(path = %final_path.display(), bytes = self.contents.len(), "export: results saved");
        Ok(final_path)
    }
}

pub fn export_filename(batch_id: &BatchId) -> String {
    format!("batch_validation_results_{batch_id}.csv")
}

pub fn export_job(job: &BatchJob) -> Result<CsvExport, SessionError> {
    if job.status != BatchStatus::Completed {
        return Err(SessionError::ExportUnavailable);
    }
    Ok(CsvExport {
        filename: export_filename(&job.batch_id),
        contents: render_csv(job.results())?,
    })
}

pub fn render_csv(results: &[ValidationResult]) -> Result<String, SessionError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(EXPORT_HEADER)
        .map_err(|err| SessionError::Export(err.to_string()))?;
    for result in results {
        writer
            .write_record(export_row(result))
            .map_err(|err| SessionError::Export(err.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| SessionError::Export(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| SessionError::Export(err.to_string()))
}

fn export_row(result: &ValidationResult) -> [String; 10] {
    let merchant = result.merchant_info.as_ref();
    let merchant_name = result.search_query.replacen(SEARCH_QUERY_NAME_PREFIX, "", 1);

    [
        quoted(&merchant_name),
        result.validation_status.to_string(),
        result.risk_assessment.risk_level.to_string(),
        format!("{:.1}", result.risk_assessment.risk_score),
        merchant.map(|m| quoted(&m.name)).unwrap_or_default(),
        merchant.map(|m| quoted(&m.address)).unwrap_or_default(),
        merchant
            .and_then(|m| m.phone.as_deref())
            .map(quoted_if_needed)
            .unwrap_or_default(),
        merchant
            .and_then(|m| m.website.as_deref())
            .map(quoted_if_needed)
            .unwrap_or_default(),
        merchant
            .and_then(|m| m.rating)
            .filter(|rating| *rating != 0.0)
            .map(|rating| rating.to_string())
            .unwrap_or_default(),
        merchant
            .and_then(|m| m.business_status.as_deref())
            .map(quoted_if_needed)
            .unwrap_or_default(),
    ]
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn quoted_if_needed(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        quoted(value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
#[path = "tests/export_tests.rs"]
mod tests;
