//! File-type gate in front of the submitter. Content is not parsed here; the
//! service owns column validation.

use std::{fs, path::{Path, PathBuf}};

use shared::protocol::MerchantRecord;

use crate::error::SessionError;

pub const CSV_CONTENT_TYPE: &str = "text/csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub declared_type: String,
    pub size_bytes: u64,
}

/// What a session submits: an uploaded CSV or records posted as JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchInput {
    CsvFile(SelectedFile),
    Records(Vec<MerchantRecord>),
}

impl BatchInput {
    pub fn describe(&self) -> String {
        match self {
            BatchInput::CsvFile(file) => {
                format!("{} ({:.1} KB)", file.name, file.size_bytes as f64 / 1024.0)
            }
            BatchInput::Records(records) => format!("{} merchant records", records.len()),
        }
    }
}

pub fn is_csv_type(declared_type: &str) -> bool {
    declared_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(CSV_CONTENT_TYPE))
        .unwrap_or(false)
}

/// Accepts `path` when its declared type is CSV. Without an explicit type the
/// declared type is guessed from the file extension.
pub fn inspect_file(path: &Path, declared_type: Option<&str>) -> Result<SelectedFile, SessionError> {
    let declared_type = match declared_type {
        Some(declared) => declared.trim().to_string(),
        None => mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string(),
    };
    if !is_csv_type(&declared_type) {
        return Err(SessionError::IngestRejected {
            reason: format!(
                "{} has type {declared_type}; please select a valid CSV file",
                path.display()
            ),
        });
    }

    let metadata = fs::metadata(path).map_err(|err| SessionError::IngestRejected {
        reason: format!("cannot read {}: {err}", path.display()),
    })?;
    if !metadata.is_file() {
        return Err(SessionError::IngestRejected {
            reason: format!("{} is not a regular file", path.display()),
        });
    }

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(SelectedFile {
        path: path.to_path_buf(),
        name,
        declared_type,
        size_bytes: metadata.len(),
    })
}

pub fn accept_records(records: Vec<MerchantRecord>) -> Result<BatchInput, SessionError> {
    if records.is_empty() {
        return Err(SessionError::IngestRejected {
            reason: "no merchant records to validate".to_string(),
        });
    }
    Ok(BatchInput::Records(records))
}
