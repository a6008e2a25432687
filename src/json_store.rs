//! JSON file store for email batches and processing reports.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::CollaboratorError;
use crate::types::{ProcessedEmail, RawEmail};

/// Load a JSON array of raw emails.
pub fn load_emails(path: &Path) -> Result<Vec<RawEmail>, CollaboratorError> {
    if !path.exists() {
        return Err(CollaboratorError::Io(format!(
            "Email file not found: {}",
            path.display()
        )));
    }
    let content = fs::read_to_string(path)
        .map_err(|e| CollaboratorError::Io(format!("Failed to read {}: {}", path.display(), e)))?;

    let value: Value = serde_json::from_str(&content).map_err(|e| {
        CollaboratorError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    if !value.is_array() {
        return Err(CollaboratorError::Serialization(format!(
            "{} must contain a JSON array of emails",
            path.display()
        )));
    }

    let emails: Vec<RawEmail> = serde_json::from_value(value).map_err(|e| {
        CollaboratorError::Serialization(format!("Invalid email record in {}: {}", path.display(), e))
    })?;
    log::info!("Loaded {} emails from {}", emails.len(), path.display());
    Ok(emails)
}

/// Write the report as pretty JSON, creating parent directories.
///
/// Goes through a temp file and a rename so readers never see a half-written report.
pub fn save_report(path: &Path, report: &[ProcessedEmail]) -> Result<(), CollaboratorError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            CollaboratorError::Io(format!("Failed to create directory {}: {}", parent.display(), e))
        })?;
    }
    let payload = serde_json::to_string_pretty(report)?;

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, format!("{}\n", payload)).map_err(|e| {
        CollaboratorError::Io(format!("Failed to write temp file {}: {}", temp_path.display(), e))
    })?;
    fs::rename(&temp_path, path)
        .map_err(|e| CollaboratorError::Io(format!("Failed to replace {}: {}", path.display(), e)))?;

    log::info!("Wrote {} processed emails to {}", report.len(), path.display());
    Ok(())
}
