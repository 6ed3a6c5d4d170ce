//! Gap summary as JSON

use std::path::Path;

use fcrecon_core::{GapSummary, SinkError};

pub fn summary_to_json(summary: &GapSummary) -> Result<String, SinkError> {
    serde_json::to_string_pretty(summary)
        .map_err(|e| SinkError::Format(format!("JSON serialization failed: {e}")))
}

/// Write the summary to `path`, replacing any existing file
pub fn write_summary_json(path: &Path, summary: &GapSummary) -> Result<(), SinkError> {
    let json = summary_to_json(summary)?;
    std::fs::write(path, json)?;
    Ok(())
}
