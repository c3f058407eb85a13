//! Prior-run metadata records
//!
//! An upstream orchestrator that routed the batch leaves behind a JSON run
//! log of `{item_id, title, external_ref_id}` triples. Loading it lets the
//! resolver skip title lookups and gives the report poster its review-thread
//! targets. Batch discovery itself stays upstream; this module only reads
//! the artifact.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogRecord {
    pub item_id: u64,
    pub title: String,
    #[serde(default)]
    pub external_ref_id: Option<u64>,
}

/// Load records from a JSON array file. A missing path is the caller's
/// mistake and errors; use [`load_if_present`] for optional enrichment.
pub fn load(path: &Path) -> Result<Vec<RunLogRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read run log {}", path.display()))?;
    let records: Vec<RunLogRecord> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse run log {}", path.display()))?;
    Ok(records)
}

/// Like [`load`], but an absent file degrades to no enrichment.
pub fn load_if_present(path: &Path) -> Result<Vec<RunLogRecord>> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "No run log found, proceeding without prior-run metadata");
        return Ok(Vec::new());
    }
    load(path)
}

/// Find the record for one item.
pub fn record_for(records: &[RunLogRecord], item_id: u64) -> Option<&RunLogRecord> {
    records.iter().find(|r| r.item_id == item_id)
}
