//! Pattern discovery: shell out to an external scanner and import what it
//! finds.
//!
//! The scanner is a black box with one contract: `<tool> scan <dir>
//! --format json`, one JSON object per stdout line. Lines that fail to
//! parse are skipped with a warning; a non-zero exit is an error carrying
//! stderr.

use std::path::Path;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{AtelierError, Result};
use crate::pattern::PatternStore;
use crate::types::{Pattern, WorkType};

/// One line of scanner output.
#[derive(Debug, Deserialize)]
pub struct DiscoveredPattern {
    pub name: String,
    #[serde(rename = "type")]
    pub pattern_type: WorkType,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Run the scanner over a directory and parse its JSONL output.
pub async fn scan(tool: &str, dir: &Path) -> Result<Vec<DiscoveredPattern>> {
    let output = Command::new(tool)
        .arg("scan")
        .arg(dir)
        .arg("--format")
        .arg("json")
        .output()
        .await?;

    if !output.status.success() {
        return Err(AtelierError::Discovery {
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut found = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<DiscoveredPattern>(line) {
            Ok(pattern) => found.push(pattern),
            Err(e) => warn!("skipping unparseable scanner line: {e}"),
        }
    }
    info!(dir = %dir.display(), count = found.len(), "scan complete");
    Ok(found)
}

/// Insert scanned patterns into the library. Returns the created rows in
/// scan order.
pub fn import(patterns: &PatternStore, discovered: &[DiscoveredPattern]) -> Result<Vec<Pattern>> {
    let mut created = Vec::with_capacity(discovered.len());
    for d in discovered {
        created.push(patterns.create(&d.name, d.pattern_type, &d.description, &d.tags)?);
    }
    Ok(created)
}
