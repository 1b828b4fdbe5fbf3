//! Script ingestion: PDF on disk -> cleaned line list.

use crate::error::CoreResult;
use crate::extract;
use std::path::Path;
use tracing::debug;

/// Parse a screenplay PDF into its cleaned lines.
///
/// Page by page, the raw text is split on newlines, every line is trimmed,
/// and blank lines are dropped. Page boundaries are not preserved; the result
/// is one flat list in reading order.
pub fn parse_script_from_pdf(path: &Path) -> CoreResult<Vec<String>> {
    let pages = extract::page_texts(path)?;
    let page_count = pages.len();

    let mut lines = Vec::new();
    for text in pages {
        for raw in text.split('\n') {
            let line = raw.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
    }

    debug!(target: "offbook::ingest", "Parsed {} lines from {} page(s) of {}", lines.len(), page_count, path.display());
    Ok(lines)
}
