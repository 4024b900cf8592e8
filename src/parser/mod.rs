pub mod classify;
pub mod document;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::report::{RunReport, Stage};
use crate::utils::DOCUMENT_SUFFIX;
use classify::{DateRange, Outcome, SummaryRecord};

/// Two passes per file: XML → `JorfDocument` → `Outcome`.
pub fn process_document(path: &Path, range: &DateRange) -> Result<Outcome> {
    let xml = fs::read_to_string(path)?;
    let doc = document::parse_document(&xml)?;
    Ok(classify::summarize(&doc, range)?)
}

/// Summarize every `.xml` file in `xml_dir`, in directory listing order.
pub fn read_documents(
    xml_dir: &Path,
    range: &DateRange,
    report: &mut RunReport,
) -> Result<Vec<SummaryRecord>> {
    let entries = fs::read_dir(xml_dir)
        .with_context(|| format!("Failed to list {}", xml_dir.display()))?;

    let mut records = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(DOCUMENT_SUFFIX) {
            continue;
        }

        match process_document(&entry.path(), range) {
            Ok(Outcome::Summarized(record)) => {
                debug!(
                    "{}: {} decrets, {} arretes, {} circulaires",
                    name, record.nb_decrets, record.nb_arretes, record.nb_circulaires
                );
                records.push(record);
                report.ok(Stage::Summarize);
            }
            Ok(Outcome::OutOfRange) | Ok(Outcome::NoRelevantReferences) => {
                report.skipped(Stage::Summarize);
            }
            Err(e) => {
                warn!("Skipping {}: {:#}", name, e);
                report.failed(Stage::Summarize, name, format!("{:#}", e));
            }
        }
    }

    info!("Summarized {} documents from {}", records.len(), xml_dir.display());
    Ok(records)
}
