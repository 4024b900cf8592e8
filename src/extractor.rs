use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use tar::Archive;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::fetcher::ARCHIVE_SUFFIX;
use crate::parser::document::parse_document;
use crate::report::{RunReport, Stage};
use crate::utils::{basename, document_path, DOCUMENT_SUFFIX, NOT_AVAILABLE};

/// Path segment of the issue container files inside a JORF archive.
pub const CONTAINER_MARKER: &str = "/JORF/CONT/";

pub struct ExtractStats {
    pub archives: usize,
    pub documents: usize,
    pub errors: usize,
}

pub fn is_document_member(path: &str, is_file: bool) -> bool {
    is_file && path.contains(CONTAINER_MARKER) && path.ends_with(DOCUMENT_SUFFIX)
}

/// Extract the container documents of every local archive into `xml_dir`.
pub fn extract_archives(settings: &Settings, report: &mut RunReport) -> Result<ExtractStats> {
    fs::create_dir_all(&settings.xml_dir)
        .with_context(|| format!("Failed to create {}", settings.xml_dir.display()))?;

    let mut archives: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(&settings.archive_dir)
        .with_context(|| format!("Failed to list {}", settings.archive_dir.display()))?
    {
        let entry = entry?;
        if entry.file_name().to_string_lossy().ends_with(ARCHIVE_SUFFIX) {
            archives.push(entry.path());
        }
    }
    info!("Extracting {} archives into {}", archives.len(), settings.xml_dir.display());

    let pb = ProgressBar::new(archives.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut stats = ExtractStats {
        archives: archives.len(),
        documents: 0,
        errors: 0,
    };
    for archive in &archives {
        let name = archive.file_name().unwrap_or_default().to_string_lossy().into_owned();
        pb.set_message(name.clone());
        let failed_before = report.counts(Stage::Extract).failed;

        match extract_archive(archive, &settings.xml_dir, report) {
            Ok(placed) => stats.documents += placed.len(),
            Err(e) => {
                warn!("Cannot read archive {}: {:#}", name, e);
                report.failed(Stage::Extract, name, format!("{:#}", e));
            }
        }
        stats.errors += report.counts(Stage::Extract).failed - failed_before;
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(stats)
}

/// Extract one archive. Member-level failures go to `report`, and so does a
/// stream that breaks mid-archive: the documents placed before the break are
/// still returned. Only an archive that cannot be opened is an error.
pub fn extract_archive(archive: &Path, dest: &Path, report: &mut RunReport) -> Result<Vec<PathBuf>> {
    let name = archive.file_name().unwrap_or_default().to_string_lossy().into_owned();
    let file = File::open(archive)?;
    let mut tar = Archive::new(GzDecoder::new(file));
    let mut placed = Vec::new();

    for entry in tar.entries()? {
        let mut entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Archive {} is unreadable after {} documents: {}", name, placed.len(), e);
                report.failed(Stage::Extract, name, e);
                break;
            }
        };
        let member = match entry.path() {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(e) => {
                warn!("Bad member path in {}: {}", name, e);
                report.failed(Stage::Extract, name.clone(), e);
                continue;
            }
        };
        if !is_document_member(&member, entry.header().entry_type().is_file()) {
            continue;
        }

        // Flatten: archive directories are never reproduced on disk.
        let flat = dest.join(basename(&member));
        if let Err(e) = entry.unpack(&flat) {
            warn!("Cannot extract {}: {}", member, e);
            report.failed(Stage::Extract, member, e);
            continue;
        }

        match place_document(&flat, dest) {
            Ok(target) => {
                debug!("{} -> {}", member, target.display());
                report.ok(Stage::Extract);
                placed.push(target);
            }
            Err(e) => {
                warn!("Cannot parse {}: {:#}", member, e);
                report.failed(Stage::Extract, member, format!("{:#}", e));
                let _ = fs::remove_file(&flat);
            }
        }
    }

    Ok(placed)
}

/// Rename an extracted document to `JORF_<date>.xml`, replacing any
/// previous document with the same publication date.
fn place_document(extracted: &Path, dest: &Path) -> Result<PathBuf> {
    let xml = fs::read_to_string(extracted)?;
    let doc = parse_document(&xml)?;
    let date = doc
        .publication_date
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or(NOT_AVAILABLE);

    let target = document_path(dest, date);
    if target != extracted {
        fs::rename(extracted, &target)
            .with_context(|| format!("Failed to rename to {}", target.display()))?;
    }
    Ok(target)
}
