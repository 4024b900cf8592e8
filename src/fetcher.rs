use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use tracing::{info, warn};
use url::Url;

use crate::config::Settings;
use crate::report::{RunReport, Stage};
use crate::utils::basename;

pub const ARCHIVE_PREFIX: &str = "JORF_";
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Quoted or bare `href` values.
static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*["']?([^"'\s>]+)"#).unwrap());

/// An archive link found on the listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveRef {
    pub name: String,
    pub url: Url,
}

pub struct FetchStats {
    pub listed: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Extract `JORF_*.tar.gz` anchors from a directory listing, resolved against `base`.
pub fn parse_listing(html: &str, base: &Url) -> Vec<ArchiveRef> {
    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    for caps in HREF_RE.captures_iter(html) {
        let href = &caps[1];
        let name = basename(href);
        if !name.starts_with(ARCHIVE_PREFIX) || !name.ends_with(ARCHIVE_SUFFIX) {
            continue;
        }
        if !seen.insert(name.to_string()) {
            continue;
        }
        match base.join(href) {
            Ok(url) => refs.push(ArchiveRef {
                name: name.to_string(),
                url,
            }),
            Err(e) => warn!("Unresolvable link {}: {}", href, e),
        }
    }
    refs
}

/// Archives not yet present in `dir` under their listing name.
pub fn pending_archives<'a>(refs: &'a [ArchiveRef], dir: &Path) -> Vec<&'a ArchiveRef> {
    refs.iter().filter(|r| !dir.join(&r.name).exists()).collect()
}

pub fn build_client(settings: &Settings) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(settings.http_timeout())
        .build()
        .context("Failed to build HTTP client")
}

/// Fetch the listing, then download each missing archive one at a time.
pub async fn download_archives(
    client: &reqwest::Client,
    settings: &Settings,
    report: &mut RunReport,
) -> Result<FetchStats> {
    let base = Url::parse(&settings.source_url)
        .with_context(|| format!("Invalid source URL {}", settings.source_url))?;
    std::fs::create_dir_all(&settings.archive_dir)
        .with_context(|| format!("Failed to create {}", settings.archive_dir.display()))?;

    info!("Fetching archive listing: {}", base);
    let html = client
        .get(base.clone())
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .context("Failed to fetch archive listing")?
        .text()
        .await
        .context("Failed to read archive listing")?;

    let refs = parse_listing(&html, &base);
    let pending = pending_archives(&refs, &settings.archive_dir);
    let skipped = refs.len() - pending.len();
    info!("{} archives listed, {} already downloaded", refs.len(), skipped);
    for _ in 0..skipped {
        report.skipped(Stage::Download);
    }

    let pb = ProgressBar::new(pending.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut downloaded = 0usize;
    let mut errors = 0usize;
    for archive in pending {
        pb.set_message(archive.name.clone());
        match download_one(client, archive, &settings.archive_dir).await {
            Ok(bytes) => {
                info!("Downloaded {} ({} bytes)", archive.name, bytes);
                downloaded += 1;
                report.ok(Stage::Download);
            }
            Err(e) => {
                warn!("Error while downloading {}: {:#}", archive.name, e);
                errors += 1;
                report.failed(Stage::Download, archive.url.as_str(), format!("{:#}", e));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(FetchStats {
        listed: refs.len(),
        downloaded,
        skipped,
        errors,
    })
}

/// Body goes to `<name>.part` first so an interrupted transfer is never
/// mistaken for a complete archive on the next run.
async fn download_one(client: &reqwest::Client, archive: &ArchiveRef, dir: &Path) -> Result<usize> {
    let bytes = client
        .get(archive.url.clone())
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    let target = dir.join(&archive.name);
    let partial = dir.join(format!("{}.part", archive.name));
    tokio::fs::write(&partial, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", partial.display()))?;
    tokio::fs::rename(&partial, &target)
        .await
        .with_context(|| format!("Failed to move {} into place", partial.display()))?;
    Ok(bytes.len())
}
