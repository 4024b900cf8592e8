use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

pub const DEFAULT_SOURCE_URL: &str = "https://echanges.dila.gouv.fr/OPENDATA/JORF/";

/// Run-wide settings, built once in `main` and passed down to every stage.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub source_url: String,
    pub archive_dir: PathBuf,
    pub xml_dir: PathBuf,
    pub db_path: PathBuf,
    pub http_timeout_secs: u64,
}

impl Settings {
    /// Defaults overridden by `JORF_*` environment variables (`JORF_XML_DIR` → `xml_dir`).
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_source(Environment::with_prefix("JORF").try_parsing(true))
    }

    fn from_source(env: Environment) -> Result<Self> {
        Config::builder()
            .set_default("source_url", DEFAULT_SOURCE_URL)?
            .set_default("archive_dir", "data/archives")?
            .set_default("xml_dir", "data/xml")?
            .set_default("db_path", "data/jorf.sqlite")?
            .set_default("http_timeout_secs", 120)?
            .add_source(env)
            .build()
            .context("Failed to build settings")?
            .try_deserialize()
            .context("Invalid JORF_* settings")
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
