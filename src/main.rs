mod config;
mod db;
mod extractor;
mod fetcher;
mod parser;
mod report;
mod utils;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use config::Settings;
use parser::classify::{DateRange, SummaryRecord};
use report::{new_run_id, RunReport, Stage};

#[derive(Parser)]
#[command(name = "jorf_digest", about = "JORF archive downloader and decree/order/circular digest")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download archives from the listing that are not present locally
    Download,
    /// Extract container documents from local archives
    Extract,
    /// Classify extracted documents and store one summary per issue
    Summarize(SummaryArgs),
    /// Download + extract + summarize
    Run(SummaryArgs),
    /// Stored summaries, newest first
    Overview {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Print the references stored for one issue
    Show {
        /// Publication date (YYYY-MM-DD)
        date: String,
    },
    /// Show stored totals
    Stats,
}

#[derive(Args)]
struct SummaryArgs {
    /// First publication date to keep (YYYY-MM-DD, inclusive)
    #[arg(long, value_parser = parse_cli_date)]
    start: Option<NaiveDate>,
    /// Last publication date to keep (YYYY-MM-DD, inclusive)
    #[arg(long, value_parser = parse_cli_date)]
    end: Option<NaiveDate>,
    /// Also write the summaries to this JSON file
    #[arg(long)]
    json: Option<PathBuf>,
}

impl SummaryArgs {
    fn range(&self) -> DateRange {
        if let (Some(s), Some(e)) = (self.start, self.end) {
            if s > e {
                warn!("--start {} is after --end {}: nothing will match", s, e);
            }
        }
        DateRange::new(self.start, self.end)
    }
}

fn parse_cli_date(s: &str) -> Result<NaiveDate, String> {
    parser::classify::parse_date(s).ok_or_else(|| format!("'{}' is not a YYYY-MM-DD date", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    info!(?settings, "Loaded settings");

    let mut report = RunReport::new(new_run_id());

    let result = match cli.command {
        Commands::Download => {
            let client = fetcher::build_client(&settings)?;
            let stats = fetcher::download_archives(&client, &settings, &mut report).await?;
            println!(
                "Listed {} archives: {} downloaded, {} already present, {} errors.",
                stats.listed, stats.downloaded, stats.skipped, stats.errors
            );
            finish_run(&settings, &report)
        }
        Commands::Extract => {
            let stats = extractor::extract_archives(&settings, &mut report)?;
            println!(
                "Extracted {} documents from {} archives ({} errors).",
                stats.documents, stats.archives, stats.errors
            );
            finish_run(&settings, &report)
        }
        Commands::Summarize(args) => {
            summarize(&settings, &args, &mut report)?;
            finish_run(&settings, &report)
        }
        Commands::Run(args) => {
            // Phase 1: Download (a dead listing still leaves local archives to work with)
            let t_download = Instant::now();
            let client = fetcher::build_client(&settings)?;
            match fetcher::download_archives(&client, &settings, &mut report).await {
                Ok(stats) => println!(
                    "Downloaded {} of {} archives ({} errors) in {:.1}s",
                    stats.downloaded,
                    stats.listed,
                    stats.errors,
                    t_download.elapsed().as_secs_f64()
                ),
                Err(e) => {
                    warn!("Download phase failed, continuing with local archives: {:#}", e);
                    report.failed(
                        Stage::Download,
                        settings.source_url.clone(),
                        format!("{:#}", e),
                    );
                }
            }

            // Phase 2: Extract
            let t_extract = Instant::now();
            let stats = extractor::extract_archives(&settings, &mut report)?;
            println!(
                "Extracted {} documents from {} archives in {:.1}s",
                stats.documents,
                stats.archives,
                t_extract.elapsed().as_secs_f64()
            );

            // Phase 3: Summarize
            summarize(&settings, &args, &mut report)?;
            finish_run(&settings, &report)
        }
        Commands::Overview { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, limit)?;
            if rows.is_empty() {
                println!("No summaries stored. Run 'summarize' first.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<10} | {:<40} | {:>7} | {:>7} | {:>11} | {:>6}",
                "#", "Date", "Title", "Decrets", "Arretes", "Circulaires", "Autres"
            );
            println!("{}", "-".repeat(102));
            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<10} | {:<40} | {:>7} | {:>7} | {:>11} | {:>6}",
                    i + 1,
                    r.date_publication,
                    truncate(&r.title, 40),
                    r.nb_decrets,
                    r.nb_arretes,
                    r.nb_circulaires,
                    r.nb_autres
                );
            }
            println!("\n{} issues", rows.len());
            Ok(())
        }
        Commands::Show { date } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let Some(r) = db::fetch_summary(&conn, &date)? else {
                println!("No summary stored for {}.", date);
                return Ok(());
            };
            println!("{} ({})", r.title, r.date_publication);
            for (label, count, list) in [
                ("Decrets", r.nb_decrets, &r.decrets),
                ("Arretes", r.nb_arretes, &r.arretes),
                ("Circulaires", r.nb_circulaires, &r.circulaires),
                ("Autres", r.nb_autres, &r.autres),
            ] {
                println!("\n--- {} ({}) ---", label, count);
                for item in list {
                    println!("  {}", item);
                }
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Issues:      {}", s.summaries);
            println!(
                "Range:       {} .. {}",
                s.first_date.as_deref().unwrap_or("-"),
                s.last_date.as_deref().unwrap_or("-")
            );
            println!("Decrets:     {}", s.decrets);
            println!("Arretes:     {}", s.arretes);
            println!("Circulaires: {}", s.circulaires);
            println!("Autres:      {}", s.autres);
            println!("Failures:    {}", s.failures);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn summarize(settings: &Settings, args: &SummaryArgs, report: &mut RunReport) -> Result<()> {
    let records = parser::read_documents(&settings.xml_dir, &args.range(), report)?;

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    let saved = db::save_summaries(&conn, report.run_id(), &records)?;
    println!("Saved {} summaries to {}", saved, settings.db_path.display());

    if let Some(path) = &args.json {
        write_json(path, &records)?;
        println!("Data saved in {}", path.display());
    }
    Ok(())
}

fn write_json(path: &Path, records: &[SummaryRecord]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

/// Print and persist the per-run report.
fn finish_run(settings: &Settings, report: &RunReport) -> Result<()> {
    report.print();
    if !report.failures().is_empty() {
        let conn = db::connect(&settings.db_path)?;
        db::init_schema(&conn)?;
        db::save_failures(&conn, report)?;
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_date_bounds() {
        let cli = Cli::try_parse_from(["jorf_digest", "summarize", "--start", "2024-07-16"]).unwrap();
        let Commands::Summarize(args) = cli.command else {
            panic!("expected summarize");
        };
        assert_eq!(args.range(), DateRange::new(NaiveDate::from_ymd_opt(2024, 7, 16), None));
    }

    #[test]
    fn cli_rejects_bad_dates() {
        assert!(Cli::try_parse_from(["jorf_digest", "run", "--end", "16/07/2024"]).is_err());
    }

    #[test]
    fn truncate_keeps_width() {
        assert_eq!(truncate("JORF du 16 juillet 2024", 40), "JORF du 16 juillet 2024");
        assert_eq!(truncate("abcdefghij", 6).chars().count(), 6);
    }

    #[test]
    fn json_export_uses_column_names() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.json");
        let record = SummaryRecord {
            title: "JORF du 16 juillet 2024".into(),
            date_publication: "2024-07-16".into(),
            ..Default::default()
        };
        write_json(&path, &[record]).unwrap();

        let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v[0]["date publication"], "2024-07-16");
        assert_eq!(v[0]["nb arretes"], 0);
    }
}
