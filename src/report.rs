use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Download,
    Extract,
    Summarize,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Download, Stage::Extract, Stage::Summarize];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::Extract => "extract",
            Stage::Summarize => "summarize",
        }
    }

    fn index(&self) -> usize {
        match self {
            Stage::Download => 0,
            Stage::Extract => 1,
            Stage::Summarize => 2,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub ok: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub stage: Stage,
    /// File name, archive member path or URL of the item that failed.
    pub item: String,
    pub reason: String,
}

/// Per-run tally of every item the pipeline touched. Items that fail are
/// recorded here and skipped instead of aborting the run.
pub struct RunReport {
    run_id: String,
    counts: [StageCounts; 3],
    failures: Vec<Failure>,
}

impl RunReport {
    pub fn new(run_id: String) -> Self {
        RunReport {
            run_id,
            counts: [StageCounts::default(); 3],
            failures: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn ok(&mut self, stage: Stage) {
        self.counts[stage.index()].ok += 1;
    }

    pub fn skipped(&mut self, stage: Stage) {
        self.counts[stage.index()].skipped += 1;
    }

    pub fn failed(&mut self, stage: Stage, item: impl Into<String>, reason: impl fmt::Display) {
        self.counts[stage.index()].failed += 1;
        self.failures.push(Failure {
            stage,
            item: item.into(),
            reason: reason.to_string(),
        });
    }

    pub fn counts(&self, stage: Stage) -> StageCounts {
        self.counts[stage.index()]
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn print(&self) {
        for stage in Stage::ALL {
            let c = self.counts(stage);
            if c == StageCounts::default() {
                continue;
            }
            println!(
                "  {:<10} {} ok, {} skipped, {} failed",
                stage, c.ok, c.skipped, c.failed
            );
        }
        if !self.failures.is_empty() {
            println!("\n--- Failures ---");
            for f in &self.failures {
                println!("  [{}] {}: {}", f.stage, f.item, f.reason);
            }
        }
    }
}

pub fn new_run_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("run-{}", now)
}
