//! Stage Timeline
//!
//! Tracks when each provisioning stage started and how it ended, for the
//! summary printed at the end of a run.

use std::fmt;
use std::time::{Duration, Instant};

use colored::Colorize;

/// Provisioning stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SystemPackages,
    Account,
    Distribution,
    BaseEnvironment,
    ToolEnvironments,
}

impl Stage {
    /// All stages in the order they run.
    pub const ALL: [Stage; 5] = [
        Stage::SystemPackages,
        Stage::Account,
        Stage::Distribution,
        Stage::BaseEnvironment,
        Stage::ToolEnvironments,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::SystemPackages => "OS packages",
            Self::Account => "account",
            Self::Distribution => "distribution",
            Self::BaseEnvironment => "base environment",
            Self::ToolEnvironments => "tool environments",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult {
    /// The stage did its work
    Completed,
    /// Nothing to do, or not requested
    Skipped(String),
    /// The operator answered no
    Declined,
    /// The stage failed and ended the run
    Failed,
}

/// A finished stage with its duration.
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub stage: Stage,
    pub result: StageResult,
    pub duration: Duration,
}

/// Records the stages of one provisioning run.
#[derive(Debug, Clone)]
pub struct StageTimeline {
    records: Vec<StageRecord>,
    current: Option<(Stage, Instant)>,
    start_time: Instant,
}

impl StageTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            current: None,
            start_time: Instant::now(),
        }
    }

    /// Marks `stage` as running.
    pub fn start(&mut self, stage: Stage) {
        self.current = Some((stage, Instant::now()));
    }

    /// Records the result of `stage`.
    pub fn finish(&mut self, stage: Stage, result: StageResult) {
        let duration = match self.current.take() {
            Some((running, started)) if running == stage => started.elapsed(),
            _ => Duration::ZERO,
        };
        self.records.push(StageRecord {
            stage,
            result,
            duration,
        });
    }

    /// Returns the recorded stages.
    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    /// Result recorded for `stage`, if it ran.
    pub fn result_of(&self, stage: Stage) -> Option<&StageResult> {
        self.records
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.result)
    }

    /// Returns the total elapsed time since timeline creation.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Renders one line per recorded stage.
    pub fn summary(&self) -> String {
        let mut output = String::from("\nProvisioning summary:\n\n");

        for record in &self.records {
            let status = match &record.result {
                StageResult::Completed => "done".green().to_string(),
                StageResult::Skipped(reason) => format!("{} ({})", "skipped".yellow(), reason),
                StageResult::Declined => "declined".yellow().to_string(),
                StageResult::Failed => "FAILED".red().bold().to_string(),
            };
            output.push_str(&format!(
                "  {:18} {:>8}  {}\n",
                record.stage.label(),
                format_duration(record.duration),
                status
            ));
        }

        output.push_str(&format!("\nTotal: {}\n", format_duration(self.elapsed())));
        output
    }
}

impl Default for StageTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats a duration as `1h02m`, `3m05s` or `12s`.
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
