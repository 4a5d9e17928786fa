//! Run totals and the output sink.
//!
//! Key lines go to stdout so they can be piped; progress and the final summary
//! go to stderr alongside the logs.

use std::fmt;
use std::io::Write;

use crate::condition::MatchCondition;
use crate::reconcile::PassReport;
use crate::store::printable_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    List,
    Purge,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Purge => write!(f, "purge"),
        }
    }
}

/// Totals accumulated over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub matched_count: u64,
    /// Size of every matched value.
    pub total_bytes: u64,
    pub deleted_count: u64,
    /// Size of every successfully deleted value.
    pub deleted_bytes: u64,
    pub failed_delete_count: u64,
}

impl RunSummary {
    pub fn record_match(&mut self, size: usize) {
        self.matched_count += 1;
        self.total_bytes += size as u64;
    }

    pub fn record_deletion(&mut self, size: usize) {
        self.deleted_count += 1;
        self.deleted_bytes += size as u64;
    }

    pub fn record_failed_delete(&mut self) {
        self.failed_delete_count += 1;
    }

    pub fn average_size(&self) -> f64 {
        average(self.total_bytes, self.matched_count)
    }

    pub fn average_deleted_size(&self) -> f64 {
        average(self.deleted_bytes, self.deleted_count)
    }
}

pub fn average(sum: u64, n: u64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    sum as f64 / n as f64
}

pub fn percentage(num: u64, den: u64) -> f64 {
    if den == 0 {
        return 0.0;
    }
    num as f64 * 100.0 / den as f64
}

/// Receives everything a run wants to show the operator.
pub trait Reporter: Send {
    /// A key matched. In purge mode this is called before the delete is
    /// attempted.
    fn matched(&mut self, mode: RunMode, key: &[u8], size: usize);

    /// A tracked key reappeared during reconciliation and is being deleted again.
    fn redeleted(&mut self, key: &[u8]);

    fn progress(&mut self, _visited: u64, _total: u64) {}

    fn reconcile_progress(&mut self, _pass: &PassReport, _tracked_keys: usize, _threshold: u64) {}

    /// Called exactly once per run, whether it succeeded or not.
    fn summary(&mut self, mode: RunMode, summary: &RunSummary, condition: &MatchCondition);
}

pub fn match_line(mode: RunMode, key: &[u8], size: usize) -> String {
    let key = printable_key(key);
    match mode {
        RunMode::List => format!("{key} (size = {size})"),
        RunMode::Purge => format!("DELETE {key} (size = {size})"),
    }
}

pub fn summary_line(mode: RunMode, summary: &RunSummary, condition: &MatchCondition) -> String {
    match mode {
        RunMode::List => format!(
            "found {} keys (total size: {}, average size: {:.1}) matching {}",
            summary.matched_count,
            summary.total_bytes,
            summary.average_size(),
            condition
        ),
        RunMode::Purge => format!(
            "deleted {} keys ({} total size, average size: {:.1}) matching {}, \
             {} keys failed delete, {} keys matched ({} total size)",
            summary.deleted_count,
            summary.deleted_bytes,
            summary.average_deleted_size(),
            condition,
            summary.failed_delete_count,
            summary.matched_count,
            summary.total_bytes
        ),
    }
}

/// Writes key lines to stdout and progress/summary lines to stderr.
pub struct ConsoleReporter {
    progress: bool,
}

impl ConsoleReporter {
    pub fn new(progress: bool) -> Self {
        Self { progress }
    }
}

impl Reporter for ConsoleReporter {
    fn matched(&mut self, mode: RunMode, key: &[u8], size: usize) {
        println!("{}", match_line(mode, key, size));
    }

    fn redeleted(&mut self, key: &[u8]) {
        println!("DELETE {}", printable_key(key));
    }

    fn progress(&mut self, visited: u64, total: u64) {
        if !self.progress {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = write!(
            stderr,
            "Visiting keys {visited} of {total} ({:.2}%)\r",
            percentage(visited, total)
        );
        let _ = stderr.flush();
    }

    fn reconcile_progress(&mut self, pass: &PassReport, tracked_keys: usize, threshold: u64) {
        if !self.progress {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = write!(
            stderr,
            "> reconcile({tracked_keys}) pass:{} cleanDeletes:{}/{threshold}\r",
            pass.pass, pass.consecutive_clean
        );
        let _ = stderr.flush();
    }

    fn summary(&mut self, mode: RunMode, summary: &RunSummary, condition: &MatchCondition) {
        eprintln!("> {}", summary_line(mode, summary, condition));
    }
}

/// Keeps everything in memory, keys rendered as in console output. Used by
/// tests and embedding callers.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub lines: Vec<String>,
    pub redeleted: Vec<String>,
    pub passes: Vec<PassReport>,
    pub summaries: Vec<(RunMode, RunSummary)>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for RecordingReporter {
    fn matched(&mut self, mode: RunMode, key: &[u8], size: usize) {
        self.lines.push(match_line(mode, key, size));
    }

    fn redeleted(&mut self, key: &[u8]) {
        self.redeleted.push(printable_key(key).into_owned());
    }

    fn reconcile_progress(&mut self, pass: &PassReport, _tracked_keys: usize, _threshold: u64) {
        self.passes.push(*pass);
    }

    fn summary(&mut self, mode: RunMode, summary: &RunSummary, _condition: &MatchCondition) {
        self.summaries.push((mode, *summary));
    }
}
