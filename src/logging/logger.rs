//! Production [`Log`] backed by `tracing`, with a per-run summary.
use std::path::PathBuf;
use std::sync::Mutex;

use super::types::{DRY_RUN_TARGET, EventKind, ItemEntry, ItemStatus, Log, STAGE_TARGET};
use super::utils::log_file_path;

/// Per-status counts of recorded items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryCounts {
    /// Files written.
    pub written: usize,
    /// Files left untouched.
    pub skipped: usize,
    /// Files a dry run would have written.
    pub dry_run: usize,
    /// Files that failed.
    pub failed: usize,
}

impl SummaryCounts {
    /// Total number of files.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.written + self.skipped + self.dry_run + self.failed
    }

    const fn add(mut self, status: ItemStatus) -> Self {
        match status {
            ItemStatus::Written => self.written += 1,
            ItemStatus::Skipped => self.skipped += 1,
            ItemStatus::DryRun => self.dry_run += 1,
            ItemStatus::Failed => self.failed += 1,
        }
        self
    }
}

/// Console and file logger for one command invocation.
///
/// Messages become `tracing` events; the subscriber installed by
/// [`init_subscriber`](super::init_subscriber) decides where they go. Item
/// results are kept in memory until [`Logger::print_summary`].
#[derive(Debug)]
pub struct Logger {
    items: Mutex<Vec<ItemEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Logger for `command`. Only remembers the log file path for the
    /// summary; the file itself belongs to the subscriber.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
        }
    }

    #[cfg(test)]
    pub(crate) const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Snapshot of the recorded item results.
    #[must_use]
    pub fn item_entries(&self) -> Vec<ItemEntry> {
        self.items.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Recorded items per status.
    #[must_use]
    pub fn counts(&self) -> SummaryCounts {
        self.item_entries()
            .iter()
            .fold(SummaryCounts::default(), |acc, item| acc.add(item.status))
    }

    /// Log one line per recorded item followed by the totals.
    ///
    /// Does nothing if no item was recorded.
    pub fn print_summary(&self) {
        let items = self.item_entries();
        if items.is_empty() {
            return;
        }

        self.stage("Summary");
        for item in &items {
            let detail = item
                .message
                .as_deref()
                .map(|m| format!(" ({m})"))
                .unwrap_or_default();
            self.info(&format!(
                "{}{} {}{detail}\x1b[0m",
                item.status.color(),
                item.status.marker(),
                item.name
            ));
        }

        let counts = self.counts();
        let totals = [
            (ItemStatus::Written, counts.written),
            (ItemStatus::Skipped, counts.skipped),
            (ItemStatus::DryRun, counts.dry_run),
            (ItemStatus::Failed, counts.failed),
        ]
        .iter()
        .map(|(status, n)| format!("{}{n} {status}\x1b[0m", status.color()))
        .collect::<Vec<_>>()
        .join(", ");
        self.info(&format!("{} files: {totals}", counts.total()));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    fn emit(&self, kind: EventKind, msg: &str) {
        match kind {
            EventKind::Stage => tracing::info!(target: STAGE_TARGET, "{msg}"),
            EventKind::DryRun => tracing::info!(target: DRY_RUN_TARGET, "{msg}"),
            EventKind::Info => tracing::info!("{msg}"),
            EventKind::Debug => tracing::debug!("{msg}"),
            EventKind::Warn => tracing::warn!("{msg}"),
            EventKind::Error => tracing::error!("{msg}"),
        }
    }

    fn record_item(&self, name: &str, status: ItemStatus, message: Option<&str>) {
        if let Ok(mut items) = self.items.lock() {
            items.push(ItemEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }
}
