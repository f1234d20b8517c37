//! Logging vocabulary: event kinds, per-item results and the [`Log`] trait.
use std::fmt;

/// Tracing target for stage headers.
pub const STAGE_TARGET: &str = "punktf::stage";

/// Tracing target for actions previewed in a dry run.
pub const DRY_RUN_TARGET: &str = "punktf::dry_run";

/// Kind of a log line, shared by the console formatter, the log file and the
/// in-memory test log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Major section header.
    Stage,
    /// Action that would have been taken outside a dry run.
    DryRun,
    /// Regular progress message.
    Info,
    /// Detail shown with `--verbose` and always written to the log file.
    Debug,
    /// Recoverable problem.
    Warn,
    /// Failure.
    Error,
}

impl EventKind {
    /// Classify a tracing event by its level and target.
    #[must_use]
    pub fn of(metadata: &tracing::Metadata<'_>) -> Self {
        match (*metadata.level(), metadata.target()) {
            (tracing::Level::ERROR, _) => Self::Error,
            (tracing::Level::WARN, _) => Self::Warn,
            (tracing::Level::INFO, STAGE_TARGET) => Self::Stage,
            (tracing::Level::INFO, DRY_RUN_TARGET) => Self::DryRun,
            (tracing::Level::INFO, _) => Self::Info,
            _ => Self::Debug,
        }
    }

    /// Render `msg` without colors, as it appears in the log file.
    #[must_use]
    pub fn plain(self, msg: &str) -> String {
        match self {
            Self::Stage => format!("==> {msg}"),
            Self::DryRun => format!("[dry run] {msg}"),
            Self::Info => msg.to_string(),
            Self::Debug => format!("[debug] {msg}"),
            Self::Warn => format!("[warn] {msg}"),
            Self::Error => format!("[error] {msg}"),
        }
    }

    /// Render `msg` for a terminal.
    #[must_use]
    pub fn colored(self, msg: &str) -> String {
        match self {
            Self::Stage => format!("\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m"),
            Self::DryRun => format!("  \x1b[33m[DRY RUN]\x1b[0m {msg}"),
            Self::Info => format!("  {msg}"),
            Self::Debug => format!("  \x1b[2m{msg}\x1b[0m"),
            Self::Warn => format!("\x1b[33mWARN\x1b[0m  {msg}"),
            Self::Error => format!("\x1b[31mERROR\x1b[0m {msg}"),
        }
    }
}

/// Result of one output file, kept for the end-of-run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEntry {
    /// Output path.
    pub name: String,
    /// What happened to it.
    pub status: ItemStatus,
    /// Skip reason or error description.
    pub message: Option<String>,
}

/// Summary bucket of an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Written to disk.
    Written,
    /// Left untouched.
    Skipped,
    /// Would have been written.
    DryRun,
    /// Could not be deployed.
    Failed,
}

impl ItemStatus {
    /// Marker shown in front of the path in the summary.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Written => "+",
            Self::Skipped => "=",
            Self::DryRun => "~",
            Self::Failed => "!",
        }
    }

    /// ANSI color of the summary line.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Written => "\x1b[32m",
            Self::Skipped => "\x1b[33m",
            Self::DryRun => "\x1b[37m",
            Self::Failed => "\x1b[31m",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Written => "written",
            Self::Skipped => "skipped",
            Self::DryRun => "dry-run",
            Self::Failed => "failed",
        })
    }
}

/// Sink for deployment progress.
///
/// Implementors provide [`Log::emit`] and [`Log::record_item`]; the
/// per-kind helpers forward to `emit`.
pub trait Log: Send + Sync {
    /// Emit one line of the given kind.
    fn emit(&self, kind: EventKind, msg: &str);

    /// Remember the result of an output file for the summary.
    fn record_item(&self, name: &str, status: ItemStatus, message: Option<&str>);

    /// Stage header.
    fn stage(&self, msg: &str) {
        self.emit(EventKind::Stage, msg);
    }

    /// Progress message.
    fn info(&self, msg: &str) {
        self.emit(EventKind::Info, msg);
    }

    /// Verbose detail.
    fn debug(&self, msg: &str) {
        self.emit(EventKind::Debug, msg);
    }

    /// Warning.
    fn warn(&self, msg: &str) {
        self.emit(EventKind::Warn, msg);
    }

    /// Error.
    fn error(&self, msg: &str) {
        self.emit(EventKind::Error, msg);
    }

    /// Dry-run preview of an action.
    fn dry_run(&self, msg: &str) {
        self.emit(EventKind::DryRun, msg);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_carry_kind_tags() {
        assert_eq!(EventKind::Stage.plain("Deploying"), "==> Deploying");
        assert_eq!(EventKind::DryRun.plain("would write /a"), "[dry run] would write /a");
        assert_eq!(EventKind::Info.plain("wrote /a"), "wrote /a");
        assert_eq!(EventKind::Error.plain("boom"), "[error] boom");
    }

    #[test]
    fn colored_lines_keep_message() {
        for kind in [
            EventKind::Stage,
            EventKind::DryRun,
            EventKind::Info,
            EventKind::Debug,
            EventKind::Warn,
            EventKind::Error,
        ] {
            assert!(kind.colored("needle").contains("needle"), "{kind:?}");
        }
    }

    #[test]
    fn item_status_display_and_markers() {
        assert_eq!(ItemStatus::Written.to_string(), "written");
        assert_eq!(ItemStatus::DryRun.to_string(), "dry-run");
        assert_eq!(ItemStatus::Failed.marker(), "!");
        assert_ne!(ItemStatus::Written.color(), ItemStatus::Failed.color());
    }
}
