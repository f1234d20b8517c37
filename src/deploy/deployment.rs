//! Record of one deployment run.
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};

use super::plan::SkipReason;

/// Aggregate result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentStatus {
    /// Every entry was deployed, skipped on purpose, or previewed.
    Success,
    /// Something failed.
    Failed(String),
}

impl DeploymentStatus {
    /// Returns `true` for [`DeploymentStatus::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// What happened to one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// The file was written.
    Written,
    /// Dry run; the file would have been written.
    WouldWrite,
    /// The file was left untouched.
    Skipped(SkipReason),
    /// The entry could not be deployed.
    Failed(String),
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Written => f.write_str("written"),
            Self::WouldWrite => f.write_str("would write"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Per-entry outcome reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    /// Output path.
    pub output: PathBuf,
    /// Item path as declared.
    pub item: PathBuf,
    /// Profile that declared the item.
    pub profile: String,
    /// Result.
    pub status: OutcomeStatus,
}

/// How a path became part of the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployedKind {
    /// An explicit item.
    Item {
        /// Item path as declared.
        item: PathBuf,
        /// Priority of the item.
        priority: i64,
    },
    /// A file inside a directory item.
    Child {
        /// Output path of the directory item.
        parent: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DeployedEntry {
    kind: DeployedKind,
    success: bool,
}

/// Collects results while a run is in progress.
#[must_use]
#[derive(Debug, Clone)]
pub struct DeploymentBuilder {
    time_start: DateTime<Utc>,
    entries: BTreeMap<PathBuf, DeployedEntry>,
    outcomes: Vec<ItemOutcome>,
}

impl Default for DeploymentBuilder {
    fn default() -> Self {
        Self {
            time_start: Utc::now(),
            entries: BTreeMap::new(),
            outcomes: Vec::new(),
        }
    }
}

impl DeploymentBuilder {
    /// Track `path` as deployed (or not) by `kind`.
    pub fn record(&mut self, path: PathBuf, kind: DeployedKind, success: bool) -> &mut Self {
        self.entries.insert(path, DeployedEntry { kind, success });
        self
    }

    /// Append the outcome of one entry.
    pub fn add_outcome(&mut self, outcome: ItemOutcome) -> &mut Self {
        self.outcomes.push(outcome);
        self
    }

    /// Returns `true` if `path` was recorded.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Whether `path` was deployed successfully, if it was recorded at all.
    #[must_use]
    pub fn is_deployed(&self, path: &Path) -> Option<bool> {
        self.entries.get(path).map(|e| e.success)
    }

    /// Priority of the item that deployed `path`.
    ///
    /// Children are followed to their directory item. Returns `None` if
    /// `path` is unknown or any link of the chain failed.
    #[must_use]
    pub fn get_priority(&self, path: &Path) -> Option<i64> {
        let mut entry = self.entries.get(path)?;
        loop {
            if !entry.success {
                return None;
            }
            match &entry.kind {
                DeployedKind::Item { priority, .. } => return Some(*priority),
                DeployedKind::Child { parent } => entry = self.entries.get(parent)?,
            }
        }
    }

    /// Outcomes collected so far.
    #[must_use]
    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    /// Finish a successful run.
    pub fn success(self) -> Deployment {
        self.finish(DeploymentStatus::Success)
    }

    /// Finish a failed run.
    pub fn failed(self, reason: impl Into<String>) -> Deployment {
        self.finish(DeploymentStatus::Failed(reason.into()))
    }

    fn finish(self, status: DeploymentStatus) -> Deployment {
        Deployment {
            time_start: self.time_start,
            time_end: Utc::now(),
            status,
            outcomes: self.outcomes,
        }
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    time_start: DateTime<Utc>,
    time_end: DateTime<Utc>,
    status: DeploymentStatus,
    outcomes: Vec<ItemOutcome>,
}

impl Deployment {
    /// Start collecting a new run.
    pub fn build() -> DeploymentBuilder {
        DeploymentBuilder::default()
    }

    /// When the run started.
    #[must_use]
    pub const fn time_start(&self) -> &DateTime<Utc> {
        &self.time_start
    }

    /// When the run finished.
    #[must_use]
    pub const fn time_end(&self) -> &DateTime<Utc> {
        &self.time_end
    }

    /// Wall-clock duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.time_end - self.time_start
    }

    /// Aggregate status.
    #[must_use]
    pub const fn status(&self) -> &DeploymentStatus {
        &self.status
    }

    /// Returns `true` if the run succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Per-entry outcomes in execution order.
    #[must_use]
    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    /// Outcome for `output`, if the run touched it.
    #[must_use]
    pub fn outcome(&self, output: &Path) -> Option<&ItemOutcome> {
        self.outcomes.iter().find(|o| o.output == output)
    }
}
