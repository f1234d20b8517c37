//! Console and file logging.
//!
//! The deploy engine talks to the [`Log`] trait. [`Logger`] turns messages
//! into `tracing` events that [`init_subscriber`] routes to the terminal and
//! to `<cache>/punktf/<command>.log`.

mod logger;
mod subscriber;
mod types;
mod utils;

pub use logger::{Logger, SummaryCounts};
pub use subscriber::init_subscriber;
pub use types::{DRY_RUN_TARGET, EventKind, ItemEntry, ItemStatus, Log, STAGE_TARGET};

/// Serializes `XDG_CACHE_HOME` changes between test threads.
#[cfg(test)]
pub(crate) static TEST_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// [`Logger`] whose events land in a log file under a fresh temp dir.
///
/// Installs a thread-local subscriber; keep the guard alive for the whole
/// test.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (Logger, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};

    let tmp = tempfile::tempdir().expect("temp dir");
    let (layer, log) = {
        let _lock = TEST_ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // SAFETY: Protected by TEST_ENV_MUTEX; restored before lock is released.
        #[allow(unsafe_code)]
        unsafe {
            std::env::set_var("XDG_CACHE_HOME", tmp.path());
        }
        let layer = subscriber::FileLayer::new("test").expect("file layer");
        let log = Logger::new("test");
        // SAFETY: Still holding TEST_ENV_MUTEX.
        #[allow(unsafe_code)]
        unsafe {
            std::env::remove_var("XDG_CACHE_HOME");
        }
        (layer, log)
    };
    let dispatch =
        tracing::Dispatch::new(tracing_subscriber::registry().with(layer.with_filter(LevelFilter::DEBUG)));
    let guard = tracing::dispatcher::set_default(&dispatch);
    (log, tmp, guard)
}

/// In-memory [`Log`] for unit tests.
///
/// Lines use the log file format without timestamps.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryLog {
    lines: std::sync::Mutex<Vec<String>>,
    items: std::sync::Mutex<Vec<ItemEntry>>,
}

#[cfg(test)]
impl MemoryLog {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    pub(crate) fn items(&self) -> Vec<ItemEntry> {
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
impl Log for MemoryLog {
    fn emit(&self, kind: EventKind, msg: &str) {
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(kind.plain(msg));
    }

    fn record_item(&self, name: &str, status: ItemStatus, message: Option<&str>) {
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(ItemEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
    }
}
