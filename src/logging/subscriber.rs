//! Global tracing subscriber: colored console output plus a per-command
//! log file.
use std::fs;
use std::io::Write as _;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;

use super::types::EventKind;
use super::utils::{format_utc_datetime, format_utc_time, log_file_path, strip_ansi};

/// Environment variable holding console filter directives.
const LOG_ENV: &str = "PUNKTF_LOG";

/// Pulls the formatted `message` field out of an event.
#[derive(Default)]
struct Message(String);

impl Message {
    fn of(event: &tracing::Event<'_>) -> String {
        let mut visitor = Self::default();
        event.record(&mut visitor);
        visitor.0
    }
}

impl tracing::field::Visit for Message {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            value.clone_into(&mut self.0);
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

/// Layer appending every event to `<cache>/punktf/<command>.log`.
///
/// Lines are timestamped and stripped of ANSI codes. The file is truncated
/// at the start of each run.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Truncate the log file of `command` and write the run header.
    ///
    /// Returns `None` when the file cannot be created.
    pub(super) fn new(command: &str) -> Option<Self> {
        let path = log_file_path(command)?;
        let mut file = fs::File::create(&path).ok()?;
        let version =
            option_env!("PUNKTF_VERSION").unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        writeln!(
            file,
            "# punktf {version} {command} started {}",
            format_utc_datetime()
        )
        .ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let kind = EventKind::of(event.metadata());
        let line = kind.plain(&strip_ansi(&Message::of(event)));
        if let Ok(mut file) = self.file.lock() {
            writeln!(file, "[{}] {line}", format_utc_time()).ok();
        }
    }
}

/// Console event format.
struct ConsoleFormat;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormat
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let kind = EventKind::of(event.metadata());
        writeln!(writer, "{}", kind.colored(&Message::of(event)))
    }
}

/// Console verbosity for the `--verbose` flag.
const fn console_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Install the global subscriber for `command`.
///
/// Warnings and errors go to stderr, everything else to stdout. The console
/// shows `info` and above (`debug` with `verbose`) unless `PUNKTF_LOG` holds
/// [`EnvFilter`](tracing_subscriber::EnvFilter) directives. The log file
/// always receives `debug` and above.
///
/// Call once, before anything is logged.
pub fn init_subscriber(verbose: bool, command: &str) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
    };

    let console_filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::default().add_directive(console_level(verbose).into()));

    let console = fmt::layer()
        .event_format(ConsoleFormat)
        .with_writer(
            std::io::stderr
                .with_max_level(tracing::Level::WARN)
                .and(std::io::stdout.with_min_level(tracing::Level::INFO)),
        )
        .with_filter(console_filter);

    let file = FileLayer::new(command).map(|layer| layer.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry().with(console).with(file).init();
}
