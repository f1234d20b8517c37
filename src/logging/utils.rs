//! Log file location, timestamps and ANSI removal.
use std::fs;
use std::path::PathBuf;

/// Remove ANSI escape sequences from `s`.
///
/// CSI sequences (`ESC [ ... final`) are dropped up to and including their
/// final byte in `@`..=`~`. Any other escape drops only the byte that
/// follows `ESC`.
pub(super) fn strip_ansi(s: &str) -> String {
    let mut plain = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            plain.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            for end in chars.by_ref() {
                if ('@'..='~').contains(&end) {
                    break;
                }
            }
        }
    }
    plain
}

/// `punktf` directory under the user cache directory, created on demand.
///
/// `XDG_CACHE_HOME` wins over the platform default; `./.cache` is the last
/// resort.
pub(super) fn cache_dir() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CACHE_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::cache_dir)
        .unwrap_or_else(|| PathBuf::from(".cache"));
    let dir = base.join("punktf");
    fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Log file of `command` inside [`cache_dir`].
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join(format!("{command}.log")))
}

/// Current UTC date and time, `YYYY-MM-DD HH:MM:SS`.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format("%F %T").to_string()
}

/// Current UTC time, `HH:MM:SS`.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format("%T").to_string()
}
