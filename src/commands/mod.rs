//! Subcommand implementations.
pub mod deploy;

/// Version string, preferring the one stamped at build time.
#[must_use]
pub fn version() -> &'static str {
    option_env!("PUNKTF_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}
