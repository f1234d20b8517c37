//! Interactive confirmation for `ask` merge mode.
use std::io;
use std::path::Path;

/// Asks whether an existing file may be replaced.
#[cfg_attr(test, mockall::automock)]
pub trait MergePrompt: Send + Sync {
    /// Returns `true` if `output` may be overwritten with the content of
    /// `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the question cannot be asked (e.g., no terminal).
    fn confirm_overwrite(&self, output: &Path, source: &Path) -> io::Result<bool>;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl MergePrompt for TerminalPrompt {
    fn confirm_overwrite(&self, output: &Path, source: &Path) -> io::Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(format!(
                "{} already exists. Overwrite it with {}?",
                output.display(),
                source.display()
            ))
            .default(false)
            .interact()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

/// Declines every prompt; used when stdin is not a terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclinePrompt;

impl MergePrompt for DeclinePrompt {
    fn confirm_overwrite(&self, _output: &Path, _source: &Path) -> io::Result<bool> {
        Ok(false)
    }
}
