//! Operating system detection and line-ending handling.
use std::borrow::Cow;
use std::fmt;

/// Detected operating system platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Linux and other Unix-like systems.
    Linux,
    /// Windows.
    Windows,
}

impl Os {
    /// Detect the current operating system.
    #[must_use]
    pub const fn detect() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            // Other Unix-like systems behave like Linux here
            Self::Linux
        }
    }

    /// Line ending conventionally used for text files on this OS.
    #[must_use]
    pub const fn native_line_ending(self) -> LineEnding {
        match self {
            Self::Linux => LineEnding::Lf,
            Self::Windows => LineEnding::CrLf,
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

/// Line ending applied to written text files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
    /// Leave content untouched.
    Keep,
}

/// Line-ending policy as selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LineEndingPolicy {
    /// Use the convention of the current OS.
    #[default]
    Native,
    /// Always `\n`.
    Lf,
    /// Always `\r\n`.
    Crlf,
    /// Leave content untouched.
    Keep,
}

impl LineEndingPolicy {
    /// Resolve the policy into a concrete line ending for `os`.
    #[must_use]
    pub const fn resolve(self, os: Os) -> LineEnding {
        match self {
            Self::Native => os.native_line_ending(),
            Self::Lf => LineEnding::Lf,
            Self::Crlf => LineEnding::CrLf,
            Self::Keep => LineEnding::Keep,
        }
    }
}

impl LineEnding {
    /// Rewrite line endings of `content`.
    ///
    /// Only valid UTF-8 without NUL bytes is treated as text; anything else
    /// is returned unchanged.
    #[must_use]
    pub fn normalize(self, content: &[u8]) -> Cow<'_, [u8]> {
        if self == Self::Keep || !is_text(content) {
            return Cow::Borrowed(content);
        }

        let has_crlf = content.windows(2).any(|w| w == b"\r\n");
        match self {
            Self::Lf if !has_crlf => Cow::Borrowed(content),
            Self::Lf => Cow::Owned(to_lf(content)),
            Self::CrLf => {
                let lf = if has_crlf {
                    to_lf(content)
                } else {
                    content.to_vec()
                };
                let mut out = Vec::with_capacity(lf.len() + lf.len() / 16);
                for &b in &lf {
                    if b == b'\n' {
                        out.push(b'\r');
                    }
                    out.push(b);
                }
                if out == content {
                    Cow::Borrowed(content)
                } else {
                    Cow::Owned(out)
                }
            }
            Self::Keep => Cow::Borrowed(content),
        }
    }
}

fn is_text(content: &[u8]) -> bool {
    !content.contains(&0) && std::str::from_utf8(content).is_ok()
}

fn to_lf(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    let mut iter = content.iter().peekable();
    while let Some(&b) = iter.next() {
        if b == b'\r' && iter.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}
