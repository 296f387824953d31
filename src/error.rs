use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::literal::LiteralError;

/// All errors produced while injecting a stylesheet.
#[derive(Debug, Error)]
pub enum InjectError {
    /// The compiled stylesheet has not been built yet.
    #[error("{} not found. Run the stylesheet build first.", path.display())]
    MissingInput { path: PathBuf },

    #[error("cannot read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The template has no placeholder pattern to replace.
    #[error("placeholder {pattern} not found in '{}'", template.display())]
    PlaceholderNotFound { template: PathBuf, pattern: String },

    /// The template has more than one placeholder and the policy wants exactly one.
    #[error(
        "placeholder {pattern} occurs {count} times in '{}', expected exactly one",
        template.display()
    )]
    AmbiguousPlaceholder {
        template: PathBuf,
        pattern: String,
        count: usize,
    },

    /// An injected literal did not read back as the original stylesheet.
    #[error("injected literal at byte {offset} does not reproduce the stylesheet")]
    RoundTrip { offset: usize },

    #[error("injected literal at byte {offset} is malformed: {source}")]
    Literal {
        offset: usize,
        #[source]
        source: LiteralError,
    },

    #[error("invalid config '{}': {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, InjectError>;

/// Shorthand constructors.
impl InjectError {
    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// True for the failures caused by a stale or misconfigured build
    /// rather than by the filesystem.
    pub fn is_build_misconfiguration(&self) -> bool {
        matches!(
            self,
            Self::MissingInput { .. }
                | Self::PlaceholderNotFound { .. }
                | Self::AmbiguousPlaceholder { .. }
        )
    }
}
