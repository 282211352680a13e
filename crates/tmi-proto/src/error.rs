//! Error types for the chat protocol library.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The line could not be parsed as an IRC message.
    #[error("malformed line at position {position}: {line:?}")]
    Malformed {
        /// The offending line.
        line: String,
        /// Character position where parsing failed.
        position: usize,
    },

    /// The line was empty after stripping the terminator.
    #[error("empty line")]
    EmptyLine,
}

impl ProtocolError {
    /// Get a static error code string for log labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Malformed { .. } => "malformed",
            Self::EmptyLine => "empty_line",
        }
    }
}
