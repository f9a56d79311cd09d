//! Error types for extraction operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    /// Input is not readable as text (binary data, broken encoding).
    /// The only error class that malformed-but-textual input can never
    /// trigger; directive syntax errors are recovered locally instead.
    #[error("input is not readable as text: {0}")]
    Unreadable(String),

    #[error("syntax-tree grammar unavailable: {0}")]
    GrammarUnavailable(String),

    #[error("syntax-tree parse produced no tree")]
    ParseFailed,

    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ExtractResult<T> = Result<T, ExtractError>;
