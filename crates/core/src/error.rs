//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid regexp {pattern:?}: {source}")]
    InvalidRegexp {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown ref kind: {0}")]
    UnknownRefKind(String),

    #[error("unknown metric kind: {0}")]
    UnknownMetricKind(String),

    #[error("unknown task type: {0}")]
    UnknownTaskType(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Compile a configured pattern, keeping the offending pattern in the error.
pub fn compile_regexp(pattern: &str) -> Result<regex::Regex> {
    regex::Regex::new(pattern).map_err(|source| Error::InvalidRegexp {
        pattern: pattern.to_string(),
        source,
    })
}
