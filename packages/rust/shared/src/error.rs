//! Error types for ModuleMap.
//!
//! Library crates use [`ModuleMapError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.
//!
//! Propagation policy: per-item failures (one page fetch, one completion
//! call, one malformed reply) are caught and degraded at that item's
//! boundary. Only configuration and input-validation errors may end a run.

use std::path::PathBuf;

/// Top-level error type for all ModuleMap operations.
#[derive(Debug, thiserror::Error)]
pub enum ModuleMapError {
    /// Configuration loading/validation error, including a missing API key.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network, timeout, or HTTP-status failure fetching a page.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Malformed HTML or structure extraction failure.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Authentication, rate-limit, or transport failure calling the
    /// completion capability.
    #[error("completion error: {0}")]
    Completion(String),

    /// The completion succeeded but no valid bracket-delimited JSON of the
    /// expected shape was found in the reply.
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    /// Invalid caller input (no valid URLs, empty seed list, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ModuleMapError>;

impl ModuleMapError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a malformed-response error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ModuleMapError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = ModuleMapError::malformed("no JSON object in reply");
        assert!(err.to_string().contains("no JSON object"));

        let err = ModuleMapError::Fetch("https://example.com: HTTP 503".into());
        assert!(err.to_string().starts_with("fetch error:"));
    }
}
