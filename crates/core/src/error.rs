//! Error types for vershard
//!
//! Expected transaction outcomes — version conflicts, lock conflicts,
//! ejections, cancellations — are booleans on a [`crate::Ticket`], never
//! errors. This enum covers the things that can actually go wrong around
//! the engine: invalid configuration and harness I/O.

use thiserror::Error;

/// All vershard errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration (out-of-range ratio, zero-sized fleet, ...).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error from the benchmark harness (CSV/report output).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for vershard operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = Error::Config("write_ratio must be within [0, 1]".into());
        assert!(err.is_config());
        assert!(err.to_string().contains("write_ratio"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(!err.is_config());
    }
}
