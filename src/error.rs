//! Error types for proxy-admin-rpc.
//!
//! Protocol failures are values ([`crate::rpc::RpcError`]) that end up inside
//! a response. The enums here cover everything else: loading configuration,
//! running a transport, and reading or writing records.

use std::path::PathBuf;

use thiserror::Error;

use crate::rpc::Errata;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors raised while serving requests over a transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Another server already holds the lock file.
    #[error("another server holds the lock file: {path}")]
    AlreadyRunning {
        /// Path of the lock file.
        path: PathBuf,
    },

    /// The lock file could not be created or inspected.
    #[error("failed to acquire lock file: {path}")]
    Lock {
        /// Path of the lock file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The socket could not be bound.
    #[error("failed to bind socket: {path}")]
    Bind {
        /// Path of the socket.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Accepting connections kept failing.
    #[error("accept failed after {attempts} attempts")]
    Accept {
        /// Number of consecutive failures.
        attempts: u32,
        /// The last IO error.
        #[source]
        source: std::io::Error,
    },

    /// Reading from or writing to a peer failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by the record store and surfaced by the admin handlers.
///
/// Each variant maps to a stable numeric code starting at 100; the code and
/// the display message travel in the errata of an `ExecutionError` response.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// No record with the requested name exists.
    #[error("Record not found.")]
    RecordNotFound,
    /// The record exists but is not a configuration record.
    #[error("Record is not a configuration type.")]
    RecordNotConfig,
    /// The record exists but is not a metric.
    #[error("Record is not a metric type.")]
    RecordNotMetric,
    /// The name or pattern supplied is not usable.
    #[error("Invalid Record Name.")]
    InvalidRecordName,
    /// The new value failed the record's validity check.
    #[error("Validity check failed.")]
    ValidityCheckError,
    /// The record could not be read or converted.
    #[error("Error reading the record.")]
    GeneralError,
    /// The record could not be written.
    #[error("We could not write the record.")]
    RecordWriteError,
}

impl RecordError {
    /// Numeric code carried in errata.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::RecordNotFound => 100,
            Self::RecordNotConfig => 101,
            Self::RecordNotMetric => 102,
            Self::InvalidRecordName => 103,
            Self::ValidityCheckError => 104,
            Self::GeneralError => 105,
            Self::RecordWriteError => 106,
        }
    }
}

impl From<RecordError> for Errata {
    fn from(error: RecordError) -> Self {
        Self::single(error.code(), error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let error = ConfigError::NotFound {
            path: PathBuf::from("/path/to/config.json"),
        };
        let msg = error.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("config.json"));
    }

    #[test]
    fn transport_error_display() {
        let error = TransportError::AlreadyRunning {
            path: PathBuf::from("/tmp/admin.sock.lock"),
        };
        assert!(error.to_string().contains("admin.sock.lock"));
    }

    #[test]
    fn record_error_codes_start_at_100() {
        assert_eq!(RecordError::RecordNotFound.code(), 100);
        assert_eq!(RecordError::RecordWriteError.code(), 106);
        assert_eq!(RecordError::RecordNotFound.to_string(), "Record not found.");
    }

    #[test]
    fn record_error_becomes_errata() {
        let errata: Errata = RecordError::ValidityCheckError.into();
        assert_eq!(
            errata.to_value(),
            serde_json::json!([{"code": 104, "message": "Validity check failed."}])
        );
    }
}
