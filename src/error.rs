//! Error types for tablekv
//!
//! Provides a unified error type for all client operations.
//!
//! Errors fall into two scopes that must never be confused:
//! - **connection-fatal**: the byte stream can no longer be trusted
//!   (I/O failure, timeout, undecodable reply, sequence mismatch). The
//!   client closes itself and must be replaced.
//! - **call-scoped**: the request failed but the connection stays usable
//!   (server status codes, local validation, exhausted iteration).

use thiserror::Error;

use crate::protocol::{ErrorClass, Status};

/// Result type alias using TableError
pub type Result<T> = std::result::Result<T, TableError>;

/// Unified error type for tablekv operations
#[derive(Debug, Error)]
pub enum TableError {
    // -------------------------------------------------------------------------
    // Connection-fatal Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Sequence mismatch: sent {sent}, received {received}")]
    SequenceMismatch { sent: u64, received: u64 },

    #[error("Connection closed")]
    ConnectionClosed,

    // -------------------------------------------------------------------------
    // Call-scoped Errors
    // -------------------------------------------------------------------------
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Server replied {0:?} ({code})", code = .0.code())]
    Server(Status),

    #[error("Scan/dump already reached the end")]
    IterationEnded,

    #[error("Invalid continuation: {0}")]
    InvalidContinuation(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TableError {
    /// True when the connection that produced this error must be torn down.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            TableError::Io(_)
                | TableError::Decode(_)
                | TableError::SequenceMismatch { .. }
                | TableError::ConnectionClosed
        )
    }

    /// Classify this error in the same taxonomy as server status codes.
    pub fn class(&self) -> ErrorClass {
        match self {
            TableError::Io(_) => ErrorClass::Transient,
            TableError::Decode(_)
            | TableError::SequenceMismatch { .. }
            | TableError::ConnectionClosed => ErrorClass::Protocol,
            TableError::Validation(_)
            | TableError::InvalidContinuation(_)
            | TableError::Config(_) => ErrorClass::Validation,
            TableError::Server(status) => status.class(),
            TableError::IterationEnded => ErrorClass::IterationEnded,
        }
    }

    /// The server status this error corresponds to, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            TableError::Server(status) => Some(*status),
            TableError::Validation(v) => v.status(),
            TableError::IterationEnded => Some(Status::ScanEnded),
            _ => None,
        }
    }
}

/// Argument checks performed before anything is written to the stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("database id {0} is reserved")]
    DbId(u8),

    #[error("row key length {0} out of range [1, 255]")]
    RowKeyLen(usize),

    #[error("column key length {0} exceeds 65535")]
    ColKeyLen(usize),

    #[error("value length {0} exceeds 1048576")]
    ValueLen(usize),

    #[error("package length {0} must be less than 2097152")]
    PkgLen(usize),

    #[error("scan count {num} out of range [1, {max}]")]
    ScanNum { num: i64, max: u16 },

    #[error("read cas {0} must be 0, 1 or 2")]
    ReadCas(u32),

    #[error("batch of {0} items exceeds 65535")]
    BatchLen(usize),

    #[error("column space {0} is not 0, 1 or 2")]
    ColSpace(u8),

    #[error("unit range [{start}, {end}] is empty")]
    UnitRange { start: u16, end: u16 },

    #[error("item {index}: {source}")]
    Item {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    /// Server status code with the same meaning, when one exists.
    pub fn status(&self) -> Option<Status> {
        match self {
            ValidationError::DbId(_) => Some(Status::InvDbId),
            ValidationError::RowKeyLen(_) => Some(Status::InvRowKey),
            ValidationError::ValueLen(_) => Some(Status::InvValue),
            ValidationError::PkgLen(_) | ValidationError::BatchLen(_) => Some(Status::InvPkgLen),
            ValidationError::ScanNum { .. } => Some(Status::InvScanNum),
            ValidationError::Item { source, .. } => source.status(),
            ValidationError::ColKeyLen(_)
            | ValidationError::ReadCas(_)
            | ValidationError::ColSpace(_)
            | ValidationError::UnitRange { .. } => None,
        }
    }

    /// Tag this error with the batch position it came from.
    pub(crate) fn at(self, index: usize) -> Self {
        ValidationError::Item {
            index,
            source: Box::new(self),
        }
    }
}
