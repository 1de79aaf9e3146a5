//! Common error types used throughout mediatheque.
//!
//! This module provides a unified error type covering the failure cases the
//! ingestion pipeline distinguishes: missing rows, transient database
//! contention, constraint violations, and device removal.

/// Common error type for mediatheque.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested row was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// The database is busy or locked. Transient; retried by `with_retries`.
    #[error("Database busy")]
    DatabaseBusy,

    /// A uniqueness or foreign-key constraint was violated.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// The device holding the resource was unplugged mid-operation.
    #[error("Device removed")]
    DeviceRemoved,

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new Constraint error.
    pub fn constraint<S: Into<String>>(msg: S) -> Self {
        Self::Constraint(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error is transient database contention worth retrying.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::DatabaseBusy)
    }

    /// Whether the error is a uniqueness/foreign-key violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Constraint(_))
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
