//! Unified error types for Ephemera.
//!
//! Every component maps its failures into [`SyncError`] so callers can
//! propagate them with `?` and branch on [`ErrorKind`] where the failure
//! class matters (misuse is fatal, not-connected is transient, and so on).

use std::fmt;
use thiserror::Error;

/// Error kind categorization used across every Ephemera crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// An operation was called before `initialize()`, or `initialize()` ran twice.
    ProgrammerMisuse,
    /// A broadcast was attempted while the transport is disconnected.
    NotConnected,
    /// A time source round trip failed.
    ProbeFailure,
    /// The logical clock has no successful probe yet.
    ClockNotSynchronized,
    /// The local client lacks a role permitted to broadcast.
    AuthorizationDenied,
    /// Input validation failed.
    Validation,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// A configuration error occurred.
    Configuration,
    /// An internal error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProgrammerMisuse => write!(f, "PROGRAMMER_MISUSE"),
            Self::NotConnected => write!(f, "NOT_CONNECTED"),
            Self::ProbeFailure => write!(f, "PROBE_FAILURE"),
            Self::ClockNotSynchronized => write!(f, "CLOCK_NOT_SYNCHRONIZED"),
            Self::AuthorizationDenied => write!(f, "AUTHORIZATION_DENIED"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified error used throughout Ephemera.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct SyncError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SyncError {
    /// Create a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a programmer-misuse error.
    pub fn misuse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProgrammerMisuse, message)
    }

    /// Create a not-connected error.
    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotConnected, message)
    }

    /// Create a probe-failure error.
    pub fn probe_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProbeFailure, message)
    }

    /// Create a clock-not-synchronized error.
    pub fn not_synchronized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ClockNotSynchronized, message)
    }

    /// Create an authorization-denied error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthorizationDenied, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Whether the failure resolves on its own (e.g. once a connection is established).
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, ErrorKind::NotConnected | ErrorKind::ProbeFailure)
    }

    /// Whether the failure is a programming error that must never be retried.
    pub fn is_misuse(&self) -> bool {
        self.kind == ErrorKind::ProgrammerMisuse
    }
}

impl Clone for SyncError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
