/// Unified error handling for the vigia relay
///
/// Every failure the relay can observe maps onto one variant here. Resolver
/// side errors are absorbed by the polling loop, session side errors end only
/// the affected session, and only configuration errors are fatal at startup.

use std::fmt;
use std::io;
use thiserror::Error;

pub use crate::config::ConfigError;

/// Main error type for relay operations
#[derive(Debug, Error)]
pub enum VigiaError {
    /// The sentinel could not be dialed or stopped responding
    #[error("Sentinel {addr} unreachable: {source}")]
    OracleUnreachable {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The sentinel reply did not carry a usable primary address
    #[error("Malformed sentinel response: {message}")]
    MalformedResponse { message: String },

    /// A resolved primary did not accept the reachability probe
    #[error("Primary {addr} failed reachability probe: {reason}")]
    ProbeUnreachable { addr: String, reason: String },

    /// A session could not reach the published primary
    #[error("Failed to dial primary {addr}: {reason}")]
    PrimaryDialFailed { addr: String, reason: String },

    /// The listener failed to accept an inbound connection
    #[error("Accept failed: {0}")]
    AcceptFailed(#[source] io::Error),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A bounded sentinel exchange ran out of time
    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Result type alias for relay operations
pub type VigiaResult<T> = Result<T, VigiaError>;

impl VigiaError {
    pub fn oracle_unreachable<S: Into<String>>(addr: S, source: io::Error) -> Self {
        VigiaError::OracleUnreachable {
            addr: addr.into(),
            source,
        }
    }

    pub fn malformed<S: Into<String>>(message: S) -> Self {
        VigiaError::MalformedResponse {
            message: message.into(),
        }
    }

    pub fn probe_unreachable<S: Into<String>>(addr: S, reason: S) -> Self {
        VigiaError::ProbeUnreachable {
            addr: addr.into(),
            reason: reason.into(),
        }
    }

    pub fn primary_dial<S: Into<String>>(addr: S, reason: S) -> Self {
        VigiaError::PrimaryDialFailed {
            addr: addr.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S) -> Self {
        VigiaError::Timeout {
            operation: operation.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        VigiaError::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (the caller may try again later)
    pub fn is_recoverable(&self) -> bool {
        match self {
            VigiaError::OracleUnreachable { .. } => true,
            VigiaError::MalformedResponse { .. } => true,
            VigiaError::ProbeUnreachable { .. } => true,
            VigiaError::PrimaryDialFailed { .. } => true,
            VigiaError::AcceptFailed(_) => true,
            VigiaError::Network(_) => true,
            VigiaError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            VigiaError::Config(_) => ErrorSeverity::Critical,
            VigiaError::Internal { .. } => ErrorSeverity::Critical,
            VigiaError::ProbeUnreachable { .. } => ErrorSeverity::Info,
            VigiaError::OracleUnreachable { .. } => ErrorSeverity::Warning,
            VigiaError::MalformedResponse { .. } => ErrorSeverity::Warning,
            VigiaError::PrimaryDialFailed { .. } => ErrorSeverity::Warning,
            VigiaError::Network(_) => ErrorSeverity::Warning,
            VigiaError::Timeout { .. } => ErrorSeverity::Warning,
            VigiaError::AcceptFailed(_) => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that require immediate attention
    Critical,
    /// Errors that affect functionality but don't crash the system
    Error,
    /// Warnings about potential issues
    Warning,
    /// Informational messages about recoverable issues
    Info,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Warning => write!(f, "WARNING"),
            ErrorSeverity::Info => write!(f, "INFO"),
        }
    }
}
