//! Error types for the default monitor

use lending_core::{ErrorKind, Identity};
use thiserror::Error;

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Monitor errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] lending_core::Error),

    /// Node API unreachable or reply undecodable
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Node API refused the request
    #[error("Rejected by node ({status}): {message}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// Error class reported by the node
        kind: ErrorKind,
        /// Rendered ledger error
        message: String,
    },

    /// Configured key is not the registry's oracle
    #[error("Oracle mismatch: registry expects {expected}, configured key is {configured}")]
    OracleMismatch {
        /// Oracle stored in the registry
        expected: Identity,
        /// Identity of the loaded keypair
        configured: Identity,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Oracle keypair file unreadable or malformed
    #[error("Keypair error: {0}")]
    Keypair(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Liveness failures clear up on a later cycle
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Ledger(e) => e.is_retryable(),
            Error::Rejected { kind, .. } => kind.is_retryable(),
            Error::Http(_) | Error::Io(_) => true,
            _ => false,
        }
    }
}
