//! Server-level error types for the API crate.

use std::io;

use thiserror::Error;

/// Errors raised while hosting the API listener.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// The TCP listener could not be bound.
    #[error("failed to bind API listener")]
    Bind {
        /// Source IO error.
        source: io::Error,
    },
    /// The server loop terminated unexpectedly.
    #[error("api server terminated unexpectedly")]
    Serve {
        /// Source IO error.
        source: io::Error,
    },
}
