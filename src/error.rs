//! Typed errors for tlc-output.
//!
//! Almost nothing in the parser fails outright: framing problems and
//! unparseable values degrade the affected field only. The errors here are
//! the few that do reach a caller.

use thiserror::Error;

/// Top-level error type for tlc-output operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Reading the TLC output stream failed.
    ///
    /// The session is finalized with whatever had been parsed before the
    /// failure; the partial result stays available on the session.
    #[error("IO error reading TLC output: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization of a result snapshot failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid session configuration.
    #[error("Configuration error: {0}")]
    Builder(#[from] BuilderError),
}

/// Error produced by a configuration builder.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuilderError {
    /// A required field was never set.
    #[error("{builder}: missing required field '{field}'")]
    MissingRequiredField {
        builder: &'static str,
        field: &'static str,
    },
}

/// Result type alias using tlc-output's Error.
pub type TlcResult<T> = std::result::Result<T, Error>;
