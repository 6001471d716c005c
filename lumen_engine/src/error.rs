//! Error types for the Lumen engine
//!
//! Every fallible operation of the core and of the Vulkan backend returns
//! [`Result`]. GPU call failures are logged where they happen (see the
//! `engine_err!` family of macros) and propagated as [`Error`].

use std::fmt;

/// Result type for Lumen engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lumen engine errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A graphics API call returned a non-success code
    BackendError(String),

    /// The GPU allocator could not satisfy a request
    OutOfMemory,

    /// Bad argument, layout mismatch or misuse of a resource
    InvalidResource(String),

    /// The machine cannot run the engine (no adapter, missing layer, surface failure)
    InitializationFailed(String),

    /// Malformed or incomplete configuration document
    ConfigError(String),

    /// Unreadable file or undecodable image
    IoError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Error::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
