//! Common error types used throughout imageforged.
//!
//! This module provides a unified error type that covers the failure cases of
//! the conversion orchestrator: concurrent operations, invalid options,
//! engine and settings failures, and I/O.

/// Common error type for imageforged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A selected file or directory does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Another operation is already running.
    #[error("Busy: {0} in progress")]
    Busy(String),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The encoding engine rejected a request.
    #[error("Engine error: {0}")]
    Engine(String),

    /// Settings could not be read or written.
    #[error("Settings error: {0}")]
    Settings(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Busy error naming the operation that holds the lock.
    pub fn busy<S: Into<String>>(operation: S) -> Self {
        Self::Busy(operation.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Engine error.
    pub fn engine<S: Into<String>>(msg: S) -> Self {
        Self::Engine(msg.into())
    }

    /// Create a new Settings error.
    pub fn settings<S: Into<String>>(msg: S) -> Self {
        Self::Settings(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a new Io error from a message (for wrapped library errors, etc).
    pub fn io<S: Into<String>>(msg: S) -> Self {
        Self::Io(std::io::Error::other(msg.into()))
    }

    /// Alias for invalid_input (for consistency).
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Short message suitable for showing to a user.
    ///
    /// Engine errors carry the engine's own text without the category prefix.
    pub fn user_message(&self) -> String {
        match self {
            Self::Engine(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
