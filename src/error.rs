//! Unified error types for tapfleet

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for tapfleet operations
#[derive(Error, Debug)]
pub enum Error {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Config errors
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config validation failed: {0}")]
    ConfigValidation(String),

    // Tap errors
    #[error("Tap device '{0}' already exists")]
    TapAlreadyExists(String),

    #[error("Tap device '{0}' does not exist")]
    TapNotFound(String),

    #[error("No owner identity configured for tap creation")]
    MissingOwner,

    #[error("Tap device '{0}' was not created by this process")]
    NotOwned(String),

    // Bridge errors
    #[error("Bridge '{0}' already exists")]
    BridgeAlreadyExists(String),

    #[error("Bridge '{0}' does not exist")]
    BridgeNotFound(String),

    #[error("Tap '{tap}' is already attached to bridge '{bridge}'")]
    AlreadyAttached { tap: String, bridge: String },

    #[error("Tap '{tap}' is not attached to bridge '{bridge}'")]
    NotAttached { tap: String, bridge: String },

    // Reconciliation errors
    #[error("Bridge '{bridge}' reports member '{tap}' that does not match the tap listing")]
    Inconsistent { bridge: String, tap: String },

    // Validation errors
    #[error("Invalid interface name '{0}'")]
    InvalidName(String),

    #[error("Invalid MAC address '{0}'")]
    InvalidMac(String),

    // External command errors
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Command '{command}' timed out after {secs} seconds")]
    CommandTimeout { command: String, secs: u64 },

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap this error with the name of the step that failed
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping any context layers
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Attach step context to a fallible result
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}

/// Result type alias for tapfleet operations
pub type Result<T> = std::result::Result<T, Error>;
