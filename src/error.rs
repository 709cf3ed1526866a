//! Error handling module for devboot
//!
//! Errors here belong to the bootstrapper itself: process setup and the
//! child registry. A step that runs and exits non-zero is NOT an error; it
//! is recorded in the report and the sequence carries on. Configuration
//! problems surface through `anyhow` in `config` and `main`.

use thiserror::Error;

/// Main error type for devboot
#[derive(Error, Debug)]
pub enum DevbootError {
    /// IO errors (file operations, process spawning, signal registration)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Step could not be prepared or waited on
    #[error("Step error: {0}")]
    Step(String),

    /// State errors (mutex poisoning)
    #[error("State error: {0}")]
    State(String),
}

/// Result type alias for devboot operations
pub type Result<T> = std::result::Result<T, DevbootError>;

impl DevbootError {
    /// Create a step error
    pub fn step(msg: impl Into<String>) -> Self {
        Self::Step(msg.into())
    }

    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }
}
