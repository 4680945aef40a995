//! Error handling for simsession-rs
//!
//! This module defines the crate error type and a Result alias used
//! throughout the session core. Domain drivers report failures with
//! `anyhow::Error`; those are folded into [`SessionError::TickFailed`]
//! when a tick is aborted.

use crate::session::SessionMode;
use std::any::Any;
use thiserror::Error;

/// Main error type for session operations
#[derive(Error, Debug)]
pub enum SessionError {
    /// Errors related to configuration loading/saving/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A variable name that is not part of the session registry
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// A buffer or channel request that can never be satisfied
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Errors related to the scheduler thread lifecycle
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// A domain callback failed or panicked during a tick
    #[error("Tick failed in {mode} mode: {message}")]
    TickFailed { mode: SessionMode, message: String },

    /// A listener callback panicked; the event was still delivered to the others
    #[error("Listener panicked: {0}")]
    ListenerPanicked(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SessionError>,
    },
}

impl SessionError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SessionError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build a tick failure from a driver error
    pub fn tick_failed(mode: SessionMode, err: &anyhow::Error) -> Self {
        SessionError::TickFailed {
            mode,
            message: format!("{:#}", err),
        }
    }

    /// Build a tick failure from a caught panic payload
    pub fn from_panic(mode: SessionMode, payload: Box<dyn Any + Send>) -> Self {
        SessionError::TickFailed {
            mode,
            message: format!("panicked: {}", panic_message(payload.as_ref())),
        }
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

impl From<toml::de::Error> for SessionError {
    fn from(err: toml::de::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for SessionError {
    fn from(err: toml::ser::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| SessionError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| SessionError::Io(e).with_context(f()))
    }
}
