//! Error handling for spike-pipeline
//!
//! This module defines the crate-level error type and a Result alias used by
//! recordings, detection, configuration and the runner. Errors raised inside
//! the pipeline graph live in [`crate::pipeline::PipelineError`] and convert
//! into [`SpikeError`] with `?`.

use crate::pipeline::PipelineError;
use thiserror::Error;

/// Main error type for spike-pipeline operations
#[derive(Error, Debug)]
pub enum SpikeError {
    /// Errors related to reading traces from a recording
    #[error("Recording error: {0}")]
    Recording(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to peak detection
    #[error("Detection error: {0}")]
    Detection(String),

    /// Errors related to curation sources and filters
    #[error("Curation error: {0}")]
    Curation(String),

    /// Errors raised while building or running a peak pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SpikeError>,
    },
}

impl SpikeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SpikeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for spike-pipeline operations
pub type Result<T> = std::result::Result<T, SpikeError>;

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

impl<T> ResultExt<T> for std::result::Result<T, PipelineError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| SpikeError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| SpikeError::from(e).with_context(f()))
    }
}
