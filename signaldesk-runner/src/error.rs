//! Errors from persistence, delivery, and the pipeline as a whole.

use std::path::PathBuf;

use thiserror::Error;

use signaldesk_core::{ConfigurationError, EngineError};

/// Failure writing or reading a result artifact. Fatal before dispatch.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to create artifact directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize results: {0}")]
    Serialize(String),

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
}

/// Failure delivering one report part. Recovered locally, never retried.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected by channel (HTTP {status}): {description}")]
    Rejected { status: u16, description: String },

    #[error("message of {len} characters exceeds the channel limit of {limit}")]
    TooLarge { len: usize, limit: usize },

    #[error("delivery failed: {0}")]
    Other(String),
}

/// Fatal error categories: any of these aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}
