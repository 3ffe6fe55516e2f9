//! Error types shared by every stage that runs before persistence.
//!
//! Both categories are fatal for a run: configuration problems abort before any
//! backtest is invoked, engine failures abort before anything is persisted or sent.

use std::path::PathBuf;

use thiserror::Error;

/// Missing or invalid configuration, detected before any backtest runs.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("parameter file not found: {}", .0.display())]
    ParameterFileMissing(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed parameter file {}: {reason}", path.display())]
    MalformedParameters { path: PathBuf, reason: String },

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("no strategies requested")]
    NoStrategies,

    #[error("missing required setting: {0}")]
    MissingSetting(String),

    #[error("invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("invalid settings file {}: {reason}", path.display())]
    InvalidSettingsFile { path: PathBuf, reason: String },
}

/// Failure surfaced by the backtest engine. Never retried.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine '{engine}' could not be started: {reason}")]
    Unavailable { engine: String, reason: String },

    #[error("engine failed for {symbol} / {strategy} ({status}): {stderr}")]
    Failed {
        symbol: String,
        strategy: String,
        status: String,
        stderr: String,
    },

    #[error("engine returned malformed output for {symbol} / {strategy}: {reason}")]
    MalformedOutput {
        symbol: String,
        strategy: String,
        reason: String,
    },

    #[error("engine error: {0}")]
    Other(String),
}
