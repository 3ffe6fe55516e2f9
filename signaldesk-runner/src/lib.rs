//! SignalDesk Runner — the batch job around `signaldesk-core`.
//!
//! This crate provides:
//! - Run configuration (settings file + environment credentials)
//! - The backtest invoker and the subprocess engine adapter
//! - The JSON result store with an optional CSV sidecar
//! - Table rendering and chunking of ranked results
//! - The messaging channel seam with a Telegram implementation
//! - The report dispatcher and the end-to-end pipeline

pub mod channel;
pub mod command_engine;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod invoker;
pub mod pipeline;
pub mod report;
pub mod store;

pub use channel::{FormatHint, MessageChannel, TelegramChannel};
pub use command_engine::CommandEngine;
pub use config::{Credentials, RunConfig, Settings};
pub use dispatch::{DispatchPhase, DispatchSummary, ReportDispatcher};
pub use error::{DeliveryError, PersistenceError, PipelineError};
pub use invoker::BacktestInvoker;
pub use pipeline::{preview_messages, run_pipeline, RunReport, StrategyOutcome};
pub use report::{chunk_results, format_message, ChunkPolicy, ReportChunk};
