//! SignalDesk Core — domain types, rank order, strategy registry, parameter source.
//!
//! This crate holds everything that does not touch the network or the result
//! artifact:
//! - `BacktestResult` and its `Status` (unknown statuses are tolerated)
//! - The rank order `(status priority, -earnings)`
//! - The strategy registry used to reject unknown strategies at startup
//! - The parameter file loader
//! - The `BacktestEngine` seam the runner calls into

pub mod domain;
pub mod engine;
pub mod error;
pub mod params;
pub mod ranking;
pub mod registry;

pub use domain::{BacktestResult, Status};
pub use engine::{BacktestEngine, BacktestRequest, DataSource};
pub use error::{ConfigurationError, EngineError};
pub use params::{ParamValue, ParameterMap, StrategyParameterSet, TickerParameters};
pub use ranking::{rank, RankedResults};
pub use registry::{StrategyDescriptor, StrategyRegistry};
