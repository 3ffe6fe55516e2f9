//! Backtest engine seam.
//!
//! The engine is an external collaborator: strategy logic, indicator math,
//! trade simulation and market-data retrieval all live behind this trait.
//! Implementations may block; the pipeline calls them sequentially.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::BacktestResult;
use crate::error::EngineError;
use crate::params::StrategyParameterSet;
use crate::registry::StrategyDescriptor;

/// Handle naming the market-data source the engine should use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
}

impl DataSource {
    pub const YAHOO_FINANCE: &'static str = "yfinance";

    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            start: None,
            end: None,
        }
    }
}

impl Default for DataSource {
    fn default() -> Self {
        Self::new(Self::YAHOO_FINANCE)
    }
}

/// One engine call. `strategies[i]` is run with `parameters[i]`.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestRequest<'a> {
    pub tickers: Vec<&'a str>,
    pub strategies: Vec<&'a StrategyDescriptor>,
    pub parameters: Vec<&'a StrategyParameterSet>,
    pub data_source: &'a DataSource,
}

impl<'a> BacktestRequest<'a> {
    /// Request covering a single (ticker, strategy) pair.
    pub fn single(
        ticker: &'a str,
        strategy: &'a StrategyDescriptor,
        parameters: &'a StrategyParameterSet,
        data_source: &'a DataSource,
    ) -> Self {
        Self {
            tickers: vec![ticker],
            strategies: vec![strategy],
            parameters: vec![parameters],
            data_source,
        }
    }
}

/// Runs backtests and returns one result per evaluated (ticker, strategy).
///
/// Failures are not retried by callers.
pub trait BacktestEngine {
    /// Human-readable name of this engine.
    fn name(&self) -> &str;

    fn invoke(&self, request: &BacktestRequest<'_>) -> Result<Vec<BacktestResult>, EngineError>;
}

impl<E: BacktestEngine + ?Sized> BacktestEngine for &E {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn invoke(&self, request: &BacktestRequest<'_>) -> Result<Vec<BacktestResult>, EngineError> {
        (**self).invoke(request)
    }
}

impl<E: BacktestEngine + ?Sized> BacktestEngine for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn invoke(&self, request: &BacktestRequest<'_>) -> Result<Vec<BacktestResult>, EngineError> {
        (**self).invoke(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;

    #[test]
    fn request_serializes_for_external_engines() {
        let strategy = StrategyDescriptor::new("RSIStrategy", "rsi");
        let mut params = StrategyParameterSet::new();
        params.insert("rsi_period", ParamValue::Int(14));
        let source = DataSource::default();
        let request = BacktestRequest::single("AAPL", &strategy, &params, &source);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["tickers"][0], "AAPL");
        assert_eq!(json["strategies"][0]["engine_id"], "rsi");
        assert_eq!(json["parameters"][0]["rsi_period"], 14);
        assert_eq!(json["data_source"]["provider"], "yfinance");
        assert!(json["data_source"].get("start").is_none());
    }
}
