//! Backtest invoker — one engine call per configured (ticker, strategy) pair.
//!
//! Tickers without an entry for the requested strategy are skipped silently.
//! Engine errors are not caught: the first failure aborts collection.

use signaldesk_core::{
    BacktestEngine, BacktestRequest, BacktestResult, DataSource, EngineError, ParameterMap,
    StrategyDescriptor,
};

/// Calls the engine for every pair the parameter map configures.
pub struct BacktestInvoker<'a, E: BacktestEngine + ?Sized> {
    engine: &'a E,
    data_source: &'a DataSource,
}

impl<'a, E: BacktestEngine + ?Sized> BacktestInvoker<'a, E> {
    pub fn new(engine: &'a E, data_source: &'a DataSource) -> Self {
        Self {
            engine,
            data_source,
        }
    }

    /// Collect results for one strategy across every configured ticker.
    ///
    /// Order follows the parameter file; the list is otherwise unordered.
    pub fn collect(
        &self,
        params: &ParameterMap,
        strategy: &StrategyDescriptor,
    ) -> Result<Vec<BacktestResult>, EngineError> {
        let mut results = Vec::new();
        let mut invocations = 0usize;

        for (ticker, parameters) in params.pairs_for(&strategy.name) {
            let request = BacktestRequest::single(ticker, strategy, parameters, self.data_source);
            tracing::debug!(
                engine = self.engine.name(),
                ticker,
                strategy = %strategy.name,
                "invoking backtest"
            );
            let returned = self.engine.invoke(&request)?;
            if returned.len() != 1 {
                tracing::warn!(
                    ticker,
                    strategy = %strategy.name,
                    count = returned.len(),
                    "engine returned an unexpected number of results"
                );
            }
            results.extend(returned);
            invocations += 1;
        }

        tracing::info!(
            strategy = %strategy.name,
            invocations,
            results = results.len(),
            "collected backtest results"
        );
        Ok(results)
    }

    /// Collect results for several strategies into a single list.
    pub fn collect_all(
        &self,
        params: &ParameterMap,
        strategies: &[StrategyDescriptor],
    ) -> Result<Vec<BacktestResult>, EngineError> {
        let mut results = Vec::new();
        for strategy in strategies {
            results.extend(self.collect(params, strategy)?);
        }
        Ok(results)
    }
}
