//! Batch pipeline: parameters → backtests → rank → persist → dispatch.
//!
//! Every strategy is backtested and ranked before anything is written, and
//! every artifact is written before anything is sent. A fatal error in any of
//! those stages therefore leaves no partial report behind. Delivery failures
//! are not fatal; they end up in the per-strategy [`DispatchSummary`].

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use signaldesk_core::{rank, BacktestEngine, ParameterMap, RankedResults, StrategyDescriptor};

use crate::channel::MessageChannel;
use crate::config::RunConfig;
use crate::dispatch::{DispatchSummary, ReportDispatcher};
use crate::error::{PersistenceError, PipelineError};
use crate::invoker::BacktestInvoker;
use crate::report::ChunkPolicy;
use crate::store::{self, ArtifactBatch};

/// What happened to one strategy during a run.
#[derive(Debug)]
pub struct StrategyOutcome {
    pub strategy: String,
    pub artifact: PathBuf,
    pub csv: Option<PathBuf>,
    pub result_count: usize,
    pub dispatch: DispatchSummary,
}

/// Result of a completed run. Delivery failures are reported, not raised.
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<StrategyOutcome>,
}

impl RunReport {
    /// True when every part of every report was delivered.
    pub fn fully_delivered(&self) -> bool {
        self.outcomes.iter().all(|o| o.dispatch.is_complete())
    }

    pub fn failed_parts(&self) -> usize {
        self.outcomes.iter().map(|o| o.dispatch.failed.len()).sum()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = self.finished_at - self.started_at;
        writeln!(
            f,
            "Run started {} ({} ms)",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            elapsed.num_milliseconds()
        )?;
        for outcome in &self.outcomes {
            writeln!(
                f,
                "  {} results -> {}; {}",
                outcome.result_count,
                outcome.artifact.display(),
                outcome.dispatch
            )?;
        }
        Ok(())
    }
}

/// Run the whole batch job described by `config`.
pub fn run_pipeline<E, C>(
    config: &RunConfig,
    engine: &E,
    channel: &C,
) -> Result<RunReport, PipelineError>
where
    E: BacktestEngine + ?Sized,
    C: MessageChannel + ?Sized,
{
    let started_at = Utc::now();
    let settings = &config.settings;

    let strategies = settings.registry().resolve(config.strategies.as_slice())?;
    let params = ParameterMap::load(&settings.pipeline.parameter_file)?;
    tracing::info!(
        strategies = strategies.len(),
        tickers = params.len(),
        engine = engine.name(),
        "starting run"
    );

    let data_source = settings.data_source();
    let invoker = BacktestInvoker::new(engine, &data_source);
    let ranked = backtest_and_rank(&invoker, &params, &strategies)?;

    // all or nothing: dropping the batch on error discards every staged file
    let output_dir = &settings.pipeline.output_dir;
    let mut batch = ArtifactBatch::new();
    let mut persisted = Vec::with_capacity(ranked.len());
    for (strategy, results) in &ranked {
        persisted.push(stage(
            &mut batch,
            strategy,
            results,
            output_dir,
            settings.pipeline.csv_export,
        )?);
    }
    batch.commit()?;

    let dispatcher =
        ReportDispatcher::new(channel, &config.credentials.chat_id, settings.chunk_policy());
    let mut outcomes = Vec::with_capacity(ranked.len());
    for ((strategy, results), (artifact, csv)) in ranked.into_iter().zip(persisted) {
        let dispatch = dispatcher.dispatch(&strategy.name, &results);
        if !dispatch.is_complete() {
            tracing::warn!(summary = %dispatch, "report partially delivered");
        }
        outcomes.push(StrategyOutcome {
            strategy: strategy.name,
            artifact,
            csv,
            result_count: results.len(),
            dispatch,
        });
    }

    let report = RunReport {
        started_at,
        finished_at: Utc::now(),
        outcomes,
    };
    tracing::info!(
        strategies = report.outcomes.len(),
        failed_parts = report.failed_parts(),
        "run finished"
    );
    Ok(report)
}

/// Invoke and rank every strategy. The first engine error aborts.
pub fn backtest_and_rank<E: BacktestEngine + ?Sized>(
    invoker: &BacktestInvoker<'_, E>,
    params: &ParameterMap,
    strategies: &[StrategyDescriptor],
) -> Result<Vec<(StrategyDescriptor, RankedResults)>, PipelineError> {
    let mut ranked = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        let results = invoker.collect(params, strategy)?;
        ranked.push((strategy.clone(), rank(results)));
    }
    Ok(ranked)
}

fn stage(
    batch: &mut ArtifactBatch,
    strategy: &StrategyDescriptor,
    results: &RankedResults,
    output_dir: &Path,
    csv_export: bool,
) -> Result<(PathBuf, Option<PathBuf>), PersistenceError> {
    let artifact = store::artifact_path(output_dir, &strategy.name);
    batch.stage_results(results, &artifact)?;

    let csv = if csv_export {
        let path = store::csv_path(output_dir, &strategy.name);
        batch.stage_csv(results, &path)?;
        Some(path)
    } else {
        None
    };
    Ok((artifact, csv))
}

/// Render a stored artifact into the exact message texts a run would send.
pub fn preview_messages(
    artifact: &Path,
    strategy: &str,
    policy: ChunkPolicy,
) -> Result<Vec<String>, PersistenceError> {
    let results = store::load_results(artifact)?;
    Ok(policy
        .split(strategy, &results)
        .iter()
        .map(|chunk| chunk.message())
        .collect())
}
