//! SignalDesk CLI — run the backtest report job, preview stored results.
//!
//! Commands:
//! - `run` — backtest every requested strategy, store the ranked results and
//!   send them to the configured chat
//! - `preview` — render a stored results file into the exact message texts,
//!   without touching the network

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use signaldesk_runner::config::{RunConfig, Settings};
use signaldesk_runner::report::CHUNK_ROWS;
use signaldesk_runner::store::strategy_from_artifact;
use signaldesk_runner::{preview_messages, run_pipeline, ChunkPolicy, CommandEngine, TelegramChannel};

#[derive(Parser)]
#[command(
    name = "signaldesk",
    about = "SignalDesk — ranked backtest reports delivered to chat"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest, rank, store and send reports for the requested strategies.
    Run {
        /// Comma-separated strategy names. Overrides STRATEGY_NAMES.
        #[arg(long)]
        strategies: Option<String>,

        /// Settings file. Defaults to ./signaldesk.toml when present.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the messages a stored results file would produce.
    Preview {
        /// Results artifact (backtest_results_<Strategy>.json).
        #[arg(long)]
        results: PathBuf,

        /// Strategy name for the headline. Defaults to the one in the file name.
        #[arg(long)]
        strategy: Option<String>,

        /// Maximum rows per message.
        #[arg(long, default_value_t = CHUNK_ROWS)]
        chunk_rows: usize,

        /// Also keep every message within this many characters.
        #[arg(long)]
        max_chars: Option<usize>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { strategies, config } => run_report_cmd(strategies, config),
        Commands::Preview {
            results,
            strategy,
            chunk_rows,
            max_chars,
        } => run_preview_cmd(results, strategy, chunk_rows, max_chars),
    }
}

fn run_report_cmd(strategies: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let settings = Settings::load(config_path.as_deref()).context("loading settings")?;
    let config = RunConfig::from_env(settings, strategies.as_deref())?;
    tracing::info!(
        strategies = ?config.strategies,
        engine = %config.engine_command.display(),
        "configuration resolved"
    );

    let engine = CommandEngine::new(&config.engine_command, config.settings.engine.args.clone());
    let channel = TelegramChannel::with_api_base(
        config.credentials.bot_token.as_str(),
        config.settings.telegram.api_base.as_str(),
    )
    .context("creating Telegram client")?
    .with_max_len(config.settings.pipeline.message_limit);

    let report = run_pipeline(&config, &engine, &channel)?;

    print!("{report}");
    if !report.fully_delivered() {
        eprintln!(
            "Warning: {} report part(s) could not be delivered",
            report.failed_parts()
        );
    }
    Ok(())
}

fn run_preview_cmd(
    results: PathBuf,
    strategy: Option<String>,
    chunk_rows: usize,
    max_chars: Option<usize>,
) -> Result<()> {
    if chunk_rows == 0 {
        bail!("--chunk-rows must be at least 1");
    }
    let strategy = match strategy.or_else(|| strategy_from_artifact(&results)) {
        Some(name) => name,
        None => bail!(
            "cannot infer the strategy from {}; pass --strategy",
            results.display()
        ),
    };

    let policy = match max_chars {
        Some(max_chars) => ChunkPolicy::FitMessage {
            max_rows: chunk_rows,
            max_chars,
        },
        None => ChunkPolicy::RowCount {
            max_rows: chunk_rows,
        },
    };

    let messages = preview_messages(&results, &strategy, policy)
        .with_context(|| format!("reading {}", results.display()))?;

    if messages.is_empty() {
        eprintln!("{strategy}: no results, nothing would be sent");
    }
    for (i, message) in messages.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{message}");
    }
    Ok(())
}
