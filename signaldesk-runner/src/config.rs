//! Run configuration: TOML settings file plus environment credentials.
//!
//! Environment:
//! - `BOT_TOKEN`, `CHAT_ID` — required, messaging credentials and destination
//! - `STRATEGY_NAMES` — comma-separated strategy list
//! - `BACKTEST_ENGINE` — engine program, overrides `[engine] command`
//!
//! Everything is validated before the first backtest is invoked.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use signaldesk_core::params::default_parameter_path;
use signaldesk_core::{ConfigurationError, DataSource, StrategyDescriptor, StrategyRegistry};

use crate::channel::TELEGRAM_API_BASE;
use crate::report::{ChunkPolicy, CHUNK_ROWS, MESSAGE_SIZE_LIMIT};

/// Settings file looked up in the working directory when none is given.
pub const DEFAULT_SETTINGS_FILE: &str = "signaldesk.toml";

/// Strategies processed when neither the CLI nor the environment names any.
pub const DEFAULT_STRATEGIES: &str = "UltimateStrategy,RSIStrategy";

pub const ENV_BOT_TOKEN: &str = "BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "CHAT_ID";
pub const ENV_STRATEGY_NAMES: &str = "STRATEGY_NAMES";
pub const ENV_ENGINE: &str = "BACKTEST_ENGINE";

// ─── Settings file ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct Settings {
    pub pipeline: PipelineSettings,
    pub engine: EngineSettings,
    pub telegram: TelegramSettings,
    /// Registry additions: strategy name → engine id.
    pub strategies: BTreeMap<String, StrategyEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PipelineSettings {
    pub parameter_file: PathBuf,
    pub output_dir: PathBuf,
    pub chunk_rows: usize,
    pub message_limit: usize,
    /// Measure rendered messages instead of trusting the row count alone.
    pub fit_to_message_limit: bool,
    pub csv_export: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            parameter_file: default_parameter_path(),
            output_dir: PathBuf::from("."),
            chunk_rows: CHUNK_ROWS,
            message_limit: MESSAGE_SIZE_LIMIT,
            fit_to_message_limit: false,
            csv_export: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineSettings {
    pub command: Option<PathBuf>,
    pub args: Vec<String>,
    pub data_source: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            data_source: DataSource::YAHOO_FINANCE.to_string(),
            start: None,
            end: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TelegramSettings {
    pub api_base: String,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            api_base: TELEGRAM_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyEntry {
    pub id: String,
}

impl Settings {
    /// Parse and validate settings TOML. `origin` is used in error messages only.
    pub fn from_toml(toml_str: &str, origin: &Path) -> Result<Self, ConfigurationError> {
        let settings: Settings =
            toml::from_str(toml_str).map_err(|e| ConfigurationError::InvalidSettingsFile {
                path: origin.to_path_buf(),
                reason: e.to_string(),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let text =
            std::fs::read_to_string(path).map_err(|source| ConfigurationError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml(&text, path)
    }

    /// Load `explicit` if given (must exist), else `signaldesk.toml` if present,
    /// else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigurationError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_SETTINGS_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    tracing::debug!("no settings file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.pipeline.chunk_rows == 0 {
            return Err(invalid("pipeline.chunk_rows", "must be at least 1"));
        }
        if self.pipeline.message_limit == 0 {
            return Err(invalid("pipeline.message_limit", "must be at least 1"));
        }
        if self.engine.data_source.trim().is_empty() {
            return Err(invalid("engine.data_source", "must not be empty"));
        }
        if let (Some(start), Some(end)) = (self.engine.start, self.engine.end) {
            if start > end {
                return Err(invalid("engine.start", "must not be after engine.end"));
            }
        }
        for (name, entry) in &self.strategies {
            if entry.id.trim().is_empty() {
                return Err(invalid(&format!("strategies.{name}.id"), "must not be empty"));
            }
        }
        Ok(())
    }

    pub fn chunk_policy(&self) -> ChunkPolicy {
        if self.pipeline.fit_to_message_limit {
            ChunkPolicy::FitMessage {
                max_rows: self.pipeline.chunk_rows,
                max_chars: self.pipeline.message_limit,
            }
        } else {
            ChunkPolicy::RowCount {
                max_rows: self.pipeline.chunk_rows,
            }
        }
    }

    /// Built-in strategies plus the ones declared in `[strategies]`.
    pub fn registry(&self) -> StrategyRegistry {
        let mut registry = StrategyRegistry::with_builtins();
        for (name, entry) in &self.strategies {
            registry.register(StrategyDescriptor::new(name.clone(), entry.id.clone()));
        }
        registry
    }

    pub fn data_source(&self) -> DataSource {
        DataSource {
            provider: self.engine.data_source.clone(),
            start: self.engine.start,
            end: self.engine.end,
        }
    }
}

fn invalid(key: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidSetting {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

// ─── Environment ────────────────────────────────────────────────────

/// Messaging credentials. The token is never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub bot_token: String,
    pub chat_id: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl Credentials {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            bot_token: required(&lookup, ENV_BOT_TOKEN)?,
            chat_id: required(&lookup, ENV_CHAT_ID)?,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigurationError::MissingSetting(key.to_string()))
}

/// Split a comma-separated strategy list. Blank entries are dropped.
pub fn parse_strategy_names(list: &str) -> Result<Vec<String>, ConfigurationError> {
    let names: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if names.is_empty() {
        return Err(ConfigurationError::NoStrategies);
    }
    Ok(names)
}

// ─── Resolved run configuration ─────────────────────────────────────

/// Everything a run needs, validated.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub settings: Settings,
    pub credentials: Credentials,
    /// Requested strategy names, in processing order.
    pub strategies: Vec<String>,
    pub engine_command: PathBuf,
}

impl RunConfig {
    /// Combine settings with environment values.
    ///
    /// Strategy precedence: `strategies_override` (CLI) > `STRATEGY_NAMES` > default list.
    pub fn resolve<F>(
        settings: Settings,
        strategies_override: Option<&str>,
        lookup: F,
    ) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        settings.validate()?;
        let credentials = Credentials::from_lookup(&lookup)?;

        let strategy_list = match strategies_override {
            Some(list) => list.to_string(),
            None => lookup(ENV_STRATEGY_NAMES).unwrap_or_else(|| DEFAULT_STRATEGIES.to_string()),
        };
        let strategies = parse_strategy_names(&strategy_list)?;

        let engine_command = lookup(ENV_ENGINE)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| settings.engine.command.clone())
            .ok_or_else(|| {
                ConfigurationError::MissingSetting(format!("engine.command or {ENV_ENGINE}"))
            })?;

        Ok(Self {
            settings,
            credentials,
            strategies,
            engine_command,
        })
    }

    /// [`RunConfig::resolve`] against the process environment.
    pub fn from_env(
        settings: Settings,
        strategies_override: Option<&str>,
    ) -> Result<Self, ConfigurationError> {
        Self::resolve(settings, strategies_override, |key| std::env::var(key).ok())
    }
}
