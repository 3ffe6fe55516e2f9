//! Parameter source — loads the per-ticker, per-strategy parameter file.
//!
//! Accepted shape (JSON):
//!
//! ```json
//! { "AAPL": { "RSIStrategy": { "parameter": { "rsi_period": 14 } } } }
//! ```
//!
//! The `"parameter"` wrapper is optional; a strategy entry without it is read
//! as the parameter mapping itself. Values must be scalars. Parameter
//! semantics are not validated here, that belongs to the engine.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigurationError;

const PARAMETER_KEY: &str = "parameter";

/// A single scalar parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(v) => f.write_str(v),
        }
    }
}

/// Parameter name → value for one (ticker, strategy) pair.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyParameterSet(BTreeMap<String, ParamValue>);

impl StrategyParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Strategies configured for one ticker, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerParameters {
    pub ticker: String,
    pub strategies: Vec<(String, StrategyParameterSet)>,
}

impl TickerParameters {
    pub fn get(&self, strategy: &str) -> Option<&StrategyParameterSet> {
        self.strategies
            .iter()
            .find(|(name, _)| name == strategy)
            .map(|(_, params)| params)
    }
}

/// Ticker → strategy → parameters, loaded once per run. Read-only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterMap {
    tickers: Vec<TickerParameters>,
}

impl ParameterMap {
    /// Load and parse the parameter file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigurationError::ParameterFileMissing(path.to_path_buf())
            } else {
                ConfigurationError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        let map = Self::from_json_str(&text, path)?;
        tracing::debug!(
            path = %path.display(),
            tickers = map.len(),
            "loaded parameter file"
        );
        Ok(map)
    }

    /// Parse parameter JSON. `origin` is used in error messages only.
    pub fn from_json_str(json: &str, origin: &Path) -> Result<Self, ConfigurationError> {
        let malformed = |reason: String| ConfigurationError::MalformedParameters {
            path: origin.to_path_buf(),
            reason,
        };

        let root: Value = serde_json::from_str(json).map_err(|e| malformed(e.to_string()))?;
        let Value::Object(root) = root else {
            return Err(malformed("top level must be an object".into()));
        };

        let mut tickers = Vec::with_capacity(root.len());
        for (ticker, strategies) in root {
            if ticker.trim().is_empty() {
                return Err(malformed("empty ticker identifier".into()));
            }
            let Value::Object(strategies) = strategies else {
                return Err(malformed(format!("{ticker}: expected an object of strategies")));
            };

            let mut parsed = Vec::with_capacity(strategies.len());
            for (strategy, entry) in strategies {
                let params = parse_parameter_set(&entry)
                    .map_err(|reason| malformed(format!("{ticker}/{strategy}: {reason}")))?;
                parsed.push((strategy, params));
            }
            tickers.push(TickerParameters {
                ticker,
                strategies: parsed,
            });
        }

        Ok(Self { tickers })
    }

    /// Tickers in file order.
    pub fn tickers(&self) -> impl Iterator<Item = &TickerParameters> {
        self.tickers.iter()
    }

    /// Parameters for one pair, if configured.
    pub fn get(&self, ticker: &str, strategy: &str) -> Option<&StrategyParameterSet> {
        self.tickers
            .iter()
            .find(|t| t.ticker == ticker)
            .and_then(|t| t.get(strategy))
    }

    /// Every (ticker, parameters) pair configured for `strategy`, in file order.
    /// Tickers without an entry for the strategy are skipped.
    pub fn pairs_for<'a>(
        &'a self,
        strategy: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a StrategyParameterSet)> + 'a {
        self.tickers
            .iter()
            .filter_map(move |t| t.get(strategy).map(|p| (t.ticker.as_str(), p)))
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

fn parse_parameter_set(entry: &Value) -> Result<StrategyParameterSet, String> {
    let Value::Object(fields) = entry else {
        return Err("expected an object".into());
    };
    let mapping: &Map<String, Value> = match fields.get(PARAMETER_KEY) {
        Some(Value::Object(inner)) => inner,
        Some(_) => return Err(format!("'{PARAMETER_KEY}' must be an object")),
        None => fields,
    };

    let mut params = StrategyParameterSet::new();
    for (name, value) in mapping {
        params.insert(name.clone(), scalar(name, value)?);
    }
    Ok(params)
}

fn scalar(name: &str, value: &Value) -> Result<ParamValue, String> {
    match value {
        Value::Bool(b) => Ok(ParamValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(ParamValue::Int(i)),
            None => n
                .as_f64()
                .map(ParamValue::Float)
                .ok_or_else(|| format!("{name}: number out of range")),
        },
        Value::String(s) => Ok(ParamValue::Text(s.clone())),
        Value::Null => Err(format!("{name}: null is not a parameter value")),
        Value::Array(_) | Value::Object(_) => Err(format!("{name}: expected a scalar value")),
    }
}

/// Default location of the parameter file, relative to the working directory.
pub fn default_parameter_path() -> PathBuf {
    PathBuf::from("parameter_v2.json")
}
