//! Domain types: the per-(ticker, strategy) backtest outcome and its signal status.
//!
//! Results are produced by the backtest engine and never mutated afterwards.
//! The pipeline only reorders, persists, and renders them.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Signal verdict attached to a backtest result.
///
/// The recognized set is closed (BUY, SELL, HOLD). Anything else the engine
/// emits is carried verbatim in `Other` and ranks after every recognized status.
/// A non-string scalar (number, bool, null) is kept as its JSON text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum Status {
    Buy,
    Sell,
    Hold,
    Other(String),
}

impl Status {
    /// Rank-order priority: BUY=0, SELL=1, HOLD=2, anything else=3.
    pub fn priority(&self) -> u8 {
        match self {
            Status::Buy => 0,
            Status::Sell => 1,
            Status::Hold => 2,
            Status::Other(_) => 3,
        }
    }

    /// The status name as written to artifacts and reports.
    pub fn name(&self) -> &str {
        match self {
            Status::Buy => "BUY",
            Status::Sell => "SELL",
            Status::Hold => "HOLD",
            Status::Other(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Status::Other(_))
    }
}

impl From<String> for Status {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "BUY" => Status::Buy,
            "SELL" => Status::Sell,
            "HOLD" => Status::Hold,
            _ => Status::Other(raw),
        }
    }
}

impl From<&str> for Status {
    fn from(raw: &str) -> Self {
        Status::from(raw.to_string())
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        match status {
            Status::Other(raw) => raw,
            known => known.name().to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(StatusVisitor)
    }
}

struct StatusVisitor;

impl<'de> Visitor<'de> for StatusVisitor {
    type Value = Status;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a status string or scalar")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Status, E> {
        Ok(Status::from(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Status, E> {
        Ok(Status::from(v))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Status, E> {
        Ok(Status::Other(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Status, E> {
        Ok(Status::Other(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Status, E> {
        Ok(Status::Other(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Status, E> {
        Ok(Status::Other(v.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Status, E> {
        Ok(Status::Other("null".into()))
    }

    fn visit_none<E: de::Error>(self) -> Result<Status, E> {
        self.visit_unit()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one backtest for one (ticker, strategy) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub status: Status,
    /// System quality number. No enforced range.
    #[serde(deserialize_with = "nullable_f64")]
    pub sqn: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub earnings: f64,
}

impl BacktestResult {
    pub fn new(symbol: impl Into<String>, status: impl Into<Status>, sqn: f64, earnings: f64) -> Self {
        Self {
            symbol: symbol.into(),
            status: status.into(),
            sqn,
            earnings,
        }
    }
}

/// serde_json writes non-finite floats as `null`; read those back as NaN.
fn nullable_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}
