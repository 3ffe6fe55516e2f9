//! Strategy registry — resolves requested strategy names to engine descriptors.
//!
//! Resolution happens once at startup. An unknown name is a configuration
//! error for the whole run, not a per-ticker failure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Identifies a strategy implementation to the backtest engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    /// Name as it appears in the parameter file and in reports.
    pub name: String,
    /// Identifier the engine uses to select its implementation.
    pub engine_id: String,
}

impl StrategyDescriptor {
    pub fn new(name: impl Into<String>, engine_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine_id: engine_id.into(),
        }
    }
}

/// Name → descriptor mapping.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    entries: BTreeMap<String, StrategyDescriptor>,
}

impl StrategyRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the RSI and Ultimate Oscillator strategies.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(StrategyDescriptor::new("RSIStrategy", "rsi"));
        registry.register(StrategyDescriptor::new(
            "UltimateStrategy",
            "ultimate_oscillator",
        ));
        registry
    }

    /// Add or replace an entry.
    pub fn register(&mut self, descriptor: StrategyDescriptor) {
        self.entries.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&StrategyDescriptor> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve requested names in request order.
    ///
    /// Repeated names are collapsed to their first occurrence. Fails on the
    /// first name that is not registered, or when nothing was requested.
    pub fn resolve<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<StrategyDescriptor>, ConfigurationError> {
        let mut resolved: Vec<StrategyDescriptor> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let descriptor = self
                .get(name)
                .ok_or_else(|| ConfigurationError::UnknownStrategy(name.to_string()))?;
            if !resolved.iter().any(|d| d.name == descriptor.name) {
                resolved.push(descriptor.clone());
            }
        }
        if resolved.is_empty() {
            return Err(ConfigurationError::NoStrategies);
        }
        Ok(resolved)
    }
}
