//! Strategy registry: an explicit `code -> generator` table.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{SignalGenerator, SmaCrossover, ZeroLagTrend};
use crate::error::BacktestError;

/// Lookup table of signal generators, built once and passed by reference.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    generators: BTreeMap<&'static str, Arc<dyn SignalGenerator>>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in strategy.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SmaCrossover));
        registry.register(Arc::new(ZeroLagTrend));
        registry
    }

    /// Add (or replace) a generator under its own code.
    pub fn register(&mut self, generator: Arc<dyn SignalGenerator>) {
        self.generators.insert(generator.code(), generator);
    }

    pub fn get(&self, code: &str) -> Result<Arc<dyn SignalGenerator>, BacktestError> {
        self.generators
            .get(code)
            .cloned()
            .ok_or_else(|| BacktestError::UnknownStrategy(code.to_string()))
    }

    /// Registered codes in sorted order.
    pub fn codes(&self) -> Vec<&'static str> {
        self.generators.keys().copied().collect()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("codes", &self.codes())
            .finish()
    }
}
