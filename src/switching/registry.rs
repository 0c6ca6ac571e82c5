//! Explicit registry of switch strategies.

use super::separate::{SeparateIntermediaryStrategy, SEPARATE_STRATEGY};
use super::strategy::SwitchStrategy;
use crate::config::SwitchConfig;
use crate::error::{Result, SwitchError};
use std::collections::BTreeMap;

type StrategyFactory = Box<dyn Fn(&SwitchConfig) -> Box<dyn SwitchStrategy> + Send + Sync>;

/// Maps strategy names to constructors. Built once at startup and passed
/// by reference to whoever creates intermediaries.
#[derive(Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(SEPARATE_STRATEGY, |config| {
            Box::new(SeparateIntermediaryStrategy::from_config(config))
        });
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&SwitchConfig) -> Box<dyn SwitchStrategy> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.insert(name.clone(), Box::new(factory)).is_some() {
            tracing::warn!("strategy '{}' registered twice, keeping the latest", name);
        }
    }

    pub fn create(&self, name: &str, config: &SwitchConfig) -> Result<Box<dyn SwitchStrategy>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SwitchError::NotRegistered(format!("strategy '{}'", name)))?;
        Ok(factory(config))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_contain_separate_strategy() {
        let registry = StrategyRegistry::with_defaults();
        assert!(registry.contains(SEPARATE_STRATEGY));

        let mut config = SwitchConfig::default();
        config.queue.capacity = 3;
        let strategy = registry.create(SEPARATE_STRATEGY, &config).unwrap();
        assert_eq!(strategy.name(), SEPARATE_STRATEGY);
        assert_eq!(strategy.queues().capacity(), 3);
    }

    #[test]
    fn test_unknown_strategy_is_not_registered() {
        let registry = StrategyRegistry::new();
        let err = registry.create("missing", &SwitchConfig::default()).err();
        assert!(matches!(err, Some(SwitchError::NotRegistered(_))));
        assert_eq!(registry.names().count(), 0);
    }
}
