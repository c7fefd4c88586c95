//! Effect registry: by-key lookup, category filtering, and chain-build-time
//! parameter validation.

use std::collections::HashMap;

use tracing::info;

use crate::effects::builtin::builtin_effects;
use crate::effects::params::{ResolvedParams, resolve_params};
use crate::effects::traits::{Effect, EffectCategory};
use crate::foundation::error::{MoshError, MoshResult};
use crate::foundation::fuzzy;

/// Registry holding all available effects for lookup by key or category.
pub struct EffectRegistry {
    effects: HashMap<String, Box<dyn Effect>>,
}

impl EffectRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            effects: HashMap::new(),
        }
    }

    /// Create a registry with all built-in effects registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for effect in builtin_effects() {
            registry.register(effect);
        }
        info!(count = registry.effects.len(), "registered built-in effects");
        registry
    }

    /// Register an effect. Overwrites any previous effect with the same key.
    pub fn register(&mut self, effect: Box<dyn Effect>) {
        let key = effect.key().to_string();
        self.effects.insert(key, effect);
    }

    /// Try to register an effect, failing if the key is already taken.
    pub fn try_register(&mut self, effect: Box<dyn Effect>) -> MoshResult<()> {
        let key = effect.key();
        if self.effects.contains_key(key) {
            return Err(MoshError::validation(format!(
                "effect '{key}' is already registered"
            )));
        }
        self.effects.insert(key.to_string(), effect);
        Ok(())
    }

    /// Look up an effect by key.
    pub fn get(&self, key: &str) -> Option<&dyn Effect> {
        self.effects.get(key).map(|e| e.as_ref())
    }

    /// Look up an effect by key, failing with fuzzy-matched suggestions from
    /// the known keys when it does not exist.
    pub fn require(&self, key: &str) -> MoshResult<&dyn Effect> {
        self.get(key).ok_or_else(|| {
            let suggestions = fuzzy::suggestions(key, self.effects.keys().map(String::as_str), 3)
                .into_iter()
                .map(str::to_string)
                .collect();
            MoshError::ParamValidation {
                effect: key.to_string(),
                message: format!("unknown effect key '{key}'"),
                suggestions,
            }
        })
    }

    /// Validate raw instance parameters against an effect's schema.
    ///
    /// This runs once at chain-build time; per-frame execution consumes the
    /// returned [`ResolvedParams`] without re-validating.
    pub fn resolve_params(
        &self,
        key: &str,
        raw: &serde_json::Value,
    ) -> MoshResult<ResolvedParams> {
        let effect = self.require(key)?;
        resolve_params(key, effect.param_defs(), raw)
    }

    /// List all registered effects, sorted by key.
    pub fn list(&self) -> Vec<&dyn Effect> {
        let mut effects: Vec<_> = self.effects.values().map(|e| e.as_ref()).collect();
        effects.sort_by_key(|e| e.key());
        effects
    }

    /// List effects filtered by category, sorted by key.
    pub fn list_by_category(&self, category: EffectCategory) -> Vec<&dyn Effect> {
        let mut effects: Vec<_> = self
            .effects
            .values()
            .filter(|e| e.category() == category)
            .map(|e| e.as_ref())
            .collect();
        effects.sort_by_key(|e| e.key());
        effects
    }

    /// Number of registered effects.
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/registry.rs"]
mod tests;
