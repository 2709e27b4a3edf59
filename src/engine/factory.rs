/// Engine registry: case-insensitive lookup, one memoised singleton per key.
///
/// Keys are normalised to lowercase at both registration and lookup rather
/// than relying on incidental string behavior. Engines hold no per-call
/// mutable state, so a built instance is safe to share across threads; the
/// Mutex guards the one operation that is not idempotent, first-access lazy
/// instantiation.
use super::leveraged::LeveragedEngine;
use super::momentum::MomentumEngine;
use super::swing::SwingEngine;
use super::value::ValueEngine;
use super::SignalEngine;
use crate::error::{EngineError, Result};
use crate::models::{EngineMetadata, EngineTier};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type EngineCtor = Box<dyn Fn() -> Result<Arc<dyn SignalEngine>> + Send + Sync>;

#[derive(Default)]
struct Registry {
    constructors: HashMap<String, EngineCtor>,
    instances: HashMap<String, Arc<dyn SignalEngine>>,
}

pub struct EngineFactory {
    registry: Mutex<Registry>,
}

impl EngineFactory {
    /// Empty factory; callers register engines explicitly at startup
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Factory with the four stock engines registered
    pub fn with_defaults() -> Self {
        let factory = Self::new();
        factory
            .register("swing", || Ok(Arc::new(SwingEngine::default())))
            .and_then(|_| factory.register("momentum", || Ok(Arc::new(MomentumEngine::default()))))
            .and_then(|_| factory.register("value", || Ok(Arc::new(ValueEngine::default()))))
            .and_then(|_| {
                factory.register("leveraged", || Ok(Arc::new(LeveragedEngine::default())))
            })
            .expect("default engine registration cannot collide");
        factory
    }

    /// Register a constructor under a case-insensitive key.
    /// Duplicate or empty keys fail immediately.
    pub fn register<F>(&self, name: &str, ctor: F) -> Result<()>
    where
        F: Fn() -> Result<Arc<dyn SignalEngine>> + Send + Sync + 'static,
    {
        let key = Self::normalize(name);
        if key.is_empty() {
            return Err(EngineError::InvalidRegistration(
                "engine name must be non-empty".to_string(),
            ));
        }

        let mut registry = self.lock();
        if registry.constructors.contains_key(&key) {
            return Err(EngineError::InvalidRegistration(format!(
                "engine '{}' already registered",
                key
            )));
        }

        tracing::debug!(engine = %key, "registered signal engine");
        registry.constructors.insert(key, Box::new(ctor));
        Ok(())
    }

    /// Resolve case-insensitively; instantiate-and-memoise on first access.
    /// Unknown names raise, listing the currently registered keys.
    pub fn get_engine(&self, name: &str) -> Result<Arc<dyn SignalEngine>> {
        let key = Self::normalize(name);
        let mut registry = self.lock();

        if let Some(instance) = registry.instances.get(&key) {
            return Ok(Arc::clone(instance));
        }

        let Some(ctor) = registry.constructors.get(&key) else {
            let mut known: Vec<String> = registry.constructors.keys().cloned().collect();
            known.sort();
            return Err(EngineError::UnknownEngine {
                name: name.to_string(),
                known,
            });
        };

        let instance = ctor()?;
        registry.instances.insert(key, Arc::clone(&instance));
        Ok(instance)
    }

    /// Registered keys, sorted
    pub fn engine_names(&self) -> Vec<String> {
        let registry = self.lock();
        let mut names: Vec<String> = registry.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Catalog listing. Degrades per-engine: a constructor failure yields an
    /// UNKNOWN stub for that entry instead of aborting the rest.
    pub fn list_engines(&self) -> Vec<EngineMetadata> {
        self.engine_names()
            .iter()
            .map(|name| match self.get_engine(name) {
                Ok(engine) => engine.metadata(),
                Err(err) => {
                    tracing::warn!(engine = %name, error = %err, "catalog entry degraded");
                    EngineMetadata::unknown(name)
                }
            })
            .collect()
    }

    /// Tier filter as a pure predicate over the listing
    pub fn list_engines_by_tier(&self, tier: EngineTier) -> Vec<EngineMetadata> {
        self.list_engines()
            .into_iter()
            .filter(|metadata| metadata.tier == tier)
            .collect()
    }

    fn normalize(name: &str) -> String {
        name.trim().to_lowercase()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        // A poisoned registry means a constructor panicked; the map itself
        // is still structurally sound
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for EngineFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let factory = EngineFactory::with_defaults();
        assert!(factory.get_engine("SWING").is_ok());
        assert!(factory.get_engine("Swing").is_ok());
        assert!(factory.get_engine(" swing ").is_ok());
    }

    #[test]
    fn test_singleton_memoisation() {
        let factory = EngineFactory::with_defaults();
        let first = factory.get_engine("swing").unwrap();
        let second = factory.get_engine("SWING").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unknown_engine_lists_registered_keys() {
        let factory = EngineFactory::with_defaults();
        let err = factory.get_engine("missing").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("missing"));
        assert!(msg.contains("swing"));
        assert!(msg.contains("leveraged"));
    }

    #[test]
    fn test_duplicate_registration_fails_immediately() {
        let factory = EngineFactory::with_defaults();
        let err = factory
            .register("Swing", || Ok(Arc::new(SwingEngine::default())))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRegistration(_)));
    }

    #[test]
    fn test_empty_name_rejected() {
        let factory = EngineFactory::new();
        let err = factory
            .register("  ", || Ok(Arc::new(SwingEngine::default())))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRegistration(_)));
    }

    #[test]
    fn test_catalog_degrades_per_engine() {
        let factory = EngineFactory::new();
        factory
            .register("swing", || Ok(Arc::new(SwingEngine::default())))
            .unwrap();
        factory
            .register("broken", || {
                Err(EngineError::InvalidRegistration("ctor exploded".to_string()))
            })
            .unwrap();

        let listing = factory.list_engines();
        assert_eq!(listing.len(), 2);

        let broken = listing.iter().find(|m| m.name == "broken").unwrap();
        assert_eq!(broken.version, "UNKNOWN");
        let swing = listing.iter().find(|m| m.name == "swing").unwrap();
        assert_eq!(swing.version, "1.2.0");
    }

    #[test]
    fn test_tier_filtering() {
        let factory = EngineFactory::with_defaults();
        let elite = factory.list_engines_by_tier(EngineTier::Elite);
        let names: Vec<&str> = elite.iter().map(|m| m.name.as_str()).collect();
        assert!(names.contains(&"value"));
        assert!(names.contains(&"leveraged"));
        assert!(!names.contains(&"swing"));
    }
}
