//! Explicit factory registry mapping names to component constructors.
//!
//! Factories are resolved when a pipeline is built, never through global
//! side-effecting registration. A registry starts either empty or with the
//! builtin factories, and callers add their own constructors (for example a
//! model-backed `ner`) before loading packages.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

use super::component::{Component, ComponentConfig};
use super::tokenizer::Tokenizer;
use super::{PipelineError, Result};
use crate::components;

/// Inputs available to a factory when constructing a component
#[derive(Debug)]
pub struct FactoryContext<'a> {
    /// Name the component will have in the pipeline
    pub name: &'a str,
    /// Component config from the package manifest or the caller
    pub config: ComponentConfig,
    /// Component data directory inside a package, if any
    pub data_dir: Option<&'a Path>,
    /// Tokenizer of the pipeline receiving the component
    pub tokenizer: &'a Tokenizer,
}

impl<'a> FactoryContext<'a> {
    pub fn new(name: &'a str, config: ComponentConfig, tokenizer: &'a Tokenizer) -> Self {
        Self {
            name,
            config,
            data_dir: None,
            tokenizer,
        }
    }

    pub fn with_data_dir(mut self, data_dir: &'a Path) -> Self {
        self.data_dir = Some(data_dir);
        self
    }
}

/// Constructor closure stored in the registry
pub type FactoryFn = Box<dyn Fn(FactoryContext<'_>) -> Result<Box<dyn Component>> + Send + Sync>;

/// Registry of component factories
pub struct FactoryRegistry {
    factories: BTreeMap<String, FactoryFn>,
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("factories", &self.names())
            .finish()
    }
}

impl FactoryRegistry {
    /// Create a registry with no factories
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Create a registry with the builtin factories
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        components::register_builtins(&mut registry);
        registry
    }

    /// Register a factory, replacing any previous one with the same name
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(FactoryContext<'_>) -> Result<Box<dyn Component>> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(factory = %name, "Registering component factory");
        self.factories.insert(name, Box::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered factory names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Construct a component with the named factory
    pub fn create(&self, factory: &str, ctx: FactoryContext<'_>) -> Result<Box<dyn Component>> {
        let constructor = self
            .factories
            .get(factory)
            .ok_or_else(|| PipelineError::UnknownFactory(factory.to_string()))?;
        constructor(ctx)
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::language::tests::MarkerComponent;

    #[test]
    fn test_builtins_registered() {
        let registry = FactoryRegistry::with_builtins();
        for name in ["entity_ruler", "ner", "sentencizer", "tagger", "tok2vec"] {
            assert!(registry.contains(name), "missing builtin {name}");
        }
    }

    #[test]
    fn test_unknown_factory() {
        let registry = FactoryRegistry::empty();
        let tokenizer = Tokenizer::default();
        let ctx = FactoryContext::new("parser", ComponentConfig::new(), &tokenizer);
        let err = registry.create("parser", ctx).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownFactory(name) if name == "parser"));
    }

    #[test]
    fn test_custom_factory_overrides() {
        let mut registry = FactoryRegistry::with_builtins();
        registry.register("ner", |ctx| Ok(MarkerComponent::boxed(ctx.name)));

        let tokenizer = Tokenizer::default();
        let ctx = FactoryContext::new("clinical_ner", ComponentConfig::new(), &tokenizer);
        let component = registry.create("ner", ctx).unwrap();
        assert_eq!(component.factory(), "marker");
        assert_eq!(component.config().get_str("origin"), Some("clinical_ner"));
    }
}
