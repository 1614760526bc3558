use super::Stage;
use crate::error::{HanaError, Result};
use crate::plugins::{FrontMatter, Ignore, Metadata};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Builds a stage from the `options` value of a plugin entry.
pub type StageFactory = Box<dyn Fn(&Value) -> Result<Box<dyn Stage>>>;

/// Plugin name -> stage factory lookup used when assembling a pipeline
/// from configuration.
#[derive(Default)]
pub struct StageRegistry {
    factories: BTreeMap<String, StageFactory>,
}

impl StageRegistry {
    pub fn new() -> Self {
        StageRegistry::default()
    }

    /// A registry holding `metadata`, `front_matter` and `ignore`.
    pub fn with_builtins() -> Self {
        let mut registry = StageRegistry::new();
        registry.register("metadata", |options| {
            Ok(Box::new(Metadata::new(mapping_option("metadata", options)?)))
        });
        registry.register("front_matter", |_| Ok(Box::new(FrontMatter)));
        registry.register("ignore", |options| {
            Ok(Box::new(Ignore::new(string_list("ignore", options)?)?))
        });
        registry
    }

    /// Register (or replace) the factory for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Result<Box<dyn Stage>> + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn create(&self, name: &str, options: &Value) -> Result<Box<dyn Stage>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| HanaError::PluginNotFound(name.to_string()))?;
        log::debug!("Creating stage from plugin {name}");
        factory(options)
    }
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

fn mapping_option(plugin: &str, options: &Value) -> Result<Mapping> {
    match options {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping.clone()),
        other => Err(HanaError::Config(format!(
            "plugin '{plugin}' expects a mapping of options, got {}",
            crate::util::type_name(other)
        ))),
    }
}

fn string_list(plugin: &str, options: &Value) -> Result<Vec<String>> {
    match options {
        Value::Null => Ok(Vec::new()),
        Value::String(single) => Ok(vec![single.clone()]),
        Value::Sequence(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(HanaError::Config(format!(
                    "plugin '{plugin}' expects a list of patterns, found {}",
                    crate::util::type_name(other)
                ))),
            })
            .collect(),
        other => Err(HanaError::Config(format!(
            "plugin '{plugin}' expects a list of patterns, got {}",
            crate::util::type_name(other)
        ))),
    }
}
