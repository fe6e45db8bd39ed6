//! Providers that hand out named source pipelines.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use super::language::Pipeline;
use super::package::load_package;
use super::registry::FactoryRegistry;
use crate::Result;

/// A source of named pipelines
#[async_trait]
pub trait PipelineProvider: Send + Sync + std::fmt::Debug {
    /// Name identifying this provider in logs
    fn name(&self) -> &str;

    /// Load the named pipeline, building components through `registry`
    async fn load(&self, pipeline: &str, registry: &FactoryRegistry) -> Result<Pipeline>;
}

/// Loads pipeline packages from subdirectories of a local root
#[derive(Debug, Clone)]
pub struct PackageProvider {
    name: String,
    root: PathBuf,
}

impl PackageProvider {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl PipelineProvider for PackageProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, pipeline: &str, registry: &FactoryRegistry) -> Result<Pipeline> {
        let dir = self.root.join(pipeline);
        debug!(provider = %self.name, package = %dir.display(), "Loading pipeline package");
        Ok(load_package(&dir, registry)?)
    }
}
