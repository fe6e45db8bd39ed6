//! On-disk pipeline packages.
//!
//! A package is a directory with a `pipeline.json` manifest listing the
//! language and the ordered components (name, factory, config), plus one
//! data directory per component that has data files:
//!
//! ```text
//! en_core_web_lg/
//! ├── pipeline.json
//! ├── tok2vec/vectors.json
//! └── icd_ruler/patterns.jsonl
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::component::ComponentConfig;
use super::language::{PipePosition, Pipeline};
use super::registry::{FactoryContext, FactoryRegistry};
use super::{PipelineError, Result};

/// Manifest file name inside a package directory
pub const MANIFEST_FILE: &str = "pipeline.json";

/// One component entry in a package manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentSpec {
    pub name: String,
    pub factory: String,
    #[serde(default)]
    pub config: ComponentConfig,
}

/// Package manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageManifest {
    pub lang: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
}

impl PackageManifest {
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(PipelineError::package(format!(
                "manifest not found: {}",
                path.display()
            )));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Load a pipeline package, building every component through the registry
pub fn load_package(dir: &Path, registry: &FactoryRegistry) -> Result<Pipeline> {
    let manifest = PackageManifest::read(dir)?;
    let mut pipeline = Pipeline::blank(&manifest.lang).with_name(&manifest.name);

    for spec in manifest.components {
        let data_dir = dir.join(&spec.name);
        let component = {
            let mut ctx = FactoryContext::new(&spec.name, spec.config, pipeline.tokenizer());
            if data_dir.is_dir() {
                ctx = ctx.with_data_dir(&data_dir);
            }
            registry.create(&spec.factory, ctx)?
        };
        pipeline.add_pipe(spec.name, component, PipePosition::Last)?;
    }

    info!(
        package = %dir.display(),
        pipeline = pipeline.name(),
        components = ?pipeline.pipe_names(),
        "Loaded pipeline package"
    );
    Ok(pipeline)
}

impl Pipeline {
    /// Manifest describing this pipeline's current components and configs
    pub fn manifest(&self) -> PackageManifest {
        PackageManifest {
            lang: self.lang().to_string(),
            name: self.name().to_string(),
            version: Some(crate::VERSION.to_string()),
            components: self
                .components()
                .map(|(name, component)| ComponentSpec {
                    name: name.to_string(),
                    factory: component.factory().to_string(),
                    config: component.config().clone(),
                })
                .collect(),
        }
    }

    /// Write the pipeline as a package into `dir`.
    ///
    /// Each component's data directory is cleared first, so files left by an
    /// earlier package in the same place never reach a later load.
    pub fn to_disk(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        for (name, component) in self.components() {
            let data_dir = dir.join(name);
            if data_dir.is_dir() {
                fs::remove_dir_all(&data_dir)?;
            } else if data_dir.exists() {
                fs::remove_file(&data_dir)?;
            }
            component.to_disk(&data_dir)?;
        }

        let manifest = serde_json::to_string_pretty(&self.manifest())?;
        fs::write(dir.join(MANIFEST_FILE), manifest)?;
        debug!(package = %dir.display(), "Wrote pipeline package");
        Ok(())
    }
}
