//! Building the combined pipeline.
//!
//! Sources are loaded through their providers, merged first-source-wins,
//! the vectorizer's static vectors are switched off, and the rulers are
//! inserted as a chain in front of the recognizer. Everything happens on a
//! pipeline owned by this module, which is returned only once complete.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::components::{ENTITY_RULER, INCLUDE_STATIC_VECTORS};
use crate::config::{MedpipeConfig, PipelineConfig, ProviderConfig, RulerConfig, SourcesConfig};
use crate::pipeline::{
    ComponentConfig, FactoryContext, FactoryRegistry, PackageProvider, PipePosition, Pipeline,
    PipelineProvider, SkippedComponent, merge_pipelines,
};
use crate::tracking::{Tracker, TrackingProvider};
use crate::{MedpipeError, Result};

/// Outcome of [`build_combined_pipeline`]
#[derive(Debug)]
pub struct BuildReport {
    /// The finished pipeline
    pub pipeline: Pipeline,
    /// Components dropped during the merge
    pub skipped: Vec<SkippedComponent>,
    /// Rulers inserted by this build; rulers already present are not listed
    pub rulers_added: Vec<String>,
    /// Whether the vectorizer's static vectors were switched off
    pub static_vectors_disabled: bool,
}

/// Serializable summary of a build
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub name: String,
    pub lang: String,
    pub components: Vec<String>,
    pub skipped: Vec<SkippedComponent>,
    pub rulers_added: Vec<String>,
    pub static_vectors_disabled: bool,
}

impl BuildReport {
    pub fn summary(&self) -> BuildSummary {
        BuildSummary {
            name: self.pipeline.name().to_string(),
            lang: self.pipeline.lang().to_string(),
            components: self
                .pipeline
                .pipe_names()
                .into_iter()
                .map(String::from)
                .collect(),
            skipped: self.skipped.clone(),
            rulers_added: self.rulers_added.clone(),
            static_vectors_disabled: self.static_vectors_disabled,
        }
    }
}

/// Provider for one configured source
fn provider_for(
    provider: &ProviderConfig,
    tracker: Option<&Arc<dyn Tracker>>,
) -> Result<Box<dyn PipelineProvider>> {
    match provider {
        ProviderConfig::Package { root } => Ok(Box::new(PackageProvider::new("package", root))),
        ProviderConfig::Tracking => {
            let tracker = tracker.ok_or_else(|| {
                MedpipeError::Configuration(
                    "tracked source pipelines need a tracking backend".to_string(),
                )
            })?;
            Ok(Box::new(TrackingProvider::new("tracking", Arc::clone(tracker))))
        }
    }
}

/// Load every configured source pipeline, in order
pub async fn load_sources(
    sources: &SourcesConfig,
    tracker: Option<&Arc<dyn Tracker>>,
    registry: &FactoryRegistry,
) -> Result<Vec<Pipeline>> {
    let mut pipelines = Vec::with_capacity(sources.0.len());
    for source in &sources.0 {
        let provider = provider_for(&source.provider, tracker)?;
        info!(
            provider = provider.name(),
            pipeline = %source.pipeline,
            "Loading source pipeline"
        );
        pipelines.push(provider.load(&source.pipeline, registry).await?);
    }
    Ok(pipelines)
}

/// Merge `sources`, disable static vectors and insert the rulers.
///
/// The first ruler goes immediately before the recognizer (or last if the
/// merged pipeline has none); each further ruler goes immediately after the
/// previous one. Rulers whose name is already present are left alone.
pub fn build_combined_pipeline(
    sources: Vec<Pipeline>,
    config: &PipelineConfig,
    rulers: &[RulerConfig],
    registry: &FactoryRegistry,
) -> Result<BuildReport> {
    let merged = merge_pipelines(&config.language, sources)?;
    let mut pipeline = merged.pipeline.with_name(&config.name);

    let static_vectors_disabled = config.disable_static_vectors
        && disable_static_vectors(&mut pipeline, &config.vectorizer)?;

    let rulers_added = insert_rulers(&mut pipeline, rulers, &config.recognizer, registry)?;

    info!(
        pipeline = pipeline.name(),
        components = ?pipeline.pipe_names(),
        skipped = merged.skipped.len(),
        "Built combined pipeline"
    );

    Ok(BuildReport {
        pipeline,
        skipped: merged.skipped,
        rulers_added,
        static_vectors_disabled,
    })
}

/// Load the configured sources and build the combined pipeline
pub async fn build_from_config(
    config: &MedpipeConfig,
    tracker: Option<&Arc<dyn Tracker>>,
    registry: &FactoryRegistry,
) -> Result<BuildReport> {
    let sources = load_sources(&config.sources, tracker, registry).await?;
    build_combined_pipeline(sources, &config.pipeline, &config.rulers.0, registry)
}

fn disable_static_vectors(pipeline: &mut Pipeline, vectorizer: &str) -> Result<bool> {
    if !pipeline.has_pipe(vectorizer) {
        debug!(vectorizer, "No vectorizer in pipeline, static vectors untouched");
        return Ok(false);
    }
    pipeline.configure(vectorizer, |cfg| {
        cfg.set(INCLUDE_STATIC_VECTORS, false);
    })?;
    info!(vectorizer, "Disabled static vectors");
    Ok(true)
}

fn insert_rulers(
    pipeline: &mut Pipeline,
    rulers: &[RulerConfig],
    recognizer: &str,
    registry: &FactoryRegistry,
) -> Result<Vec<String>> {
    let mut added = Vec::new();
    let mut previous: Option<&str> = None;

    for ruler in rulers {
        if pipeline.has_pipe(&ruler.name) {
            debug!(ruler = %ruler.name, "Ruler already in pipeline");
            previous = Some(ruler.name.as_str());
            continue;
        }

        let position = match previous {
            Some(prev) => PipePosition::after(prev),
            None if pipeline.has_pipe(recognizer) => PipePosition::before(recognizer),
            None => {
                warn!(
                    recognizer,
                    ruler = %ruler.name,
                    "Recognizer not in pipeline, appending ruler"
                );
                PipePosition::Last
            }
        };

        let config = ComponentConfig::new()
            .with("patterns_path", ruler.patterns_path.display().to_string())
            .with("validate", ruler.validate)
            .with("overwrite_ents", ruler.overwrite_ents)
            .with("phrase_matcher_attr", ruler.phrase_matcher_attr.as_str());
        let component = registry.create(
            ENTITY_RULER,
            FactoryContext::new(&ruler.name, config, pipeline.tokenizer()),
        )?;
        pipeline.add_pipe(ruler.name.clone(), component, position)?;

        added.push(ruler.name.clone());
        previous = Some(ruler.name.as_str());
    }

    Ok(added)
}
