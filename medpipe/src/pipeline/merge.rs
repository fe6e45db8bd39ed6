//! Merging several source pipelines into one with unique component names.

use serde::Serialize;
use tracing::{info, warn};

use super::language::{PipePosition, Pipeline};
use super::Result;

/// A component dropped because an earlier source already supplied its name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedComponent {
    /// Component name
    pub name: String,
    /// Pipeline the dropped copy came from
    pub source: String,
    /// Pipeline whose copy was kept
    pub kept_from: String,
}

/// Result of merging pipelines
#[derive(Debug)]
pub struct MergeReport {
    /// The merged pipeline
    pub pipeline: Pipeline,
    /// Components ignored because their name was already taken
    pub skipped: Vec<SkippedComponent>,
}

/// Merge source pipelines into a new pipeline for `lang`.
///
/// The merged pipeline takes the first source's tokenizer when that source
/// is in `lang`, otherwise a blank one. Components are moved out of the
/// sources in first-seen order. When a name appears in more than one source,
/// the first source's component is kept and later ones are dropped and
/// reported.
pub fn merge_pipelines<I>(lang: &str, sources: I) -> Result<MergeReport>
where
    I: IntoIterator<Item = Pipeline>,
{
    let mut merged = Pipeline::blank(lang);
    // component name -> source pipeline name
    let mut origins: Vec<(String, String)> = Vec::new();
    let mut skipped = Vec::new();

    for (index, source) in sources.into_iter().enumerate() {
        let source_name = source.name().to_string();
        if source.lang() != lang {
            warn!(
                source = %source_name,
                source_lang = source.lang(),
                target_lang = lang,
                "Merging pipeline with a different language"
            );
        } else if index == 0 {
            merged = merged.with_tokenizer(source.tokenizer().clone());
        }

        for (name, component) in source.into_components() {
            if let Some((_, kept_from)) = origins.iter().find(|(n, _)| *n == name) {
                warn!(
                    component = %name,
                    source = %source_name,
                    kept_from = %kept_from,
                    "Skipping duplicate component; first source wins"
                );
                skipped.push(SkippedComponent {
                    name,
                    source: source_name.clone(),
                    kept_from: kept_from.clone(),
                });
                continue;
            }

            merged.add_pipe(name.clone(), component, PipePosition::Last)?;
            origins.push((name, source_name.clone()));
        }
    }

    info!(
        components = ?merged.pipe_names(),
        skipped = skipped.len(),
        "Merged source pipelines"
    );

    Ok(MergeReport {
        pipeline: merged,
        skipped,
    })
}
