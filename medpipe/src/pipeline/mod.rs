//! Pipeline composition: documents, components, merging and packages.
//!
//! A [`Pipeline`] is a tokenizer followed by uniquely named components. Source
//! pipelines come from [`PipelineProvider`]s, are combined with
//! [`merge_pipelines`], and are written and read back as on-disk packages.

mod component;
mod doc;
mod error;
mod language;
pub mod merge;
pub mod package;
pub mod provider;
pub mod registry;
mod tokenizer;

pub use component::*;
pub use doc::*;
pub use error::*;
pub use language::*;
pub use merge::{MergeReport, SkippedComponent, merge_pipelines};
pub use package::{ComponentSpec, PackageManifest, load_package};
pub use provider::{PackageProvider, PipelineProvider};
pub use registry::{FactoryContext, FactoryFn, FactoryRegistry};
pub use tokenizer::*;
