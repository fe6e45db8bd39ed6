//! Ordered, name-unique component pipelines.

use std::fmt;
use tracing::{debug, trace};

use super::component::{Component, ComponentConfig};
use super::doc::Doc;
use super::tokenizer::Tokenizer;
use super::{PipelineError, Result};

/// Where to insert a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipePosition {
    /// Append after every existing component
    Last,
    /// Insert before every existing component
    First,
    /// Insert immediately before the named component
    Before(String),
    /// Insert immediately after the named component
    After(String),
}

impl PipePosition {
    pub fn before(name: impl Into<String>) -> Self {
        Self::Before(name.into())
    }

    pub fn after(name: impl Into<String>) -> Self {
        Self::After(name.into())
    }
}

struct Pipe {
    name: String,
    component: Box<dyn Component>,
}

/// A tokenizer followed by an ordered sequence of uniquely named components
pub struct Pipeline {
    name: String,
    tokenizer: Tokenizer,
    pipes: Vec<Pipe>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("lang", &self.tokenizer.lang())
            .field("pipes", &self.pipe_names())
            .finish()
    }
}

impl Pipeline {
    /// Create a pipeline with a tokenizer and no components
    pub fn blank(lang: impl Into<String>) -> Self {
        let lang = lang.into();
        Self {
            name: format!("blank_{}", lang),
            tokenizer: Tokenizer::new(lang),
            pipes: Vec::new(),
        }
    }

    /// Set the pipeline name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the tokenizer
    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lang(&self) -> &str {
        self.tokenizer.lang()
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Component names in execution order
    pub fn pipe_names(&self) -> Vec<&str> {
        self.pipes.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn has_pipe(&self, name: &str) -> bool {
        self.pipes.iter().any(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.pipes
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| self.not_found(name))
    }

    fn not_found(&self, name: &str) -> PipelineError {
        PipelineError::ComponentNotFound {
            name: name.to_string(),
            available: self.pipe_names().into_iter().map(String::from).collect(),
        }
    }

    /// Insert a component under a unique name
    pub fn add_pipe(
        &mut self,
        name: impl Into<String>,
        component: Box<dyn Component>,
        position: PipePosition,
    ) -> Result<()> {
        let name = name.into();
        if self.has_pipe(&name) {
            return Err(PipelineError::DuplicateComponent(name));
        }

        let index = match &position {
            PipePosition::Last => self.pipes.len(),
            PipePosition::First => 0,
            PipePosition::Before(anchor) => self.index_of(anchor)?,
            PipePosition::After(anchor) => self.index_of(anchor)? + 1,
        };

        debug!(
            pipeline = %self.name,
            component = %name,
            factory = component.factory(),
            index,
            "Adding pipeline component"
        );
        self.pipes.insert(index, Pipe { name, component });
        Ok(())
    }

    /// Remove a component and hand it back to the caller
    pub fn remove_pipe(&mut self, name: &str) -> Result<Box<dyn Component>> {
        let index = self.index_of(name)?;
        Ok(self.pipes.remove(index).component)
    }

    pub fn get_pipe(&self, name: &str) -> Option<&dyn Component> {
        self.pipes
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.component.as_ref())
    }

    pub fn get_pipe_mut(&mut self, name: &str) -> Option<&mut (dyn Component + 'static)> {
        for pipe in &mut self.pipes {
            if pipe.name == name {
                return Some(pipe.component.as_mut());
            }
        }
        None
    }

    /// Edit the config of a named component in place
    pub fn configure<F>(&mut self, name: &str, edit: F) -> Result<()>
    where
        F: FnOnce(&mut ComponentConfig),
    {
        let index = self.index_of(name)?;
        edit(self.pipes[index].component.config_mut());
        Ok(())
    }

    /// Iterate over `(name, component)` pairs in execution order
    pub fn components(&self) -> impl Iterator<Item = (&str, &dyn Component)> {
        self.pipes
            .iter()
            .map(|p| (p.name.as_str(), p.component.as_ref()))
    }

    /// Tokenize the text and run every component over it in order
    pub fn process(&self, text: &str) -> Result<Doc> {
        let mut doc = self.tokenizer.tokenize(text);
        for pipe in &self.pipes {
            trace!(component = %pipe.name, "Running component");
            pipe.component.process(&mut doc)?;
        }
        Ok(doc)
    }

    /// Consume the pipeline, yielding its components in order
    pub fn into_components(self) -> Vec<(String, Box<dyn Component>)> {
        self.pipes
            .into_iter()
            .map(|p| (p.name, p.component))
            .collect()
    }
}
