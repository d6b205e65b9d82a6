//! The checks a template has to pass before new content can be saved.

use std::collections::BTreeSet;

use cmst_templates::CompileOptions;
use cmst_templates::SyntaxError;
use cmst_templates::TagSpecs;
use thiserror::Error;

use crate::error::AnalysisError;
use crate::extract::extract_references;
use crate::loader::TemplateLoader;
use crate::recursion::validate_no_cycles;
use crate::recursion::CycleError;
use crate::store::TemplateStore;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Infinite template recursivity: {}", .error.describe(.template))]
    InfiniteRecursion { template: String, error: CycleError },

    #[error("Syntax error in template {template} or in the templates that depend on it: {error}.")]
    Syntax {
        template: String,
        /// The template whose source failed to compile.
        failing: String,
        error: SyntaxError,
    },

    #[error("Template {template} is not valid UTF-8.")]
    Encoding { template: String },

    #[error("Template: {missing} not found.")]
    NotFound { missing: String },

    #[error(
        "Template {template} depends on template {missing}. Template {missing} does not exist. \
         Create it or remove its reference from the template code."
    )]
    MissingTemplateUse { template: String, missing: String },

    #[error("Failed to read template {template}: {source}")]
    Io {
        template: String,
        #[source]
        source: std::io::Error,
    },
}

/// Validates proposed template content against the templates in a store.
pub struct TemplateValidator<'s> {
    store: &'s dyn TemplateStore,
    specs: &'s TagSpecs,
    diagnostics: bool,
}

impl<'s> TemplateValidator<'s> {
    pub fn new(store: &'s dyn TemplateStore, specs: &'s TagSpecs) -> Self {
        Self {
            store,
            specs,
            diagnostics: false,
        }
    }

    /// Attach line and column detail to syntax errors.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Check that `content` can be saved as `name`, returning every template
    /// it uses.
    ///
    /// Cycles are looked for first, then the content and everything it
    /// reaches is compiled, then every used template has to exist.
    pub fn validate(&self, name: &str, content: &str) -> Result<BTreeSet<String>, ValidationError> {
        validate_no_cycles(name, content, self.store).map_err(|error| {
            ValidationError::InfiniteRecursion {
                template: name.to_string(),
                error,
            }
        })?;

        let options = CompileOptions {
            diagnostics: self.diagnostics,
        };
        let mut loader = TemplateLoader::new(self.store, self.specs, options);
        let references = loader
            .compile(name, content.as_bytes())
            .and_then(|template| extract_references(&mut loader, &template))
            .map_err(|error| self.classify(name, error))?;

        let used: BTreeSet<String> = references
            .into_iter()
            .map(|reference| reference.callee)
            .collect();

        if let Some(missing) = used.iter().find(|used| !self.store.exists(used)) {
            return Err(ValidationError::MissingTemplateUse {
                template: name.to_string(),
                missing: missing.clone(),
            });
        }

        tracing::debug!(template = name, used = used.len(), "template is valid");
        Ok(used)
    }

    fn classify(&self, name: &str, error: AnalysisError) -> ValidationError {
        match error {
            AnalysisError::Syntax { template, error } => ValidationError::Syntax {
                template: name.to_string(),
                failing: template,
                error,
            },
            AnalysisError::Encoding { template } => ValidationError::Encoding { template },
            // the loader could not read a template the store claims to have
            AnalysisError::TemplateNotFound { name: missing } if self.store.exists(&missing) => {
                ValidationError::NotFound { missing }
            }
            AnalysisError::TemplateNotFound { name: missing } => {
                ValidationError::MissingTemplateUse {
                    template: name.to_string(),
                    missing,
                }
            }
            AnalysisError::Io { template, source } => ValidationError::Io { template, source },
        }
    }
}
