use std::io;
use std::sync::Arc;

use cmst_templates::compile;
use cmst_templates::CompileOptions;
use cmst_templates::TagSpecs;
use cmst_templates::Template;
use rustc_hash::FxHashMap;

use crate::error::AnalysisError;
use crate::store::TemplateStore;

/// Compiles templates out of a store, memoising each name for the lifetime
/// of the loader.
pub struct TemplateLoader<'s> {
    store: &'s dyn TemplateStore,
    specs: &'s TagSpecs,
    options: CompileOptions,
    cache: FxHashMap<String, Arc<Template>>,
}

impl<'s> TemplateLoader<'s> {
    pub fn new(store: &'s dyn TemplateStore, specs: &'s TagSpecs, options: CompileOptions) -> Self {
        Self {
            store,
            specs,
            options,
            cache: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &'s dyn TemplateStore {
        self.store
    }

    pub fn load(&mut self, name: &str) -> Result<Arc<Template>, AnalysisError> {
        if let Some(template) = self.cache.get(name) {
            tracing::debug!(template = name, "using memoised template");
            return Ok(Arc::clone(template));
        }

        let bytes = self.store.read(name).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                AnalysisError::TemplateNotFound {
                    name: name.to_string(),
                }
            } else {
                AnalysisError::Io {
                    template: name.to_string(),
                    source,
                }
            }
        })?;

        let template = Arc::new(self.compile(name, &bytes)?);
        self.cache.insert(name.to_string(), Arc::clone(&template));
        Ok(template)
    }

    /// Compile content that did not come from the store.
    pub fn compile(&self, name: &str, bytes: &[u8]) -> Result<Template, AnalysisError> {
        let source = std::str::from_utf8(bytes).map_err(|_| AnalysisError::Encoding {
            template: name.to_string(),
        })?;
        compile(name, source, self.options, self.specs).map_err(|error| AnalysisError::Syntax {
            template: name.to_string(),
            error,
        })
    }
}
