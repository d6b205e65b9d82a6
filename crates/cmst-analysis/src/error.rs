use std::io;

use cmst_templates::SyntaxError;
use thiserror::Error;

/// Failure to turn a template name into a compiled template.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Template {name} does not exist")]
    TemplateNotFound { name: String },

    #[error("{template}: {error}")]
    Syntax { template: String, error: SyntaxError },

    #[error("Template {template} is not valid UTF-8")]
    Encoding { template: String },

    #[error("Failed to read template {template}")]
    Io {
        template: String,
        #[source]
        source: io::Error,
    },
}

impl AnalysisError {
    /// The template the error is about.
    #[must_use]
    pub fn template(&self) -> &str {
        match self {
            AnalysisError::TemplateNotFound { name } => name,
            AnalysisError::Syntax { template, .. }
            | AnalysisError::Encoding { template }
            | AnalysisError::Io { template, .. } => template,
        }
    }
}
