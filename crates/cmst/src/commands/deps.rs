use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use cmst_analysis::extract_references;
use cmst_analysis::DirectoryStore;
use cmst_analysis::TemplateLoader;
use cmst_templates::CompileOptions;

use crate::args::Args;
use crate::commands::Command;
use crate::commands::Project;
use crate::exit::Exit;

#[derive(Debug, Parser)]
pub struct Deps {
    /// Template name, relative to a template directory.
    name: String,
}

impl Command for Deps {
    fn execute(&self, args: &Args) -> Result<Exit> {
        let project = Project::load()?;
        let store = DirectoryStore::new(project.template_dirs());
        let options = CompileOptions {
            diagnostics: project.diagnostics(args),
        };
        let mut loader = TemplateLoader::new(&store, &project.specs, options);

        let references = loader
            .load(&self.name)
            .and_then(|template| extract_references(&mut loader, &template))
            .with_context(|| format!("Failed to analyse template {}", self.name))?;

        for reference in &references {
            println!("{reference}");
        }
        Ok(Exit::success())
    }
}
