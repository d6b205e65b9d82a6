use std::io::IsTerminal;
use std::io::Read as _;

use anyhow::Context;
use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use cmst_analysis::DirectoryStore;
use cmst_analysis::TemplateValidator;

use crate::args::Args;
use crate::commands::Command;
use crate::commands::Project;
use crate::exit::Exit;

const STDIN_NAME: &str = "<stdin>";

#[derive(Debug, Parser)]
pub struct Check {
    /// Files or directories to check, or `-` for stdin. If omitted, checks
    /// every template in the configured template directories.
    paths: Vec<Utf8PathBuf>,
}

/// A template to validate: its name in the store and where it was read from.
struct Candidate {
    name: String,
    path: Utf8PathBuf,
}

impl Command for Check {
    fn execute(&self, args: &Args) -> Result<Exit> {
        let project = Project::load()?;
        let store = DirectoryStore::new(project.template_dirs());
        let validator = TemplateValidator::new(&store, &project.specs)
            .with_diagnostics(project.diagnostics(args));

        let reading_stdin = self.paths.iter().any(|path| path.as_str() == "-")
            || (self.paths.is_empty() && !std::io::stdin().is_terminal());

        if reading_stdin {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("Failed to read stdin")?;
            return Ok(match validator.validate(STDIN_NAME, &source) {
                Ok(_) => Exit::success(),
                Err(error) => {
                    if !args.global.quiet {
                        println!("{STDIN_NAME}: {error}");
                    }
                    Exit::error().with_message("Found 1 error.")
                }
            });
        }

        let candidates = discover(&self.paths, &project, &store);
        tracing::info!(count = candidates.len(), "checking templates");

        let mut error_count: usize = 0;
        for candidate in &candidates {
            let message = match std::fs::read(&candidate.path) {
                Err(err) => Some(format!("Failed to read file: {err}")),
                Ok(bytes) => match String::from_utf8(bytes) {
                    Err(_) => Some(format!("Template {} is not valid UTF-8.", candidate.name)),
                    Ok(source) => validator
                        .validate(&candidate.name, &source)
                        .err()
                        .map(|error| error.to_string()),
                },
            };
            if let Some(message) = message {
                error_count += 1;
                if !args.global.quiet {
                    println!("{}: {message}", candidate.path);
                }
            }
        }

        if error_count > 0 {
            let (error_word, file_word) = if error_count == 1 {
                ("error", "file")
            } else {
                ("errors", "files")
            };
            Ok(Exit::error().with_message(format!(
                "Found {error_count} {error_word} in {error_count} {file_word}."
            )))
        } else {
            Ok(Exit::success())
        }
    }
}

fn discover(paths: &[Utf8PathBuf], project: &Project, store: &DirectoryStore) -> Vec<Candidate> {
    let extensions = &project.settings.extensions;

    if paths.is_empty() {
        return store
            .templates(extensions)
            .into_iter()
            .filter_map(|name| {
                let path = store.resolve(&name)?;
                Some(Candidate { name, path })
            })
            .collect();
    }

    let mut candidates = Vec::new();
    for path in paths {
        let path = if path.is_relative() {
            project.root.join(path)
        } else {
            path.clone()
        };

        if path.is_dir() {
            let tree = DirectoryStore::new(vec![path.clone()]);
            for relative in tree.templates(extensions) {
                let file = path.join(&relative);
                candidates.push(candidate(file, store));
            }
        } else if path.is_file() {
            candidates.push(candidate(path, store));
        } else {
            tracing::warn!(path = %path, "no such file or directory");
        }
    }
    candidates
}

/// Name a file the way the store would, falling back to its path.
fn candidate(path: Utf8PathBuf, store: &DirectoryStore) -> Candidate {
    let name = store
        .name_of(&path)
        .unwrap_or_else(|| path.as_str().to_string());
    Candidate { name, path }
}
