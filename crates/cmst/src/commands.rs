mod check;
mod deps;

use anyhow::Context;
use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Subcommand;
use cmst_conf::Settings;
use cmst_templates::TagSpecs;

use crate::args::Args;
use crate::exit::Exit;

pub trait Command {
    fn execute(&self, args: &Args) -> Result<Exit>;
}

#[derive(Debug, Subcommand)]
pub enum CmstCommand {
    /// Validate templates: recursion, syntax and missing dependencies
    Check(self::check::Check),
    /// Print every template a stored template depends on
    Deps(self::deps::Deps),
}

impl Command for CmstCommand {
    fn execute(&self, args: &Args) -> Result<Exit> {
        match self {
            CmstCommand::Check(command) => command.execute(args),
            CmstCommand::Deps(command) => command.execute(args),
        }
    }
}

/// Settings and tag specs for the project in the current directory.
struct Project {
    root: Utf8PathBuf,
    settings: Settings,
    specs: TagSpecs,
}

impl Project {
    fn load() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        let root = Utf8PathBuf::from_path_buf(cwd)
            .map_err(|_| anyhow::anyhow!("Current directory is not valid UTF-8"))?;
        let settings = Settings::new(root.as_std_path()).context("Failed to load settings")?;
        let specs = TagSpecs::load(&settings.tagspecs).context("Invalid tag specs in settings")?;
        tracing::debug!(root = %root, dirs = ?settings.template_dirs, "loaded project settings");
        Ok(Self {
            root,
            settings,
            specs,
        })
    }

    fn template_dirs(&self) -> Vec<Utf8PathBuf> {
        self.settings.resolved_template_dirs(&self.root)
    }

    fn diagnostics(&self, args: &Args) -> bool {
        self.settings.debug || args.global.debug
    }
}
