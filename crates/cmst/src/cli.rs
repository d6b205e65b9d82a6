use std::ffi::OsString;

use anyhow::Result;
use clap::Parser;

use crate::args::Args;
use crate::commands::CmstCommand;
use crate::commands::Command;
use crate::exit::Exit;

/// Static checks for Django CMS templates: recursion, syntax and missing
/// dependencies.
#[derive(Parser)]
#[command(name = "cmst")]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CmstCommand,

    #[command(flatten)]
    pub args: Args,
}

/// Parse CLI arguments and execute the chosen command
pub fn run<I, T>(args: I) -> Result<Exit>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args).unwrap_or_else(|e| {
        e.exit();
    });

    crate::logging::init(&cli.args.global);

    cli.command.execute(&cli.args)
}
