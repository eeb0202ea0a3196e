// docpatch CLI entry point.

use std::path::PathBuf;
use std::process;

use clap::Parser;

mod commands;
mod exit_code;
mod output;

use exit_code::ExitCode;

#[derive(Parser)]
#[command(name = "docpatch", about = "Structured edits for rich-text document trees")]
struct Cli {
    /// Engine config (TOML). Defaults to ~/.docpatch/config.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match commands::run(cli.command, cli.config.as_deref()) {
        Ok(code) => code.into(),
        Err(error) => ExitCode::from_error(&error).into(),
    }
}
