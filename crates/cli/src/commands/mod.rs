// CLI subcommand dispatch.

use std::path::Path;

use anyhow::Context;
use clap::Subcommand;
use docpatch_engine::{Document, EngineConfig};

use crate::exit_code::ExitCode;

pub mod apply;
pub mod locate;
pub mod project;
pub mod rewrite;

#[derive(Subcommand)]
pub enum Command {
    /// Apply a batch of structured edits to a document tree
    Apply(apply::ApplyArgs),
    /// Rewrite the text between two anchors, keeping marks where words survive
    Rewrite(rewrite::RewriteArgs),
    /// Show where a piece of text occurs and how a query resolves
    Locate(locate::LocateArgs),
    /// Print the flat text projection of a document
    Project(project::ProjectArgs),
}

pub fn run(cmd: Command, config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    match cmd {
        Command::Apply(args) => apply::run(args, config_path),
        Command::Rewrite(args) => rewrite::run(args, config_path),
        Command::Locate(args) => locate::run(args, config_path),
        Command::Project(args) => project::run(args),
    }
}

/// Explicit `--config` must load; the default location is best-effort.
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load_from(path)
            .with_context(|| format!("failed to load config `{}`", path.display())),
        None => Ok(EngineConfig::load()),
    }
}

pub(crate) fn read_document(path: &Path) -> anyhow::Result<Document> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read document `{}`", path.display()))?;
    Document::from_json_str(&json)
        .with_context(|| format!("invalid document `{}`", path.display()))
}

/// Writes the tree as pretty JSON to `path`.
pub(crate) fn write_tree(path: &Path, tree: &Document) -> anyhow::Result<()> {
    let mut json = serde_json::to_string_pretty(tree).context("failed to serialize tree")?;
    json.push('\n');
    std::fs::write(path, json)
        .with_context(|| format!("failed to write tree to `{}`", path.display()))
}
