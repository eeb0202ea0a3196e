// `docpatch locate`: list candidates for a query and show how it resolves.

use std::path::{Path, PathBuf};

use clap::Args;
use docpatch_engine::edit::EditError;
use docpatch_engine::locate::{self, Occurrence};
use docpatch_engine::tree::project;
use docpatch_engine::{LocatorQuery, SkipReason, Span};
use serde::Serialize;
use tracing::debug;

use super::{load_config, read_document};
use crate::exit_code::ExitCode;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct LocateArgs {
    /// Document tree (JSON).
    #[arg(long)]
    pub doc: PathBuf,

    /// Literal text to look for.
    #[arg(long)]
    pub text: String,

    /// Text that must appear shortly before the match.
    #[arg(long)]
    pub context_before: Option<String>,

    /// Text that must appear shortly after the match.
    #[arg(long)]
    pub context_after: Option<String>,

    /// 1-based occurrence to select.
    #[arg(long)]
    pub occurrence: Option<usize>,

    /// Select up to this many occurrences instead of refusing when ambiguous.
    #[arg(long)]
    pub max_occurrences: Option<usize>,

    /// Force JSON output.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocateReport {
    pub query: LocatorQuery,
    pub occurrences: Vec<Occurrence>,
    pub resolution: Resolution,
}

/// What an edit carrying this query would target.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Resolved { spans: Vec<Span> },
    Unresolved { reason: SkipReason, message: String },
}

pub fn run(args: LocateArgs, config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let format = OutputFormat::detect(args.json);

    match execute(&args, config_path) {
        Ok(report) => {
            output::print_output(format, &report, format_human)?;
            Ok(match report.resolution {
                Resolution::Resolved { .. } => ExitCode::Success,
                Resolution::Unresolved { .. } => ExitCode::Partial,
            })
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

fn execute(args: &LocateArgs, config_path: Option<&Path>) -> anyhow::Result<LocateReport> {
    let config = load_config(config_path)?;
    let doc = read_document(&args.doc)?;
    let query = LocatorQuery {
        literal: args.text.clone(),
        context_before: args.context_before.clone(),
        context_after: args.context_after.clone(),
        occurrence_index: args.occurrence,
        max_occurrences: args.max_occurrences,
    };
    debug!(doc = %args.doc.display(), ?query, "locating text");

    let projection = project(&doc);
    let resolution = match locate::locate(&projection, &query, &config) {
        Ok(located) => Resolution::Resolved { spans: located.into_spans() },
        Err(error) => {
            let message = error.to_string();
            Resolution::Unresolved { reason: EditError::from(error).reason(), message }
        }
    };
    let occurrences = locate::describe_occurrences(&projection, &query, &config).unwrap_or_default();

    Ok(LocateReport { query, occurrences, resolution })
}

fn format_human(report: &LocateReport) -> String {
    let mut lines = vec![format!(
        "{} candidate(s) for {:?}",
        report.occurrences.len(),
        report.query.literal
    )];

    for occurrence in &report.occurrences {
        lines.push(format!(
            "  #{} at {}..{} in block {}: …{}[{}]{}…",
            occurrence.index,
            occurrence.span.start,
            occurrence.span.end,
            occurrence.block_path,
            occurrence.before,
            report.query.literal,
            occurrence.after
        ));
    }

    match &report.resolution {
        Resolution::Resolved { spans } => {
            let ranges: Vec<String> =
                spans.iter().map(|span| format!("{}..{}", span.start, span.end)).collect();
            lines.push(format!("Resolves to {}", ranges.join(", ")));
        }
        Resolution::Unresolved { reason, message } => {
            lines.push(format!("Unresolved [{reason}]: {message}"));
        }
    }
    lines.join("\n")
}
