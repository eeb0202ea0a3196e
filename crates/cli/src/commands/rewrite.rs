// `docpatch rewrite`: rewrite an anchor-bounded section to new text.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use docpatch_engine::{AnchorPair, PatchEngine, PatchResult};
use serde::Serialize;
use tracing::debug;

use super::{load_config, read_document, write_tree};
use crate::exit_code::ExitCode;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct RewriteArgs {
    /// Document tree (JSON).
    #[arg(long)]
    pub doc: PathBuf,

    /// Region starts right after this text. Omit to start at the document start.
    #[arg(long)]
    pub after: Option<String>,

    /// Region ends right before this text. Omit to run to the document end.
    #[arg(long)]
    pub before: Option<String>,

    /// 1-based occurrence for both anchors.
    #[arg(long)]
    pub occurrence: Option<usize>,

    /// 1-based occurrence of the `--after` anchor.
    #[arg(long)]
    pub after_occurrence: Option<usize>,

    /// 1-based occurrence of the `--before` anchor.
    #[arg(long)]
    pub before_occurrence: Option<usize>,

    #[command(flatten)]
    pub target: TargetSource,

    /// Write the rewritten tree here instead of printing it.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Force JSON output.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct TargetSource {
    /// New text for the region. Newlines separate paragraphs.
    #[arg(long)]
    pub target: Option<String>,

    /// Read the new region text from a file.
    #[arg(long)]
    pub target_file: Option<PathBuf>,

    /// Print the current region text instead of rewriting it.
    #[arg(long)]
    pub print_region: bool,
}

#[derive(Debug, Serialize)]
struct RegionOutput {
    region: String,
}

pub fn run(args: RewriteArgs, config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let format = OutputFormat::detect(args.json);

    if args.target.print_region {
        return match region(&args, config_path) {
            Ok(region) => {
                output::print_output(format, &region, |r| r.region.clone())?;
                Ok(ExitCode::Success)
            }
            Err(e) => {
                output::print_anyhow_error(format, &e);
                Err(e)
            }
        };
    }

    match execute(&args, config_path) {
        Ok(result) => {
            let out = args.out.as_deref();
            output::print_output(format, &result, |r| format_human(r, out))?;
            Ok(ExitCode::Success)
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

fn anchors(args: &RewriteArgs) -> AnchorPair {
    AnchorPair {
        after_text: args.after.clone(),
        before_text: args.before.clone(),
        occurrence_index: args.occurrence,
        after_occurrence: args.after_occurrence,
        before_occurrence: args.before_occurrence,
    }
}

fn region(args: &RewriteArgs, config_path: Option<&Path>) -> anyhow::Result<RegionOutput> {
    let engine = PatchEngine::new(load_config(config_path)?);
    let doc = read_document(&args.doc)?;
    let region = engine
        .region_text(&doc, &anchors(args))
        .with_context(|| format!("cannot resolve region in `{}`", args.doc.display()))?;
    Ok(RegionOutput { region })
}

fn execute(args: &RewriteArgs, config_path: Option<&Path>) -> anyhow::Result<PatchResult> {
    let target = match (&args.target.target, &args.target.target_file) {
        (Some(text), _) => text.clone(),
        (_, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read target file `{}`", path.display()))?,
        (None, None) => anyhow::bail!("either --target or --target-file is required"),
    };

    let engine = PatchEngine::new(load_config(config_path)?);
    let doc = read_document(&args.doc)?;
    let anchors = anchors(args);
    debug!(doc = %args.doc.display(), ?anchors, target_len = target.len(), "rewriting section");

    let result = engine
        .rewrite_section(&doc, &anchors, &target)
        .with_context(|| format!("rewrite of `{}` failed", args.doc.display()))?;

    if let Some(out) = &args.out {
        write_tree(out, &result.tree)?;
    }
    Ok(result)
}

fn format_human(result: &PatchResult, out: Option<&Path>) -> String {
    let mut lines = Vec::new();
    match result.diff {
        Some(diff) if diff.changed_runs == 0 => {
            lines.push("Region already matches; tree unchanged".to_string())
        }
        Some(diff) => lines.push(format!(
            "Rewrote region: {} kept, {} removed, {} added token(s)",
            diff.equal_tokens, diff.deleted_tokens, diff.inserted_tokens
        )),
        None => lines.push("Rewrote region".to_string()),
    }

    match out {
        Some(path) => lines.push(format!("Tree written to {}", path.display())),
        None => lines.push(
            serde_json::to_string_pretty(&result.tree)
                .unwrap_or_else(|e| format!("<unserializable tree: {e}>")),
        ),
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpatch_engine::{Block, Document, Mark, MarkSet, TextRun};

    fn fixture(dir: &Path) -> PathBuf {
        let path = dir.join("doc.json");
        let tree = Document::new(vec![
            Block::heading(2, "Facts"),
            Block::Paragraph {
                content: vec![
                    TextRun::plain("The "),
                    TextRun::new("Buyer", MarkSet::from([Mark::Bold])),
                    TextRun::plain(" paid in full."),
                ],
            },
            Block::heading(2, "Relief"),
        ]);
        write_tree(&path, &tree).unwrap();
        path
    }

    fn args(doc: PathBuf, target: TargetSource) -> RewriteArgs {
        RewriteArgs {
            doc,
            after: Some("Facts".into()),
            before: Some("Relief".into()),
            occurrence: None,
            after_occurrence: None,
            before_occurrence: None,
            target,
            out: None,
            json: true,
        }
    }

    fn inline(text: &str) -> TargetSource {
        TargetSource { target: Some(text.into()), target_file: None, print_region: false }
    }

    #[test]
    fn rewrite_keeps_marks_on_surviving_words() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(fixture(dir.path()), inline("\nThe Buyer paid half.\n"));

        let result = execute(&args, None).unwrap();
        let runs = result.tree.content[1].runs().unwrap();
        assert_eq!(runs[1], TextRun::new("Buyer", MarkSet::from([Mark::Bold])));
        assert_eq!(result.tree.content[1].text(), "The Buyer paid half.");
        assert!(format_human(&result, None).starts_with("Rewrote region: "));
    }

    #[test]
    fn target_file_and_out_path() {
        let dir = tempfile::tempdir().unwrap();
        let target_path = dir.path().join("target.txt");
        std::fs::write(&target_path, "\nThe Buyer paid in full.\n").unwrap();
        let mut args = args(
            fixture(dir.path()),
            TargetSource { target: None, target_file: Some(target_path), print_region: false },
        );
        args.out = Some(dir.path().join("out.json"));

        let result = execute(&args, None).unwrap();
        assert_eq!(result.applied_count, 0);
        assert_eq!(read_document(&dir.path().join("out.json")).unwrap(), result.tree);
        assert!(format_human(&result, args.out.as_deref()).starts_with("Region already matches"));
    }

    #[test]
    fn print_region_shows_current_text() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(
            fixture(dir.path()),
            TargetSource { target: None, target_file: None, print_region: true },
        );
        assert_eq!(region(&args, None).unwrap().region, "\nThe Buyer paid in full.\n");
    }

    #[test]
    fn unresolvable_anchor_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(fixture(dir.path()), inline("anything"));
        args.after = Some("Background".into());

        let err = execute(&args, None).unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::Rejected);
        assert!(format!("{err:#}").contains("afterText anchor"));
    }
}
