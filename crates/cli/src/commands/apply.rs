// `docpatch apply`: run an edit batch against a document tree.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use docpatch_engine::{EditRequest, PatchEngine, PatchResult};
use tracing::debug;

use super::{load_config, read_document, write_tree};
use crate::exit_code::ExitCode;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Document tree (JSON).
    #[arg(long)]
    pub doc: PathBuf,

    /// Edit batch: a JSON array of edit requests.
    #[arg(long)]
    pub edits: PathBuf,

    /// Write the edited tree here instead of printing it.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Force JSON output.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ApplyArgs, config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let format = OutputFormat::detect(args.json);

    match execute(&args, config_path) {
        Ok(result) => {
            let out = args.out.as_deref();
            output::print_output(format, &result, |r| format_human(r, out))?;
            for warning in &result.warnings {
                output::print_warning(
                    format,
                    "EDIT_WARNING",
                    &format!("edit #{}: {}", warning.index, warning.message),
                );
            }
            Ok(ExitCode::for_result(&result))
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

fn execute(args: &ApplyArgs, config_path: Option<&Path>) -> anyhow::Result<PatchResult> {
    let engine = PatchEngine::new(load_config(config_path)?);
    let doc = read_document(&args.doc)?;
    let edits = read_edits(&args.edits)?;
    debug!(doc = %args.doc.display(), edits = edits.len(), "applying edit batch");

    let result = engine
        .apply_edits(&doc, &edits)
        .with_context(|| format!("edit batch on `{}` was rejected", args.doc.display()))?;

    if let Some(out) = &args.out {
        write_tree(out, &result.tree)?;
    }
    Ok(result)
}

fn read_edits(path: &Path) -> anyhow::Result<Vec<EditRequest>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read edits `{}`", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("invalid edits in `{}`", path.display()))
}

fn format_human(result: &PatchResult, out: Option<&Path>) -> String {
    let total = result.applied_count + result.skipped.len();
    let mut lines = vec![format!("Applied {} of {} edit(s)", result.applied_count, total)];

    for skip in &result.skipped {
        lines.push(format!("  skipped #{} [{}] {}", skip.index, skip.reason, skip.message));
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
    use docpatch_engine::{Block, Document, SkipReason};
    use serde_json::json;

    fn fixture(dir: &Path, edits: serde_json::Value) -> ApplyArgs {
        let doc_path = dir.join("doc.json");
        let edits_path = dir.join("edits.json");
        let tree = Document::new(vec![
            Block::heading(1, "Notice"),
            Block::paragraph("Tenant shall pay rent. Tenant shall keep the premises clean."),
        ]);
        write_tree(&doc_path, &tree).unwrap();
        std::fs::write(&edits_path, edits.to_string()).unwrap();
        ApplyArgs { doc: doc_path, edits: edits_path, out: None, json: true }
    }

    #[test]
    fn execute_applies_batch_and_writes_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = fixture(
            dir.path(),
            json!([
                {"type": "replace", "findText": "Notice", "replaceText": "Final Notice"},
                {"type": "delete", "deleteText": "Tenant shall"}
            ]),
        );
        args.out = Some(dir.path().join("out.json"));

        let result = execute(&args, None).unwrap();
        assert_eq!(result.applied_count, 1);
        assert_eq!(result.skipped[0].reason, SkipReason::Ambiguous);
        assert_eq!(ExitCode::for_result(&result), ExitCode::Partial);

        let written = read_document(&dir.path().join("out.json")).unwrap();
        assert_eq!(written, result.tree);
        assert_eq!(written.content[0].text(), "Final Notice");
    }

    #[test]
    fn malformed_edits_file_is_a_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = fixture(dir.path(), json!({"type": "replace"}));

        let err = execute(&args, None).unwrap_err();
        assert!(format!("{err:#}").contains("edits.json"));
        assert_eq!(ExitCode::from_error(&err), ExitCode::Usage);
    }

    #[test]
    fn human_format_lists_skips() {
        let dir = tempfile::tempdir().unwrap();
        let args = fixture(dir.path(), json!([{"type": "delete", "deleteText": "landlord"}]));
        let result = execute(&args, None).unwrap();

        let text = format_human(&result, Some(Path::new("out.json")));
        assert!(text.starts_with("Applied 0 of 1 edit(s)"));
        assert!(text.contains("skipped #0 [NotFound]"));
        assert!(text.ends_with("Tree written to out.json"));
    }

    #[test]
    fn json_output_carries_result_fields() {
        let dir = tempfile::tempdir().unwrap();
        let args = fixture(
            dir.path(),
            json!([{"type": "add_mark", "text": "Notice", "markType": "bold"}]),
        );
        let result = execute(&args, None).unwrap();

        let mut buf = Vec::new();
        output::write_output(&mut buf, OutputFormat::Json, &result, |_| String::new()).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed["ok"], json!(true));
        assert_eq!(parsed["appliedCount"], json!(1));
        assert_eq!(
            parsed["tree"]["content"][0]["content"][0]["marks"],
            json!([{"type": "bold"}])
        );
    }
}
