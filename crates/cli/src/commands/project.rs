// `docpatch project`: show the flat text projection and its block map.

use std::path::PathBuf;

use clap::Args;
use docpatch_engine::tree::{project, Projection};
use tracing::debug;

use super::read_document;
use crate::exit_code::ExitCode;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ProjectArgs {
    /// Document tree (JSON).
    #[arg(long)]
    pub doc: PathBuf,

    /// Force JSON output.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ProjectArgs) -> anyhow::Result<ExitCode> {
    let format = OutputFormat::detect(args.json);

    match read_document(&args.doc) {
        Ok(doc) => {
            let projection = project(&doc);
            debug!(
                doc = %args.doc.display(),
                blocks = projection.blocks().len(),
                segments = projection.segments().len(),
                "projected document"
            );
            output::print_output(format, &projection, format_human)?;
            Ok(ExitCode::Success)
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

fn format_human(projection: &Projection) -> String {
    let mut lines = vec![format!("{:?}", projection.text()), String::new()];
    lines.push(format!("{:<10} {:<14} {:>6} {:>6}", "BLOCK", "KIND", "START", "END"));
    for entry in projection.blocks() {
        lines.push(format!(
            "{:<10} {:<14} {:>6} {:>6}",
            entry.path.to_string(),
            entry.kind.to_string(),
            entry.flat_start,
            entry.flat_end
        ));
    }
    lines.push(String::new());
    lines.push(format!("{:<10} {:>6} {:>6}", "RUN", "START", "END"));
    for segment in projection.segments() {
        lines.push(format!(
            "{:<10} {:>6} {:>6}",
            segment.path.to_string(),
            segment.flat_start,
            segment.flat_end
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpatch_engine::{Block, Document, Mark, MarkSet, TextRun};

    fn sample() -> Projection {
        project(&Document::new(vec![
            Block::heading(1, "Terms"),
            Block::Paragraph {
                content: vec![
                    TextRun::plain("Net "),
                    TextRun::new("30", MarkSet::from([Mark::Bold])),
                ],
            },
        ]))
    }

    #[test]
    fn human_format_lists_blocks_and_runs() {
        let text = format_human(&sample());
        assert!(text.starts_with("\"TermsNet 30\""));
        assert!(text.contains("BLOCK"));
        assert_eq!(text.lines().filter(|line| line.starts_with('/')).count(), 5);
    }

    #[test]
    fn json_format_exposes_offsets() {
        let mut buf = Vec::new();
        output::write_output(&mut buf, OutputFormat::Json, &sample(), format_human).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed["text"], "TermsNet 30");
        assert_eq!(parsed["blocks"][1]["flatStart"], 5);
        assert_eq!(parsed["segments"][2]["flatEnd"], 11);
    }
}
