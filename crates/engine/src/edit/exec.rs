// Executes one validated edit against the working tree.
//
// Spans are located on a projection built here, from the tree as it stands
// now, and applied back to front so earlier spans keep their offsets.

use crate::config::EngineConfig;
use crate::locate::{locate, locate_all, Span};
use crate::tree::{project, Block, Document, NodePath, Projection, TextBlockEntry, TextRun};

use super::inline;
use super::request::{AnchorEnd, PlannedEdit};
use super::EditError;

/// Applies `edit` to `doc` and returns the spans it touched, in document order.
pub(crate) fn execute(
    doc: &mut Document,
    edit: &PlannedEdit,
    config: &EngineConfig,
) -> Result<Vec<Span>, EditError> {
    let projection = project(doc);

    match edit {
        PlannedEdit::Replace { query, replacement, replace_all } => {
            let found = if *replace_all {
                locate_all(&projection, query, config)?
            } else {
                locate(&projection, query, config)?.into_spans()
            };
            let spans = non_overlapping(found);
            edit_spans(doc, &projection, &spans, |runs, lo, hi| {
                inline::replace_range(runs, lo, hi, replacement)
            })?;
            Ok(spans)
        }
        PlannedEdit::Insert { side, query, text } => {
            let spans = non_overlapping(locate(&projection, query, config)?.into_spans());
            edit_spans(doc, &projection, &spans, |runs, lo, hi| {
                let at = match side {
                    AnchorEnd::After => hi,
                    AnchorEnd::Before => lo,
                };
                inline::insert_at(runs, at, text)
            })?;
            Ok(spans)
        }
        PlannedEdit::Delete { query } => {
            let spans = non_overlapping(locate(&projection, query, config)?.into_spans());
            edit_spans(doc, &projection, &spans, |runs, lo, hi| {
                inline::replace_range(runs, lo, hi, "")
            })?;
            Ok(spans)
        }
        PlannedEdit::Mark { query, change } => {
            let spans = non_overlapping(locate(&projection, query, config)?.into_spans());
            edit_spans(doc, &projection, &spans, |runs, lo, hi| {
                inline::update_marks(runs, lo, hi, *change)
            })?;
            Ok(spans)
        }
        PlannedEdit::AddParagraph { anchor: None, block } => {
            doc.content.push(block.clone());
            Ok(Vec::new())
        }
        PlannedEdit::AddParagraph { anchor: Some((side, query)), block } => {
            let spans = locate(&projection, query, config)?.into_spans();
            let mut paths = Vec::with_capacity(spans.len());
            for span in &spans {
                paths.push(block_entry(&projection, span)?.path.clone());
            }
            paths.dedup();

            for path in paths.iter().rev() {
                insert_sibling(doc, path, *side, block.clone())?;
            }
            Ok(spans)
        }
    }
}

/// Drops spans overlapping an earlier kept span.
fn non_overlapping(spans: Vec<Span>) -> Vec<Span> {
    let mut kept: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if kept.last().map_or(true, |last| span.start >= last.end) {
            kept.push(span);
        }
    }
    kept
}

fn block_entry<'a>(projection: &'a Projection, span: &Span) -> Result<&'a TextBlockEntry, EditError> {
    projection
        .block_containing(span.start, span.end)
        .map(|index| &projection.blocks()[index])
        .ok_or(EditError::SpanOutsideBlock { start: span.start, end: span.end })
}

/// Calls `apply(runs, lo, hi)` for each span, last span first, with offsets
/// local to the span's text block.
fn edit_spans(
    doc: &mut Document,
    projection: &Projection,
    spans: &[Span],
    mut apply: impl FnMut(&mut Vec<TextRun>, usize, usize),
) -> Result<(), EditError> {
    let mut targets = Vec::with_capacity(spans.len());
    for span in spans {
        let entry = block_entry(projection, span)?;
        if doc.block(&entry.path).and_then(Block::runs).is_none() {
            return Err(EditError::PathNotFound(entry.path.clone()));
        }
        targets.push((entry, span.start - entry.flat_start, span.end - entry.flat_start));
    }

    for (entry, lo, hi) in targets.into_iter().rev() {
        if let Some(runs) = doc.block_mut(&entry.path).and_then(Block::runs_mut) {
            apply(runs, lo, hi);
        }
    }
    Ok(())
}

fn insert_sibling(
    doc: &mut Document,
    path: &NodePath,
    side: AnchorEnd,
    block: Block,
) -> Result<(), EditError> {
    let index = path.last().ok_or_else(|| EditError::PathNotFound(path.clone()))?;
    let at = match side {
        AnchorEnd::After => index + 1,
        AnchorEnd::Before => index,
    };
    let siblings =
        doc.siblings_mut(path.parent()).ok_or_else(|| EditError::PathNotFound(path.clone()))?;
    siblings.insert(at, block);
    Ok(())
}
