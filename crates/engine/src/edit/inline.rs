// Run-level primitives for a single text block.
//
// Offsets are byte offsets relative to the start of the block's text and must
// fall on char boundaries. Every mutating helper leaves the runs normalized.

use crate::tree::{normalize_runs, MarkSet, TextRun};

use super::request::MarkChange;

/// Copies of the runs covering `[lo, hi)`, trimmed to that range.
pub(crate) fn slice_runs(runs: &[TextRun], lo: usize, hi: usize) -> Vec<TextRun> {
    let mut out = Vec::new();
    let mut pos = 0;
    for run in runs {
        let (start, end) = (pos, pos + run.len());
        pos = end;
        let (a, b) = (start.max(lo), end.min(hi));
        if a < b {
            out.push(TextRun::new(&run.text[a - start..b - start], run.marks.clone()));
        }
    }
    out
}

/// Marks of the character starting at `offset`, empty past the end.
pub(crate) fn marks_at(runs: &[TextRun], offset: usize) -> MarkSet {
    let mut pos = 0;
    for run in runs {
        let end = pos + run.len();
        if offset >= pos && offset < end {
            return run.marks.clone();
        }
        pos = end;
    }
    MarkSet::new()
}

/// Marks of a run that strictly surrounds `offset`, if any.
pub(crate) fn interior_marks(runs: &[TextRun], offset: usize) -> Option<MarkSet> {
    let mut pos = 0;
    for run in runs {
        let end = pos + run.len();
        if offset > pos && offset < end {
            return Some(run.marks.clone());
        }
        pos = end;
    }
    None
}

fn total_len(runs: &[TextRun]) -> usize {
    runs.iter().map(TextRun::len).sum()
}

fn rebuild(runs: &mut Vec<TextRun>, lo: usize, hi: usize, middle: Vec<TextRun>) {
    let len = total_len(runs);
    let mut out = slice_runs(runs, 0, lo);
    out.extend(middle);
    out.extend(slice_runs(runs, hi, len));
    normalize_runs(&mut out);
    *runs = out;
}

/// Replaces `[lo, hi)` with `text`, which takes the marks of the first
/// replaced character. An empty `text` deletes the range.
pub(crate) fn replace_range(runs: &mut Vec<TextRun>, lo: usize, hi: usize, text: &str) {
    let marks = marks_at(runs, lo);
    rebuild(runs, lo, hi, vec![TextRun::new(text, marks)]);
}

/// Inserts `text` at `at`. Unmarked unless it lands inside a run.
pub(crate) fn insert_at(runs: &mut Vec<TextRun>, at: usize, text: &str) {
    let marks = interior_marks(runs, at).unwrap_or_default();
    rebuild(runs, at, at, vec![TextRun::new(text, marks)]);
}

/// Applies a mark change to every run piece inside `[lo, hi)`.
pub(crate) fn update_marks(runs: &mut Vec<TextRun>, lo: usize, hi: usize, change: MarkChange) {
    let middle = slice_runs(runs, lo, hi)
        .into_iter()
        .map(|mut run| {
            change.apply(&mut run.marks);
            run
        })
        .collect();
    rebuild(runs, lo, hi, middle);
}
