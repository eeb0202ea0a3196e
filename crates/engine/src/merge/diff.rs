// Token-level Myers diff (linear space, via `similar`).
//
// Text is split into word/whitespace/punctuation tokens (or whole lines) and
// diffed token by token. Changed stretches are reported as a delete run
// followed by an insert run so callers can pair replacements.

use std::hash::Hash;
use std::ops::Range;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffTag};

/// Past this, the diff falls back to a coarser but still valid alignment.
const DIFF_DEADLINE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffGranularity {
    /// Word characters, whitespace runs, single punctuation, newlines.
    #[default]
    Word,
    /// Whole lines and newlines.
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Equal,
    Delete,
    Insert,
}

/// A maximal run of equal, deleted or inserted tokens. Ranges index tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRun {
    pub kind: DiffKind,
    pub old: Range<usize>,
    pub new: Range<usize>,
}

/// A diff run rendered back to text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffChunk {
    pub kind: DiffKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenEdit {
    Equal,
    Insert,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Word,
    Space,
    Newline,
    Other,
}

fn classify(ch: char) -> CharClass {
    if ch == '\n' {
        CharClass::Newline
    } else if ch.is_whitespace() {
        CharClass::Space
    } else if ch.is_alphanumeric() || ch == '_' {
        CharClass::Word
    } else {
        CharClass::Other
    }
}

/// Splits `chars` into token ranges (indices into `chars`).
pub(crate) fn tokenize_chars(chars: &[char], granularity: DiffGranularity) -> Vec<Range<usize>> {
    let mut tokens = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let class = classify(chars[start]);
        let mut end = start + 1;
        let groups = match granularity {
            DiffGranularity::Word => matches!(class, CharClass::Word | CharClass::Space),
            DiffGranularity::Line => class != CharClass::Newline,
        };
        if groups {
            while end < chars.len() {
                let next = classify(chars[end]);
                let same = match granularity {
                    DiffGranularity::Word => next == class,
                    DiffGranularity::Line => next != CharClass::Newline,
                };
                if !same {
                    break;
                }
                end += 1;
            }
        }
        tokens.push(start..end);
        start = end;
    }

    tokens
}

/// Tokens of `text` as string slices.
pub fn tokenize(text: &str, granularity: DiffGranularity) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    tokenize_chars(&chars, granularity)
        .into_iter()
        .map(|range| chars[range].iter().collect())
        .collect()
}

/// Diffs two token sequences into contiguous runs in document order.
pub fn diff_tokens<T: Eq + Hash + Ord>(old: &[T], new: &[T]) -> Vec<DiffRun> {
    group_runs(&myers_edits(old, new))
}

/// Convenience: tokenize, diff and render both texts.
pub fn diff_text(old_text: &str, new_text: &str, granularity: DiffGranularity) -> Vec<DiffChunk> {
    let old = tokenize(old_text, granularity);
    let new = tokenize(new_text, granularity);

    diff_tokens(&old, &new)
        .into_iter()
        .map(|run| {
            let text = match run.kind {
                DiffKind::Equal | DiffKind::Delete => old[run.old].concat(),
                DiffKind::Insert => new[run.new].concat(),
            };
            DiffChunk { kind: run.kind, text }
        })
        .collect()
}

fn myers_edits<T: Eq + Hash + Ord>(old: &[T], new: &[T]) -> Vec<TokenEdit> {
    let deadline = Instant::now() + DIFF_DEADLINE;
    let ops = similar::capture_diff_slices_deadline(Algorithm::Myers, old, new, Some(deadline));

    let mut edits = Vec::with_capacity(old.len().max(new.len()));
    for op in &ops {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => edits.extend(old_range.map(|_| TokenEdit::Equal)),
            DiffTag::Delete => edits.extend(old_range.map(|_| TokenEdit::Delete)),
            DiffTag::Insert => edits.extend(new_range.map(|_| TokenEdit::Insert)),
            DiffTag::Replace => {
                edits.extend(old_range.map(|_| TokenEdit::Delete));
                edits.extend(new_range.map(|_| TokenEdit::Insert));
            }
        }
    }
    edits
}

fn group_runs(edits: &[TokenEdit]) -> Vec<DiffRun> {
    let mut runs = Vec::new();
    let (mut old_at, mut new_at) = (0usize, 0usize);
    let mut i = 0;

    while i < edits.len() {
        let (old_start, new_start) = (old_at, new_at);
        if edits[i] == TokenEdit::Equal {
            while i < edits.len() && edits[i] == TokenEdit::Equal {
                old_at += 1;
                new_at += 1;
                i += 1;
            }
            runs.push(DiffRun { kind: DiffKind::Equal, old: old_start..old_at, new: new_start..new_at });
            continue;
        }

        while i < edits.len() && edits[i] != TokenEdit::Equal {
            match edits[i] {
                TokenEdit::Delete => old_at += 1,
                TokenEdit::Insert => new_at += 1,
                TokenEdit::Equal => {}
            }
            i += 1;
        }
        if old_at > old_start {
            runs.push(DiffRun {
                kind: DiffKind::Delete,
                old: old_start..old_at,
                new: new_start..new_start,
            });
        }
        if new_at > new_start {
            runs.push(DiffRun { kind: DiffKind::Insert, old: old_at..old_at, new: new_start..new_at });
        }
    }

    runs
}
