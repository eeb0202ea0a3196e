// Span locator: finds a literal in the flat projection under context and
// occurrence constraints.
//
// Candidates are every exact (case-sensitive) occurrence of the literal that
// lies inside a single text block and satisfies the context filters, in
// document order. Disambiguation never guesses: an unresolved choice between
// several candidates is an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EngineConfig;
use crate::tree::{NodePath, Projection};

/// What to look for and how to choose among repeated matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatorQuery {
    pub literal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_after: Option<String>,
    /// 1-based; wins over `max_occurrences`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_occurrences: Option<usize>,
}

impl LocatorQuery {
    pub fn new(literal: impl Into<String>) -> Self {
        Self { literal: literal.into(), ..Self::default() }
    }

    pub fn context_before(mut self, context: impl Into<String>) -> Self {
        self.context_before = Some(context.into());
        self
    }

    pub fn context_after(mut self, context: impl Into<String>) -> Self {
        self.context_after = Some(context.into());
        self
    }

    pub fn occurrence(mut self, index: usize) -> Self {
        self.occurrence_index = Some(index);
        self
    }

    pub fn max_occurrences(mut self, max: usize) -> Self {
        self.max_occurrences = Some(max);
        self
    }
}

/// Half-open byte range `[start, end)` of the flat projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    One(Span),
    /// Only produced for `max_occurrences`, at most that many spans.
    Many(Vec<Span>),
}

impl Located {
    pub fn into_spans(self) -> Vec<Span> {
        match self {
            Self::One(span) => vec![span],
            Self::Many(spans) => spans,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocateError {
    #[error("text not found: {literal:?}")]
    NotFound { literal: String },
    #[error("occurrence {requested} of {literal:?} requested, but only {available} found")]
    OccurrenceOutOfRange { literal: String, requested: usize, available: usize },
    #[error(
        "{count} occurrences of {literal:?} found; add contextBefore/contextAfter, \
         occurrenceIndex or maxOccurrences"
    )]
    Ambiguous { literal: String, count: usize },
    #[error("contextBefore and contextAfter match different occurrences of {literal:?}")]
    ContradictoryContext { literal: String },
    #[error("{literal:?} only occurs across a block boundary")]
    CrossBlockLiteral { literal: String },
}

/// Context-filtered candidates in document order. Empty when nothing matches.
pub fn candidates(
    projection: &Projection,
    query: &LocatorQuery,
    config: &EngineConfig,
) -> Result<Vec<Span>, LocateError> {
    let text = projection.text();
    let literal = query.literal.as_str();
    if literal.is_empty() {
        return Ok(Vec::new());
    }

    let raw = find_all(text, literal);
    let in_block: Vec<Span> = raw
        .iter()
        .copied()
        .filter(|span| projection.block_containing(span.start, span.end).is_some())
        .collect();
    if in_block.is_empty() && !raw.is_empty() {
        return Err(LocateError::CrossBlockLiteral { literal: literal.to_string() });
    }

    let before = non_empty(query.context_before.as_deref());
    let after = non_empty(query.context_after.as_deref());
    let window = config.context_window;

    let matches_before = |span: &Span| {
        before.map_or(true, |ctx| {
            tail_chars(&text[..span.start], window + ctx.chars().count()).contains(ctx)
        })
    };
    let matches_after = |span: &Span| {
        after.map_or(true, |ctx| {
            head_chars(&text[span.end..], window + ctx.chars().count()).contains(ctx)
        })
    };

    let both: Vec<Span> =
        in_block.iter().copied().filter(|span| matches_before(span) && matches_after(span)).collect();

    if both.is_empty()
        && before.is_some()
        && after.is_some()
        && in_block.iter().any(|span| matches_before(span))
        && in_block.iter().any(|span| matches_after(span))
    {
        return Err(LocateError::ContradictoryContext { literal: literal.to_string() });
    }

    Ok(both)
}

/// Resolves a query to one span, or up to `max_occurrences` spans.
pub fn locate(
    projection: &Projection,
    query: &LocatorQuery,
    config: &EngineConfig,
) -> Result<Located, LocateError> {
    let found = candidates(projection, query, config)?;
    let literal = || query.literal.clone();

    if let Some(index) = query.occurrence_index {
        return match index.checked_sub(1).and_then(|i| found.get(i)) {
            Some(span) => Ok(Located::One(*span)),
            None => Err(LocateError::OccurrenceOutOfRange {
                literal: literal(),
                requested: index,
                available: found.len(),
            }),
        };
    }

    match (found.len(), query.max_occurrences) {
        (0, _) => Err(LocateError::NotFound { literal: literal() }),
        (1, _) => Ok(Located::One(found[0])),
        (_, Some(max)) if max <= 1 => Ok(Located::One(found[0])),
        (_, Some(max)) => Ok(Located::Many(found.into_iter().take(max).collect())),
        (count, None) => Err(LocateError::Ambiguous { literal: literal(), count }),
    }
}

/// Every candidate, ignoring occurrence disambiguation.
pub fn locate_all(
    projection: &Projection,
    query: &LocatorQuery,
    config: &EngineConfig,
) -> Result<Vec<Span>, LocateError> {
    let found = candidates(projection, query, config)?;
    if found.is_empty() {
        return Err(LocateError::NotFound { literal: query.literal.clone() });
    }
    Ok(found)
}

/// A candidate with enough surrounding text to build a disambiguator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    /// 1-based, usable as `occurrenceIndex`.
    pub index: usize,
    pub span: Span,
    pub block_path: NodePath,
    pub before: String,
    pub after: String,
}

pub fn describe_occurrences(
    projection: &Projection,
    query: &LocatorQuery,
    config: &EngineConfig,
) -> Result<Vec<Occurrence>, LocateError> {
    let text = projection.text();
    let found = candidates(projection, query, config)?;

    Ok(found
        .into_iter()
        .enumerate()
        .map(|(i, span)| {
            let block = projection.block_index_at(span.start).unwrap_or_default();
            let entry = &projection.blocks()[block];
            Occurrence {
                index: i + 1,
                span,
                block_path: entry.path.clone(),
                before: tail_chars(&text[entry.flat_start..span.start], config.context_window)
                    .to_string(),
                after: head_chars(&text[span.end..entry.flat_end], config.context_window)
                    .to_string(),
            }
        })
        .collect())
}

/// All occurrences, overlapping ones included.
fn find_all(text: &str, literal: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(pos) = text[from..].find(literal) {
        let start = from + pos;
        spans.push(Span { start, end: start + literal.len() });
        let step = text[start..].chars().next().map_or(1, char::len_utf8);
        from = start + step;
    }
    spans
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

fn head_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
