// Anchor-diff merge: rewrites the region between two anchors by diffing its
// text against a replacement and splicing in only the changed tokens.
//
// The region is read as a stream of marked characters with a break between
// consecutive text blocks. Breaks render as '\n', so a replacement can join
// blocks (drop the newline) or split them (add one). Unchanged tokens keep
// their characters, marks and block boundaries.

pub mod diff;

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::EngineConfig;
use crate::edit::inline::slice_runs;
use crate::locate::{locate, LocateError, LocatorQuery, Span};
use crate::tree::{
    normalize_runs, project, Block, BlockKind, Document, MarkSet, NodePath, Projection, TextRun,
};

use diff::{diff_tokens, tokenize_chars, DiffKind};

/// Literal anchors bounding a rewrite region. Both are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorPair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_text: Option<String>,
    /// Applies to either anchor lacking its own index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_occurrence: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_occurrence: Option<usize>,
}

impl AnchorPair {
    pub fn between(after: impl Into<String>, before: impl Into<String>) -> Self {
        Self { after_text: Some(after.into()), before_text: Some(before.into()), ..Self::default() }
    }

    pub fn after(after: impl Into<String>) -> Self {
        Self { after_text: Some(after.into()), ..Self::default() }
    }

    pub fn before(before: impl Into<String>) -> Self {
        Self { before_text: Some(before.into()), ..Self::default() }
    }

    fn query(&self, side: AnchorSide) -> Option<LocatorQuery> {
        let (text, occurrence) = match side {
            AnchorSide::After => (&self.after_text, self.after_occurrence),
            AnchorSide::Before => (&self.before_text, self.before_occurrence),
        };
        let text = text.as_deref().filter(|t| !t.is_empty())?;
        Some(LocatorQuery {
            occurrence_index: occurrence.or(self.occurrence_index),
            ..LocatorQuery::new(text)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AnchorSide {
    After,
    Before,
}

impl fmt::Display for AnchorSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::After => "afterText",
            Self::Before => "beforeText",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("{side} anchor: {source}")]
    Anchor { side: AnchorSide, source: LocateError },
    #[error("anchors enclose an empty region")]
    EmptyRegion,
    #[error("afterText anchor ends after beforeText anchor starts")]
    AnchorsOutOfOrder,
    #[error("occurrence indexes are 1-based and must be at least 1")]
    ZeroOccurrence,
}

/// Token counts of a rewrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub equal_tokens: usize,
    pub deleted_tokens: usize,
    pub inserted_tokens: usize,
    /// Delete and insert runs; zero means the tree was left as is.
    pub changed_runs: usize,
}

// ── Region ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Boundary {
    block: usize,
    local: usize,
}

#[derive(Debug, Clone, Copy)]
enum Atom {
    Char { ch: char, marks: usize },
    Break,
}

impl Atom {
    fn render(self) -> char {
        match self {
            Self::Char { ch, .. } => ch,
            Self::Break => '\n',
        }
    }
}

struct Region {
    atoms: Vec<Atom>,
    /// Distinct mark sets referenced by `Atom::Char`.
    marks: Vec<MarkSet>,
    /// Runs of the first block before the region.
    prefix: Vec<TextRun>,
    /// Runs of the last block after the region.
    suffix: Vec<TextRun>,
    blocks: Vec<(NodePath, BlockKind)>,
}

impl Region {
    fn text(&self) -> String {
        self.atoms.iter().map(|atom| atom.render()).collect()
    }
}

fn resolve_anchor(
    projection: &Projection,
    query: &LocatorQuery,
    side: AnchorSide,
    config: &EngineConfig,
) -> Result<(usize, Span), RewriteError> {
    let anchor_err = |source| RewriteError::Anchor { side, source };
    let span = locate(projection, query, config)
        .map_err(anchor_err)?
        .into_spans()
        .into_iter()
        .next()
        .ok_or_else(|| anchor_err(LocateError::NotFound { literal: query.literal.clone() }))?;
    let block = projection
        .block_containing(span.start, span.end)
        .ok_or_else(|| anchor_err(LocateError::CrossBlockLiteral { literal: query.literal.clone() }))?;
    Ok((block, span))
}

fn bounds(
    projection: &Projection,
    anchors: &AnchorPair,
    config: &EngineConfig,
) -> Result<(Boundary, Boundary), RewriteError> {
    if [anchors.occurrence_index, anchors.after_occurrence, anchors.before_occurrence]
        .contains(&Some(0))
    {
        return Err(RewriteError::ZeroOccurrence);
    }
    let blocks = projection.blocks();
    let last = blocks.len().checked_sub(1).ok_or(RewriteError::EmptyRegion)?;

    let after = anchors.query(AnchorSide::After);
    let before = anchors.query(AnchorSide::Before);
    let both = after.is_some() && before.is_some();

    let start = match after {
        Some(query) => {
            let (block, span) = resolve_anchor(projection, &query, AnchorSide::After, config)?;
            Boundary { block, local: span.end - blocks[block].flat_start }
        }
        None => Boundary { block: 0, local: 0 },
    };
    let end = match before {
        Some(query) => {
            let (block, span) = resolve_anchor(projection, &query, AnchorSide::Before, config)?;
            Boundary { block, local: span.start - blocks[block].flat_start }
        }
        None => Boundary { block: last, local: blocks[last].len() },
    };

    if start > end {
        return Err(RewriteError::AnchorsOutOfOrder);
    }
    if start == end && both {
        return Err(RewriteError::EmptyRegion);
    }
    Ok((start, end))
}

fn extract(doc: &Document, projection: &Projection, start: Boundary, end: Boundary) -> Region {
    let mut region = Region {
        atoms: Vec::new(),
        marks: Vec::new(),
        prefix: Vec::new(),
        suffix: Vec::new(),
        blocks: Vec::new(),
    };

    for index in start.block..=end.block {
        let entry = &projection.blocks()[index];
        let runs = doc.block(&entry.path).and_then(Block::runs).unwrap_or_default();
        let lo = if index == start.block { start.local } else { 0 };
        let hi = if index == end.block { end.local } else { entry.len() };

        if index > start.block {
            region.atoms.push(Atom::Break);
        }
        if index == start.block {
            region.prefix = slice_runs(runs, 0, lo);
        }
        if index == end.block {
            region.suffix = slice_runs(runs, hi, entry.len());
        }
        for run in slice_runs(runs, lo, hi) {
            let marks = region.marks.len();
            region.atoms.extend(run.text.chars().map(|ch| Atom::Char { ch, marks }));
            region.marks.push(run.marks);
        }
        region.blocks.push((entry.path.clone(), entry.kind));
    }

    region
}

/// Current text of the region the anchors bound, breaks rendered as '\n'.
pub fn region_text(
    doc: &Document,
    anchors: &AnchorPair,
    config: &EngineConfig,
) -> Result<String, RewriteError> {
    let projection = project(doc);
    let (start, end) = bounds(&projection, anchors, config)?;
    Ok(extract(doc, &projection, start, end).text())
}

// ── Rebuild ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Cursor {
    /// The k-th region block.
    Original(usize),
    /// The j-th paragraph split off after region block k.
    Split(usize, usize),
}

struct Rebuild {
    runs: Vec<Vec<TextRun>>,
    /// Paragraphs to insert before region block k.
    leading: Vec<Vec<Vec<TextRun>>>,
    /// Paragraphs to insert after region block k.
    splits: Vec<Vec<Vec<TextRun>>>,
    removed: Vec<bool>,
    cursor: Cursor,
    next: usize,
    /// The current original block has no unchanged text yet.
    fresh: bool,
}

impl Rebuild {
    fn new(region: &mut Region) -> Self {
        let count = region.blocks.len();
        let mut runs = vec![Vec::new(); count];
        runs[0] = std::mem::take(&mut region.prefix);
        let fresh = runs[0].is_empty();
        Self {
            runs,
            leading: vec![Vec::new(); count],
            splits: vec![Vec::new(); count],
            removed: vec![false; count],
            cursor: Cursor::Original(0),
            next: 1,
            fresh,
        }
    }

    fn owner(&self) -> usize {
        match self.cursor {
            Cursor::Original(k) | Cursor::Split(k, _) => k,
        }
    }

    fn target(&mut self) -> &mut Vec<TextRun> {
        match self.cursor {
            Cursor::Original(k) => &mut self.runs[k],
            Cursor::Split(k, j) => &mut self.splits[k][j],
        }
    }

    fn keep(&mut self, ch: char, marks: &MarkSet) {
        self.fresh = false;
        self.push(ch, marks);
    }

    fn push(&mut self, ch: char, marks: &MarkSet) {
        let target = self.target();
        match target.last_mut() {
            Some(last) if last.marks == *marks => last.text.push(ch),
            _ => target.push(TextRun::new(ch.to_string(), marks.clone())),
        }
    }

    /// An unchanged break: continue in the next original block.
    fn keep_break(&mut self) {
        self.cursor = Cursor::Original(self.next);
        self.next += 1;
        self.fresh = true;
    }

    /// A deleted break: the next block's surviving text joins the current one.
    fn drop_break(&mut self) {
        self.removed[self.next] = true;
        self.next += 1;
    }

    /// An inserted newline. Text typed at the very start of an original block
    /// becomes a paragraph before it; otherwise writing continues in a new
    /// paragraph after the current block.
    fn split(&mut self) {
        if let (true, Cursor::Original(k)) = (self.fresh, self.cursor) {
            let typed = std::mem::take(&mut self.runs[k]);
            self.leading[k].push(typed);
            return;
        }
        let owner = self.owner();
        self.splits[owner].push(Vec::new());
        self.cursor = Cursor::Split(owner, self.splits[owner].len() - 1);
    }

    fn in_code_block(&self, region: &Region) -> bool {
        matches!(self.cursor, Cursor::Original(k) if region.blocks[k].1 == BlockKind::CodeBlock)
    }

    fn write_back(mut self, doc: &mut Document, region: Region) {
        self.target().extend(region.suffix);

        for (k, (path, _)) in region.blocks.iter().enumerate().rev() {
            let Some(index) = path.last() else { continue };
            if self.removed[k] {
                doc.remove_block(path);
                continue;
            }

            let mut runs = std::mem::take(&mut self.runs[k]);
            normalize_runs(&mut runs);
            if let Some(target) = doc.block_mut(path).and_then(Block::runs_mut) {
                *target = runs;
            }

            let splits = paragraphs(std::mem::take(&mut self.splits[k]));
            let leading = paragraphs(std::mem::take(&mut self.leading[k]));
            if let Some(siblings) = doc.siblings_mut(path.parent()) {
                siblings.splice(index + 1..index + 1, splits);
                siblings.splice(index..index, leading);
            }
        }
    }
}

fn paragraphs(contents: Vec<Vec<TextRun>>) -> Vec<Block> {
    contents
        .into_iter()
        .map(|mut content| {
            normalize_runs(&mut content);
            Block::Paragraph { content }
        })
        .collect()
}

fn token_slices<'a>(chars: &'a [char], tokens: &[Range<usize>]) -> Vec<&'a [char]> {
    tokens.iter().map(|range| &chars[range.clone()]).collect()
}

/// Rewrites the anchored region of `doc` in place so its text becomes
/// `target`. The tree is untouched on error or when nothing changed.
pub(crate) fn merge_region(
    doc: &mut Document,
    anchors: &AnchorPair,
    target: &str,
    config: &EngineConfig,
) -> Result<DiffSummary, RewriteError> {
    let projection = project(doc);
    let (start, end) = bounds(&projection, anchors, config)?;
    let mut region = extract(doc, &projection, start, end);

    let old_chars: Vec<char> = region.atoms.iter().map(|atom| atom.render()).collect();
    let new_chars: Vec<char> = target.chars().collect();
    let old_tokens = tokenize_chars(&old_chars, config.diff_granularity);
    let new_tokens = tokenize_chars(&new_chars, config.diff_granularity);
    let runs = diff_tokens(
        &token_slices(&old_chars, &old_tokens),
        &token_slices(&new_chars, &new_tokens),
    );

    let mut summary = DiffSummary::default();
    for run in &runs {
        match run.kind {
            DiffKind::Equal => summary.equal_tokens += run.old.len(),
            DiffKind::Delete => summary.deleted_tokens += run.old.len(),
            DiffKind::Insert => summary.inserted_tokens += run.new.len(),
        }
    }
    summary.changed_runs = runs.iter().filter(|run| run.kind != DiffKind::Equal).count();

    debug!(
        blocks = region.blocks.len(),
        old_chars = old_chars.len(),
        new_chars = new_chars.len(),
        diff_runs = runs.len(),
        changed_runs = summary.changed_runs,
        "rewrite region diffed"
    );

    if summary.changed_runs == 0 {
        return Ok(summary);
    }

    let mut rebuild = Rebuild::new(&mut region);
    let mut last_equal: Option<usize> = None;
    let mut first_deleted: Option<usize> = None;

    for run in &runs {
        match run.kind {
            DiffKind::Equal => {
                first_deleted = None;
                for token in &old_tokens[run.old.clone()] {
                    for atom in &region.atoms[token.clone()] {
                        match *atom {
                            Atom::Break => {
                                rebuild.keep_break();
                                last_equal = None;
                            }
                            Atom::Char { ch, marks } => {
                                rebuild.keep(ch, &region.marks[marks]);
                                last_equal = Some(marks);
                            }
                        }
                    }
                }
            }
            DiffKind::Delete => {
                first_deleted = None;
                for token in &old_tokens[run.old.clone()] {
                    for atom in &region.atoms[token.clone()] {
                        match *atom {
                            Atom::Break => rebuild.drop_break(),
                            Atom::Char { marks, .. } => {
                                first_deleted.get_or_insert(marks);
                            }
                        }
                    }
                }
            }
            DiffKind::Insert => {
                let mut inherited = first_deleted
                    .or(last_equal)
                    .map(|index| region.marks[index].clone())
                    .unwrap_or_default();
                for token in &new_tokens[run.new.clone()] {
                    for &ch in &new_chars[token.clone()] {
                        if ch == '\n' && !rebuild.in_code_block(&region) {
                            rebuild.split();
                            inherited = MarkSet::new();
                        } else {
                            rebuild.push(ch, &inherited);
                        }
                    }
                }
            }
        }
    }

    rebuild.write_back(doc, region);
    Ok(summary)
}
