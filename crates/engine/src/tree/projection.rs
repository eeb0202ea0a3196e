// Flat text projection of a document tree.
//
// All run text is concatenated in document order; block boundaries add no
// characters. Offsets are UTF-8 byte offsets into the flat string. The
// projection is derived and disposable: rebuild it after every mutation.

use serde::Serialize;

use super::{BlockKind, Document, NodePath};

/// One non-empty text run in flat coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub flat_start: usize,
    pub flat_end: usize,
    /// Path of the run: text block path plus run index.
    pub path: NodePath,
    /// Offset inside the run at which this segment starts.
    pub run_offset: usize,
    /// Index into [`Projection::blocks`].
    pub block: usize,
}

/// One text block (paragraph, heading, code block) in flat coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlockEntry {
    pub path: NodePath,
    pub kind: BlockKind,
    pub flat_start: usize,
    pub flat_end: usize,
}

impl TextBlockEntry {
    pub fn len(&self) -> usize {
        self.flat_end - self.flat_start
    }
}

/// Tree position of a flat offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub path: NodePath,
    pub run_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Projection {
    text: String,
    segments: Vec<Segment>,
    blocks: Vec<TextBlockEntry>,
}

pub fn project(doc: &Document) -> Projection {
    let mut text = String::new();
    let mut segments = Vec::new();
    let mut blocks = Vec::new();

    for (path, block) in doc.text_blocks() {
        let block_index = blocks.len();
        let flat_start = text.len();
        for (run_index, run) in block.runs().unwrap_or_default().iter().enumerate() {
            if run.text.is_empty() {
                continue;
            }
            let start = text.len();
            text.push_str(&run.text);
            segments.push(Segment {
                flat_start: start,
                flat_end: text.len(),
                path: path.child(run_index),
                run_offset: 0,
                block: block_index,
            });
        }
        blocks.push(TextBlockEntry { path, kind: block.kind(), flat_start, flat_end: text.len() });
    }

    Projection { text, segments, blocks }
}

impl Projection {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn blocks(&self) -> &[TextBlockEntry] {
        &self.blocks
    }

    fn segment_index_at(&self, offset: usize) -> Option<usize> {
        let index = self.segments.partition_point(|segment| segment.flat_end <= offset);
        (index < self.segments.len() && self.segments[index].flat_start <= offset).then_some(index)
    }

    /// Run path and intra-run offset of the character starting at `offset`.
    pub fn position(&self, offset: usize) -> Option<Position> {
        let segment = &self.segments[self.segment_index_at(offset)?];
        Some(Position {
            path: segment.path.clone(),
            run_offset: segment.run_offset + offset - segment.flat_start,
        })
    }

    /// Text block owning the character starting at `offset`.
    pub fn block_index_at(&self, offset: usize) -> Option<usize> {
        self.segment_index_at(offset).map(|index| self.segments[index].block)
    }

    /// Text block holding the whole non-empty range, if a single one does.
    pub fn block_containing(&self, start: usize, end: usize) -> Option<usize> {
        if start >= end {
            return None;
        }
        let block = self.block_index_at(start)?;
        (end <= self.blocks[block].flat_end).then_some(block)
    }
}
