// Rich-text document tree: blocks, text runs and marks.
//
// The JSON shape follows the editor's document schema:
//
//   {"type":"doc","content":[
//     {"type":"paragraph","content":[{"type":"text","text":"Hi","marks":[{"type":"bold"}]}]}
//   ]}
//
// Text-bearing blocks (paragraph, heading, code_block) hold text runs only;
// container blocks (blockquote, lists, list items) hold blocks only.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod projection;

pub use projection::{project, Position, Projection, Segment, TextBlockEntry};

// ── Marks ───────────────────────────────────────────────────────────

/// Inline formatting attribute carried by a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Code,
    Strike,
}

impl Mark {
    pub const ALL: [Mark; 5] = [Self::Bold, Self::Italic, Self::Underline, Self::Code, Self::Strike];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bold => "bold",
            Self::Italic => "italic",
            Self::Underline => "underline",
            Self::Code => "code",
            Self::Strike => "strike",
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mark {
    type Err = UnknownName;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|mark| mark.as_str() == value).ok_or(UnknownName)
    }
}

/// Returned when a mark or block name is not part of the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownName;

/// Ordered, duplicate-free set of marks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkSet(BTreeSet<Mark>);

impl MarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, mark: Mark) -> bool {
        self.0.contains(&mark)
    }

    pub fn insert(&mut self, mark: Mark) -> bool {
        self.0.insert(mark)
    }

    pub fn remove(&mut self, mark: Mark) -> bool {
        self.0.remove(&mark)
    }

    pub fn iter(&self) -> impl Iterator<Item = Mark> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Mark> for MarkSet {
    fn from_iter<I: IntoIterator<Item = Mark>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Mark; N]> for MarkSet {
    fn from(marks: [Mark; N]) -> Self {
        marks.into_iter().collect()
    }
}

// ── Text runs ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TextTag {
    #[default]
    Text,
}

/// A leaf of the tree: a string with a set of marks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    #[serde(rename = "type", default)]
    tag: TextTag,
    pub text: String,
    #[serde(default, skip_serializing_if = "MarkSet::is_empty")]
    pub marks: MarkSet,
}

impl TextRun {
    pub fn new(text: impl Into<String>, marks: MarkSet) -> Self {
        Self { tag: TextTag::Text, text: text.into(), marks }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, MarkSet::new())
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }
}

/// Merges adjacent runs with equal marks and drops empty runs.
pub(crate) fn normalize_runs(runs: &mut Vec<TextRun>) {
    let mut merged: Vec<TextRun> = Vec::with_capacity(runs.len());
    for run in runs.drain(..) {
        if run.text.is_empty() {
            continue;
        }
        match merged.last_mut() {
            Some(prev) if prev.marks == run.marks => prev.text.push_str(&run.text),
            _ => merged.push(run),
        }
    }
    *runs = merged;
}

// ── Blocks ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingAttrs {
    pub level: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlockAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl CodeBlockAttrs {
    fn is_empty(&self) -> bool {
        self.language.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedListAttrs {
    #[serde(default = "default_list_start")]
    pub start: u32,
}

fn default_list_start() -> u32 {
    1
}

/// A block node. Text blocks carry runs, containers carry blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<TextRun>,
    },
    Heading {
        attrs: HeadingAttrs,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<TextRun>,
    },
    CodeBlock {
        #[serde(default, skip_serializing_if = "CodeBlockAttrs::is_empty")]
        attrs: CodeBlockAttrs,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<TextRun>,
    },
    Blockquote {
        #[serde(default)]
        content: Vec<Block>,
    },
    BulletList {
        #[serde(default)]
        content: Vec<Block>,
    },
    OrderedList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attrs: Option<OrderedListAttrs>,
        #[serde(default)]
        content: Vec<Block>,
    },
    ListItem {
        #[serde(default)]
        content: Vec<Block>,
    },
}

/// The `type` tag of a block, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph,
    Heading,
    CodeBlock,
    Blockquote,
    BulletList,
    OrderedList,
    ListItem,
}

impl BlockKind {
    pub const ALL: [BlockKind; 7] = [
        Self::Paragraph,
        Self::Heading,
        Self::CodeBlock,
        Self::Blockquote,
        Self::BulletList,
        Self::OrderedList,
        Self::ListItem,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paragraph => "paragraph",
            Self::Heading => "heading",
            Self::CodeBlock => "code_block",
            Self::Blockquote => "blockquote",
            Self::BulletList => "bullet_list",
            Self::OrderedList => "ordered_list",
            Self::ListItem => "list_item",
        }
    }

    pub const fn is_text_block(self) -> bool {
        matches!(self, Self::Paragraph | Self::Heading | Self::CodeBlock)
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockKind {
    type Err = UnknownName;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value).ok_or(UnknownName)
    }
}

impl Block {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph { content: runs_from(text.into()) }
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self::Heading { attrs: HeadingAttrs { level }, content: runs_from(text.into()) }
    }

    pub fn code_block(text: impl Into<String>) -> Self {
        Self::CodeBlock { attrs: CodeBlockAttrs::default(), content: runs_from(text.into()) }
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Paragraph { .. } => BlockKind::Paragraph,
            Self::Heading { .. } => BlockKind::Heading,
            Self::CodeBlock { .. } => BlockKind::CodeBlock,
            Self::Blockquote { .. } => BlockKind::Blockquote,
            Self::BulletList { .. } => BlockKind::BulletList,
            Self::OrderedList { .. } => BlockKind::OrderedList,
            Self::ListItem { .. } => BlockKind::ListItem,
        }
    }

    /// Text runs of a text block; `None` for containers.
    pub fn runs(&self) -> Option<&[TextRun]> {
        match self {
            Self::Paragraph { content }
            | Self::Heading { content, .. }
            | Self::CodeBlock { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn runs_mut(&mut self) -> Option<&mut Vec<TextRun>> {
        match self {
            Self::Paragraph { content }
            | Self::Heading { content, .. }
            | Self::CodeBlock { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Child blocks of a container; `None` for text blocks.
    pub fn children(&self) -> Option<&[Block]> {
        match self {
            Self::Blockquote { content }
            | Self::BulletList { content }
            | Self::OrderedList { content, .. }
            | Self::ListItem { content } => Some(content),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Block>> {
        match self {
            Self::Blockquote { content }
            | Self::BulletList { content }
            | Self::OrderedList { content, .. }
            | Self::ListItem { content } => Some(content),
            _ => None,
        }
    }

    /// Concatenated text of every run below this block.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(runs) = self.runs() {
            for run in runs {
                out.push_str(&run.text);
            }
        }
        if let Some(children) = self.children() {
            for child in children {
                child.collect_text(out);
            }
        }
    }
}

fn runs_from(text: String) -> Vec<TextRun> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![TextRun::plain(text)]
    }
}

// ── Paths ───────────────────────────────────────────────────────────

/// Index path from the document root to a node, e.g. `[1, 0, 2]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Path of the parent node (empty for top-level blocks).
    pub fn parent(&self) -> &[usize] {
        match self.0.split_last() {
            Some((_, parent)) => parent,
            None => &[],
        }
    }

    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|index| index.to_string()).collect();
        write!(f, "/{}", parts.join("/"))
    }
}

// ── Document ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum DocTag {
    #[default]
    Doc,
}

/// Root of the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "type", default)]
    tag: DocTag,
    #[serde(default)]
    pub content: Vec<Block>,
}

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("malformed document JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("heading at {path} has level {level}, expected 1..=6")]
    InvalidHeadingLevel { path: NodePath, level: u8 },
    #[error("{parent} at {path} may only contain list_item blocks, found {found}")]
    UnexpectedListChild { path: NodePath, parent: BlockKind, found: BlockKind },
}

impl Document {
    pub fn new(content: Vec<Block>) -> Self {
        Self { tag: DocTag::Doc, content }
    }

    /// Deserializes and validates a tree supplied as JSON.
    pub fn from_value(value: Value) -> Result<Self, TreeError> {
        let doc: Self = serde_json::from_value(value)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn from_json_str(json: &str) -> Result<Self, TreeError> {
        let doc: Self = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn to_value(&self) -> Result<Value, TreeError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Checks the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), TreeError> {
        fn walk(blocks: &[Block], parent: &NodePath) -> Result<(), TreeError> {
            for (index, block) in blocks.iter().enumerate() {
                let path = parent.child(index);
                match block {
                    Block::Heading { attrs, .. } if !(1..=6).contains(&attrs.level) => {
                        return Err(TreeError::InvalidHeadingLevel { path, level: attrs.level });
                    }
                    Block::BulletList { content } | Block::OrderedList { content, .. } => {
                        if let Some(bad) = content.iter().find(|c| c.kind() != BlockKind::ListItem) {
                            return Err(TreeError::UnexpectedListChild {
                                path,
                                parent: block.kind(),
                                found: bad.kind(),
                            });
                        }
                    }
                    _ => {}
                }
                if let Some(children) = block.children() {
                    walk(children, &path)?;
                }
            }
            Ok(())
        }

        walk(&self.content, &NodePath::default())
    }

    pub fn block(&self, path: &NodePath) -> Option<&Block> {
        let (first, rest) = path.indices().split_first()?;
        let mut block = self.content.get(*first)?;
        for index in rest {
            block = block.children()?.get(*index)?;
        }
        Some(block)
    }

    pub fn block_mut(&mut self, path: &NodePath) -> Option<&mut Block> {
        let (first, rest) = path.indices().split_first()?;
        let mut block = self.content.get_mut(*first)?;
        for index in rest {
            block = block.children_mut()?.get_mut(*index)?;
        }
        Some(block)
    }

    /// The child list holding the node at `parent/<index>`.
    pub(crate) fn siblings_mut(&mut self, parent: &[usize]) -> Option<&mut Vec<Block>> {
        if parent.is_empty() {
            return Some(&mut self.content);
        }
        self.block_mut(&NodePath::new(parent.to_vec()))?.children_mut()
    }

    /// Every text block in document order, with its path.
    pub fn text_blocks(&self) -> Vec<(NodePath, &Block)> {
        fn walk<'a>(blocks: &'a [Block], parent: &NodePath, out: &mut Vec<(NodePath, &'a Block)>) {
            for (index, block) in blocks.iter().enumerate() {
                let path = parent.child(index);
                if block.kind().is_text_block() {
                    out.push((path, block));
                } else if let Some(children) = block.children() {
                    walk(children, &path, out);
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.content, &NodePath::default(), &mut out);
        out
    }

    /// Concatenation of all run text, block boundaries contributing nothing.
    pub fn flat_text(&self) -> String {
        self.content.iter().map(Block::text).collect()
    }

    /// Removes the block at `path`, then every ancestor container the
    /// removal left without children. Containers that were already empty
    /// are left alone.
    pub(crate) fn remove_block(&mut self, path: &NodePath) -> Option<Block> {
        let index = path.last()?;
        let siblings = self.siblings_mut(path.parent())?;
        if index >= siblings.len() {
            return None;
        }
        let removed = siblings.remove(index);

        let mut ancestor = path.parent();
        while let Some((&last, parent)) = ancestor.split_last() {
            let emptied = self
                .block(&NodePath::new(ancestor.to_vec()))
                .and_then(Block::children)
                .is_some_and(<[Block]>::is_empty);
            if !emptied {
                break;
            }
            if let Some(siblings) = self.siblings_mut(parent) {
                siblings.remove(last);
            }
            ancestor = parent;
        }

        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_editor_json_and_serializes_it_back() {
        let value = json!({
            "type": "doc",
            "content": [
                {"type": "heading", "attrs": {"level": 2}, "content": [{"type": "text", "text": "Terms"}]},
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "The "},
                    {"type": "text", "text": "Plaintiff", "marks": [{"type": "bold"}]}
                ]}
            ]
        });

        let doc = Document::from_value(value.clone()).expect("document should parse");
        assert_eq!(doc.content.len(), 2);
        assert_eq!(doc.flat_text(), "TermsThe Plaintiff");
        assert_eq!(doc.to_value().unwrap(), value);
    }

    #[test]
    fn mark_sets_are_order_independent_and_deduplicated() {
        let value = json!([{"type": "italic"}, {"type": "bold"}, {"type": "italic"}]);
        let marks: MarkSet = serde_json::from_value(value).unwrap();

        assert_eq!(marks, MarkSet::from([Mark::Bold, Mark::Italic]));
        assert_eq!(
            serde_json::to_value(&marks).unwrap(),
            json!([{"type": "bold"}, {"type": "italic"}])
        );
    }

    #[test]
    fn rejects_heading_level_out_of_range() {
        let value = json!({
            "type": "doc",
            "content": [{"type": "heading", "attrs": {"level": 7}}]
        });

        let err = Document::from_value(value).unwrap_err();
        assert!(matches!(err, TreeError::InvalidHeadingLevel { level: 7, .. }));
    }

    #[test]
    fn rejects_list_with_non_item_children() {
        let value = json!({
            "type": "doc",
            "content": [{"type": "bullet_list", "content": [{"type": "paragraph"}]}]
        });

        let err = Document::from_value(value).unwrap_err();
        assert!(matches!(err, TreeError::UnexpectedListChild { found: BlockKind::Paragraph, .. }));
    }

    #[test]
    fn rejects_text_nodes_inside_containers() {
        let value = json!({
            "type": "doc",
            "content": [{"type": "blockquote", "content": [{"type": "text", "text": "x"}]}]
        });

        assert!(matches!(Document::from_value(value), Err(TreeError::Json(_))));
    }

    #[test]
    fn text_blocks_are_listed_in_document_order() {
        let doc = Document::new(vec![
            Block::paragraph("a"),
            Block::BulletList {
                content: vec![Block::ListItem { content: vec![Block::paragraph("b")] }],
            },
            Block::heading(1, "c"),
        ]);

        let paths: Vec<String> =
            doc.text_blocks().iter().map(|(path, _)| path.to_string()).collect();
        assert_eq!(paths, vec!["/0", "/1/0/0", "/2"]);
    }

    #[test]
    fn normalize_merges_equal_marks_and_drops_empty_runs() {
        let mut runs = vec![
            TextRun::plain("a"),
            TextRun::plain(""),
            TextRun::plain("b"),
            TextRun::new("c", MarkSet::from([Mark::Bold])),
            TextRun::new("d", MarkSet::from([Mark::Bold])),
        ];
        normalize_runs(&mut runs);

        assert_eq!(
            runs,
            vec![TextRun::plain("ab"), TextRun::new("cd", MarkSet::from([Mark::Bold]))]
        );
    }

    #[test]
    fn remove_block_collapses_emptied_ancestors_only() {
        let mut doc = Document::new(vec![
            Block::Blockquote { content: vec![] },
            Block::BulletList {
                content: vec![Block::ListItem { content: vec![Block::paragraph("gone")] }],
            },
            Block::paragraph("kept"),
        ]);
        let removed = doc.remove_block(&NodePath::new(vec![1, 0, 0]));

        assert_eq!(removed, Some(Block::paragraph("gone")));
        assert_eq!(
            doc.content,
            vec![Block::Blockquote { content: vec![] }, Block::paragraph("kept")]
        );
    }

    #[test]
    fn remove_block_keeps_ancestor_with_remaining_children() {
        let mut doc = Document::new(vec![Block::Blockquote {
            content: vec![Block::paragraph("one"), Block::paragraph("two")],
        }]);
        doc.remove_block(&NodePath::new(vec![0, 1]));

        assert_eq!(
            doc.content,
            vec![Block::Blockquote { content: vec![Block::paragraph("one")] }]
        );
        assert_eq!(doc.remove_block(&NodePath::new(vec![0, 5])), None);
    }

    #[test]
    fn mark_names_parse() {
        assert_eq!("strike".parse::<Mark>(), Ok(Mark::Strike));
        assert!("highlight".parse::<Mark>().is_err());
        assert_eq!("code_block".parse::<BlockKind>(), Ok(BlockKind::CodeBlock));
    }
}
