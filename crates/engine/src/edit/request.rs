// Edit requests as supplied by the caller, and their validation.
//
// Wire shape: `{"type":"replace","findText":"...","replaceText":"...",
// "occurrenceIndex":2}`. Validation turns a request into a `PlannedEdit`
// with parsed mark and block types; it never looks at the tree.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::locate::LocatorQuery;
use crate::tree::{Block, BlockKind, Mark, OrderedListAttrs};

/// Context and occurrence options shared by every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disambiguation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_occurrences: Option<usize>,
}

impl Disambiguation {
    pub fn occurrence(index: usize) -> Self {
        Self { occurrence_index: Some(index), ..Self::default() }
    }

    fn query(&self, literal: &str) -> LocatorQuery {
        LocatorQuery {
            literal: literal.to_string(),
            context_before: self.context_before.clone(),
            context_after: self.context_after.clone(),
            occurrence_index: self.occurrence_index,
            max_occurrences: self.max_occurrences,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.occurrence_index == Some(0) {
            return Err(ValidationError::ZeroOccurrenceIndex);
        }
        if self.max_occurrences == Some(0) {
            return Err(ValidationError::ZeroMaxOccurrences);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceEdit {
    pub find_text: String,
    pub replace_text: String,
    #[serde(default)]
    pub replace_all: bool,
    #[serde(flatten)]
    pub target: Disambiguation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertEdit {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_text: Option<String>,
    #[serde(flatten)]
    pub target: Disambiguation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEdit {
    pub delete_text: String,
    #[serde(flatten)]
    pub target: Disambiguation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkEdit {
    pub text: String,
    pub mark_type: String,
    #[serde(flatten)]
    pub target: Disambiguation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceMarkEdit {
    pub text: String,
    pub old_mark_type: String,
    pub new_mark_type: String,
    #[serde(flatten)]
    pub target: Disambiguation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddParagraphEdit {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_text: Option<String>,
    #[serde(flatten)]
    pub target: Disambiguation,
}

/// One requested edit. Consumed once, in batch order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditRequest {
    Replace(ReplaceEdit),
    Insert(InsertEdit),
    Delete(DeleteEdit),
    AddMark(MarkEdit),
    RemoveMark(MarkEdit),
    ReplaceMark(ReplaceMarkEdit),
    AddParagraph(AddParagraphEdit),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported mark type {0:?}")]
    InvalidMarkType(String),
    #[error("unsupported paragraph type {0:?}")]
    InvalidParagraphType(String),
    #[error("heading level must be between 1 and 6, got {0}")]
    InvalidHeadingLevel(u32),
    #[error("heading paragraphs require headingLevel")]
    MissingHeadingLevel,
    #[error("{field} must not be empty")]
    EmptyText { field: &'static str },
    #[error("occurrenceIndex is 1-based and must be at least 1")]
    ZeroOccurrenceIndex,
    #[error("maxOccurrences must be at least 1")]
    ZeroMaxOccurrences,
    #[error("exactly one of afterText or beforeText is required")]
    AnchorRequired,
    #[error("afterText and beforeText are mutually exclusive")]
    ConflictingAnchors,
}

/// Which end of an anchor span an insertion attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AnchorEnd {
    After,
    Before,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkChange {
    Add(Mark),
    Remove(Mark),
    Swap { old: Mark, new: Mark },
}

impl MarkChange {
    pub(crate) fn apply(self, marks: &mut crate::tree::MarkSet) {
        match self {
            Self::Add(mark) => {
                marks.insert(mark);
            }
            Self::Remove(mark) => {
                marks.remove(mark);
            }
            Self::Swap { old, new } => {
                marks.remove(old);
                marks.insert(new);
            }
        }
    }
}

/// A validated request, ready to run against a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlannedEdit {
    Replace { query: LocatorQuery, replacement: String, replace_all: bool },
    Insert { side: AnchorEnd, query: LocatorQuery, text: String },
    Delete { query: LocatorQuery },
    Mark { query: LocatorQuery, change: MarkChange },
    AddParagraph { anchor: Option<(AnchorEnd, LocatorQuery)>, block: Block },
}

impl EditRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Replace(_) => "replace",
            Self::Insert(_) => "insert",
            Self::Delete(_) => "delete",
            Self::AddMark(_) => "add_mark",
            Self::RemoveMark(_) => "remove_mark",
            Self::ReplaceMark(_) => "replace_mark",
            Self::AddParagraph(_) => "add_paragraph",
        }
    }

    fn target(&self) -> &Disambiguation {
        match self {
            Self::Replace(edit) => &edit.target,
            Self::Insert(edit) => &edit.target,
            Self::Delete(edit) => &edit.target,
            Self::AddMark(edit) | Self::RemoveMark(edit) => &edit.target,
            Self::ReplaceMark(edit) => &edit.target,
            Self::AddParagraph(edit) => &edit.target,
        }
    }

    /// Non-fatal oddities worth reporting back to the caller.
    pub fn warnings(&self) -> Vec<String> {
        let target = self.target();
        let mut warnings = Vec::new();
        if let (Some(index), Some(max)) = (target.occurrence_index, target.max_occurrences) {
            warnings.push(format!(
                "occurrenceIndex {index} overrides maxOccurrences {max}; only one occurrence is edited"
            ));
        }
        if let Self::Replace(edit) = self {
            if edit.replace_all
                && (target.occurrence_index.is_some() || target.max_occurrences.is_some())
            {
                warnings.push(
                    "replaceAll ignores occurrenceIndex and maxOccurrences".to_string(),
                );
            }
        }
        if let Self::AddParagraph(edit) = self {
            let is_heading = edit.paragraph_type.as_deref() == Some("heading");
            if edit.heading_level.is_some() && !is_heading {
                warnings.push("headingLevel is ignored for non-heading paragraphs".to_string());
            }
        }
        warnings
    }

    pub(crate) fn validate(&self) -> Result<PlannedEdit, ValidationError> {
        let target = self.target();
        target.validate()?;

        match self {
            Self::Replace(edit) => Ok(PlannedEdit::Replace {
                query: target.query(required(&edit.find_text, "findText")?),
                replacement: edit.replace_text.clone(),
                replace_all: edit.replace_all,
            }),
            Self::Insert(edit) => {
                let (side, anchor) = match (&edit.after_text, &edit.before_text) {
                    (Some(after), None) => (AnchorEnd::After, after),
                    (None, Some(before)) => (AnchorEnd::Before, before),
                    (Some(_), Some(_)) => return Err(ValidationError::ConflictingAnchors),
                    (None, None) => return Err(ValidationError::AnchorRequired),
                };
                let field = match side {
                    AnchorEnd::After => "afterText",
                    AnchorEnd::Before => "beforeText",
                };
                Ok(PlannedEdit::Insert {
                    side,
                    query: target.query(required(anchor, field)?),
                    text: required(&edit.text, "text")?.to_string(),
                })
            }
            Self::Delete(edit) => Ok(PlannedEdit::Delete {
                query: target.query(required(&edit.delete_text, "deleteText")?),
            }),
            Self::AddMark(edit) => Ok(PlannedEdit::Mark {
                query: target.query(required(&edit.text, "text")?),
                change: MarkChange::Add(parse_mark(&edit.mark_type)?),
            }),
            Self::RemoveMark(edit) => Ok(PlannedEdit::Mark {
                query: target.query(required(&edit.text, "text")?),
                change: MarkChange::Remove(parse_mark(&edit.mark_type)?),
            }),
            Self::ReplaceMark(edit) => {
                let old = parse_mark(&edit.old_mark_type)?;
                let new = parse_mark(&edit.new_mark_type)?;
                Ok(PlannedEdit::Mark {
                    query: target.query(required(&edit.text, "text")?),
                    change: MarkChange::Swap { old, new },
                })
            }
            Self::AddParagraph(edit) => {
                let block = build_block(edit)?;
                let anchor = match (&edit.after_text, &edit.before_text) {
                    (Some(_), Some(_)) => return Err(ValidationError::ConflictingAnchors),
                    (Some(after), None) => {
                        Some((AnchorEnd::After, target.query(required(after, "afterText")?)))
                    }
                    (None, Some(before)) => {
                        Some((AnchorEnd::Before, target.query(required(before, "beforeText")?)))
                    }
                    (None, None) => None,
                };
                Ok(PlannedEdit::AddParagraph { anchor, block })
            }
        }
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    if value.is_empty() {
        Err(ValidationError::EmptyText { field })
    } else {
        Ok(value)
    }
}

fn parse_mark(name: &str) -> Result<Mark, ValidationError> {
    name.parse().map_err(|_| ValidationError::InvalidMarkType(name.to_string()))
}

/// Builds the block an `add_paragraph` request inserts.
fn build_block(edit: &AddParagraphEdit) -> Result<Block, ValidationError> {
    let name = edit.paragraph_type.as_deref().unwrap_or("paragraph");
    let kind: BlockKind =
        name.parse().map_err(|_| ValidationError::InvalidParagraphType(name.to_string()))?;
    let content = edit.content.clone();

    let block = match kind {
        BlockKind::Paragraph => Block::paragraph(content),
        BlockKind::Heading => {
            let level = edit.heading_level.ok_or(ValidationError::MissingHeadingLevel)?;
            if !(1..=6).contains(&level) {
                return Err(ValidationError::InvalidHeadingLevel(level));
            }
            Block::heading(level as u8, content)
        }
        BlockKind::CodeBlock => Block::code_block(content),
        BlockKind::Blockquote => Block::Blockquote { content: vec![Block::paragraph(content)] },
        BlockKind::BulletList => Block::BulletList {
            content: vec![Block::ListItem { content: vec![Block::paragraph(content)] }],
        },
        BlockKind::OrderedList => Block::OrderedList {
            attrs: Some(OrderedListAttrs { start: 1 }),
            content: vec![Block::ListItem { content: vec![Block::paragraph(content)] }],
        },
        BlockKind::ListItem => {
            return Err(ValidationError::InvalidParagraphType(name.to_string()));
        }
    };
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> EditRequest {
        serde_json::from_value(value).expect("request should deserialize")
    }

    #[test]
    fn deserializes_camel_case_wire_shape() {
        let request = parse(json!({
            "type": "replace",
            "findText": "Plaintiff",
            "replaceText": "Claimant",
            "contextBefore": "the",
            "occurrenceIndex": 2
        }));

        let EditRequest::Replace(edit) = &request else {
            panic!("expected replace, got {request:?}");
        };
        assert_eq!(edit.find_text, "Plaintiff");
        assert!(!edit.replace_all);
        assert_eq!(edit.target.context_before.as_deref(), Some("the"));
        assert_eq!(edit.target.occurrence_index, Some(2));
        assert_eq!(request.kind(), "replace");
    }

    #[test]
    fn all_kinds_roundtrip_through_json() {
        let requests = vec![
            json!({"type": "insert", "text": " now", "afterText": "filed"}),
            json!({"type": "delete", "deleteText": "hereby "}),
            json!({"type": "add_mark", "text": "Buyer", "markType": "bold"}),
            json!({"type": "remove_mark", "text": "Buyer", "markType": "italic", "maxOccurrences": 3}),
            json!({"type": "replace_mark", "text": "x", "oldMarkType": "bold", "newMarkType": "underline"}),
            json!({"type": "add_paragraph", "content": "New", "paragraphType": "heading", "headingLevel": 2, "beforeText": "Terms"}),
        ];

        for value in requests {
            let request = parse(value.clone());
            assert_eq!(serde_json::to_value(&request).unwrap(), value);
        }
    }

    #[test]
    fn unknown_kind_is_rejected_by_serde() {
        let result: Result<EditRequest, _> =
            serde_json::from_value(json!({"type": "spellcheck", "text": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn invalid_mark_type_fails_validation() {
        let request = parse(json!({"type": "add_mark", "text": "x", "markType": "highlight"}));
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::InvalidMarkType("highlight".into())
        );
    }

    #[test]
    fn replace_mark_validates_both_marks_up_front() {
        let request = parse(json!({
            "type": "replace_mark", "text": "x", "oldMarkType": "bold", "newMarkType": "glow"
        }));
        assert_eq!(request.validate().unwrap_err(), ValidationError::InvalidMarkType("glow".into()));
    }

    #[test]
    fn heading_level_is_checked_at_validation() {
        let request = parse(json!({
            "type": "add_paragraph", "content": "H", "paragraphType": "heading", "headingLevel": 7
        }));
        assert_eq!(request.validate().unwrap_err(), ValidationError::InvalidHeadingLevel(7));

        let request = parse(json!({"type": "add_paragraph", "paragraphType": "heading"}));
        assert_eq!(request.validate().unwrap_err(), ValidationError::MissingHeadingLevel);
    }

    #[test]
    fn unknown_paragraph_type_is_rejected() {
        let request = parse(json!({"type": "add_paragraph", "paragraphType": "table"}));
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::InvalidParagraphType("table".into())
        );
    }

    #[test]
    fn insert_needs_exactly_one_anchor() {
        let both = parse(json!({"type": "insert", "text": "x", "afterText": "a", "beforeText": "b"}));
        assert_eq!(both.validate().unwrap_err(), ValidationError::ConflictingAnchors);

        let neither = parse(json!({"type": "insert", "text": "x"}));
        assert_eq!(neither.validate().unwrap_err(), ValidationError::AnchorRequired);
    }

    #[test]
    fn zero_occurrence_index_and_empty_literal_are_invalid() {
        let request = parse(json!({"type": "delete", "deleteText": "x", "occurrenceIndex": 0}));
        assert_eq!(request.validate().unwrap_err(), ValidationError::ZeroOccurrenceIndex);

        let request = parse(json!({"type": "delete", "deleteText": ""}));
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::EmptyText { field: "deleteText" }
        );
    }

    #[test]
    fn add_paragraph_defaults_to_empty_paragraph_at_end() {
        let request = parse(json!({"type": "add_paragraph"}));
        assert_eq!(
            request.validate().unwrap(),
            PlannedEdit::AddParagraph { anchor: None, block: Block::Paragraph { content: vec![] } }
        );
    }

    #[test]
    fn warns_when_occurrence_index_and_cap_are_both_given() {
        let request = parse(json!({
            "type": "delete", "deleteText": "x", "occurrenceIndex": 1, "maxOccurrences": 3
        }));
        let warnings = request.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("overrides maxOccurrences"));
    }
}
