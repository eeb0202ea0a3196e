// Batch orchestration: runs edit requests in order against a working copy of
// the tree and reports what was applied and what was skipped.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::edit::{exec, EditError, EditRequest, SkipReason};
use crate::error::PatchError;
use crate::locate::{describe_occurrences, LocateError, LocatorQuery, Occurrence};
use crate::merge::{self, AnchorPair, DiffSummary};
use crate::tree::{project, Document};

/// An edit that was not applied, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEdit {
    /// Position of the request in the batch (0-based).
    pub index: usize,
    pub reason: SkipReason,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditWarning {
    pub index: usize,
    pub message: String,
}

/// Outcome of a batch or a rewrite, including the resulting tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchResult {
    pub ok: bool,
    pub applied_count: usize,
    #[serde(default)]
    pub skipped: Vec<SkippedEdit>,
    #[serde(default)]
    pub warnings: Vec<EditWarning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffSummary>,
    pub tree: Document,
}

impl PatchResult {
    /// True when at least one request was skipped.
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PatchEngine {
    config: EngineConfig,
}

impl PatchEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Applies `edits` in order. Each edit sees the tree as left by the
    /// previous ones; a failing edit is skipped and the batch continues.
    pub fn apply_edits(
        &self,
        doc: &Document,
        edits: &[EditRequest],
    ) -> Result<PatchResult, PatchError> {
        doc.validate()?;
        let mut tree = doc.clone();
        let mut applied_count = 0;
        let mut skipped = Vec::new();
        let mut warnings = Vec::new();

        for (index, edit) in edits.iter().enumerate() {
            let kind = edit.kind();
            for message in edit.warnings() {
                warn!(index, kind, %message, "conflicting edit options");
                warnings.push(EditWarning { index, message });
            }

            let outcome = edit
                .validate()
                .map_err(EditError::from)
                .and_then(|planned| exec::execute(&mut tree, &planned, &self.config));

            match outcome {
                Ok(spans) => {
                    debug!(index, kind, spans = ?spans, "edit applied");
                    applied_count += 1;
                }
                Err(error) => {
                    let reason = error.reason();
                    warn!(index, kind, %reason, %error, "edit skipped");
                    skipped.push(SkippedEdit { index, reason, message: error.to_string() });
                }
            }
        }

        info!(
            edits = edits.len(),
            applied = applied_count,
            skipped = skipped.len(),
            "edit batch finished"
        );

        Ok(PatchResult { ok: true, applied_count, skipped, warnings, diff: None, tree })
    }

    /// Rewrites the region bounded by `anchors` so that it reads `target`,
    /// keeping marks and block structure of the unchanged tokens.
    pub fn rewrite_section(
        &self,
        doc: &Document,
        anchors: &AnchorPair,
        target: &str,
    ) -> Result<PatchResult, PatchError> {
        doc.validate()?;
        let mut tree = doc.clone();
        let summary = merge::merge_region(&mut tree, anchors, target, &self.config)
            .inspect_err(|error| warn!(%error, "rewrite rejected"))?;

        info!(
            equal = summary.equal_tokens,
            deleted = summary.deleted_tokens,
            inserted = summary.inserted_tokens,
            changed_runs = summary.changed_runs,
            "section rewritten"
        );

        Ok(PatchResult {
            ok: true,
            applied_count: summary.changed_runs,
            skipped: Vec::new(),
            warnings: Vec::new(),
            diff: Some(summary),
            tree,
        })
    }

    /// Current text of the region `anchors` would rewrite.
    pub fn region_text(&self, doc: &Document, anchors: &AnchorPair) -> Result<String, PatchError> {
        Ok(merge::region_text(doc, anchors, &self.config)?)
    }

    /// Candidates for `query` with surrounding text, for building a more
    /// specific request after an ambiguous skip.
    pub fn occurrences(
        &self,
        doc: &Document,
        query: &LocatorQuery,
    ) -> Result<Vec<Occurrence>, LocateError> {
        describe_occurrences(&project(doc), query, &self.config)
    }
}

/// [`PatchEngine::apply_edits`] with the default configuration.
pub fn apply_edits(doc: &Document, edits: &[EditRequest]) -> Result<PatchResult, PatchError> {
    PatchEngine::default().apply_edits(doc, edits)
}

/// [`PatchEngine::rewrite_section`] with the default configuration.
pub fn rewrite_section(
    doc: &Document,
    anchors: &AnchorPair,
    target: &str,
) -> Result<PatchResult, PatchError> {
    PatchEngine::default().rewrite_section(doc, anchors, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::RewriteError;
    use crate::tree::Block;
    use serde_json::json;

    fn edits(value: serde_json::Value) -> Vec<EditRequest> {
        serde_json::from_value(value).expect("edits should deserialize")
    }

    #[test]
    fn input_tree_is_never_mutated() {
        let doc = Document::new(vec![Block::paragraph("keep me")]);
        let result =
            apply_edits(&doc, &edits(json!([{"type": "delete", "deleteText": "keep "}]))).unwrap();

        assert_eq!(doc.flat_text(), "keep me");
        assert_eq!(result.tree.flat_text(), "me");
    }

    #[test]
    fn skipped_edit_is_reported_and_batch_continues() {
        let doc = Document::new(vec![Block::paragraph("alpha beta")]);
        let result = apply_edits(
            &doc,
            &edits(json!([
                {"type": "add_mark", "text": "alpha", "markType": "sparkle"},
                {"type": "replace", "findText": "beta", "replaceText": "gamma"}
            ])),
        )
        .unwrap();

        assert!(result.ok);
        assert!(result.is_partial());
        assert_eq!(result.applied_count, 1);
        assert_eq!(result.skipped[0].index, 0);
        assert_eq!(result.skipped[0].reason, SkipReason::InvalidMarkType);
        assert_eq!(result.tree.flat_text(), "alpha gamma");
    }

    #[test]
    fn warnings_carry_the_edit_index() {
        let doc = Document::new(vec![Block::paragraph("x y x")]);
        let result = apply_edits(
            &doc,
            &edits(json!([
                {"type": "delete", "deleteText": "y"},
                {"type": "delete", "deleteText": "x", "occurrenceIndex": 2, "maxOccurrences": 2}
            ])),
        )
        .unwrap();

        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].index, 1);
        assert_eq!(result.tree.flat_text(), "x  ");
    }

    #[test]
    fn result_serializes_in_camel_case() {
        let doc = Document::new(vec![Block::paragraph("a")]);
        let result =
            apply_edits(&doc, &edits(json!([{"type": "delete", "deleteText": "zzz"}]))).unwrap();
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["ok"], json!(true));
        assert_eq!(value["appliedCount"], json!(0));
        assert_eq!(value["skipped"][0]["reason"], json!("NotFound"));
        assert!(value.get("diff").is_none());
        assert_eq!(value["tree"]["type"], json!("doc"));
    }

    #[test]
    fn rewrite_reports_diff_summary() {
        let doc = Document::new(vec![Block::paragraph("one two three")]);
        let result = rewrite_section(&doc, &AnchorPair::default(), "one 2 three").unwrap();

        let diff = result.diff.expect("rewrite carries a diff summary");
        assert_eq!(diff.deleted_tokens, 1);
        assert_eq!(diff.inserted_tokens, 1);
        assert_eq!(result.applied_count, 2);
        assert_eq!(result.tree.flat_text(), "one 2 three");
    }

    #[test]
    fn rewrite_failure_is_an_error() {
        let doc = Document::new(vec![Block::paragraph("one two")]);
        let err = rewrite_section(&doc, &AnchorPair::after("zero"), "x").unwrap_err();
        assert!(matches!(err, PatchError::Rewrite(RewriteError::Anchor { .. })));
    }

    #[test]
    fn malformed_tree_is_rejected_up_front() {
        let doc = Document::new(vec![Block::BulletList { content: vec![Block::paragraph("x")] }]);
        assert!(matches!(apply_edits(&doc, &[]), Err(PatchError::Tree(_))));
    }

    #[test]
    fn occurrences_describe_each_candidate() {
        let doc = Document::new(vec![Block::paragraph("the contract"), Block::paragraph("a contract")]);
        let found = PatchEngine::default()
            .occurrences(&doc, &LocatorQuery::new("contract"))
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].before, "a ");
    }
}
