// Edit executors: request validation, run-level splicing and dispatch.

pub(crate) mod exec;
pub(crate) mod inline;
pub mod request;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::locate::LocateError;
use crate::tree::NodePath;

pub use request::{
    AddParagraphEdit, DeleteEdit, Disambiguation, EditRequest, InsertEdit, MarkEdit,
    ReplaceEdit, ReplaceMarkEdit, ValidationError,
};

/// Why an edit in a batch was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    NotFound,
    Ambiguous,
    CrossBlockLiteral,
    InvalidMarkType,
    InvalidParagraphType,
    InvalidHeadingLevel,
    InvalidRequest,
}

impl SkipReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::Ambiguous => "Ambiguous",
            Self::CrossBlockLiteral => "CrossBlockLiteral",
            Self::InvalidMarkType => "InvalidMarkType",
            Self::InvalidParagraphType => "InvalidParagraphType",
            Self::InvalidHeadingLevel => "InvalidHeadingLevel",
            Self::InvalidRequest => "InvalidRequest",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single edit. Never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Locate(#[from] LocateError),
    #[error("no text block at {0}")]
    PathNotFound(NodePath),
    #[error("span {start}..{end} is not inside a single text block")]
    SpanOutsideBlock { start: usize, end: usize },
}

impl EditError {
    pub fn reason(&self) -> SkipReason {
        match self {
            Self::Validation(err) => match err {
                ValidationError::InvalidMarkType(_) => SkipReason::InvalidMarkType,
                ValidationError::InvalidParagraphType(_) => SkipReason::InvalidParagraphType,
                ValidationError::InvalidHeadingLevel(_) | ValidationError::MissingHeadingLevel => {
                    SkipReason::InvalidHeadingLevel
                }
                _ => SkipReason::InvalidRequest,
            },
            Self::Locate(err) => match err {
                LocateError::NotFound { .. } | LocateError::OccurrenceOutOfRange { .. } => {
                    SkipReason::NotFound
                }
                LocateError::Ambiguous { .. } | LocateError::ContradictoryContext { .. } => {
                    SkipReason::Ambiguous
                }
                LocateError::CrossBlockLiteral { .. } => SkipReason::CrossBlockLiteral,
            },
            Self::PathNotFound(_) => SkipReason::NotFound,
            Self::SpanOutsideBlock { .. } => SkipReason::CrossBlockLiteral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reasons_serialize_as_pascal_case() {
        assert_eq!(serde_json::to_value(SkipReason::NotFound).unwrap(), "NotFound");
        assert_eq!(serde_json::to_value(SkipReason::InvalidHeadingLevel).unwrap(), "InvalidHeadingLevel");
        assert_eq!(SkipReason::Ambiguous.to_string(), "Ambiguous");
    }

    #[test]
    fn locate_errors_map_to_skip_reasons() {
        let literal = || "x".to_string();
        let cases = [
            (LocateError::NotFound { literal: literal() }, SkipReason::NotFound),
            (
                LocateError::OccurrenceOutOfRange { literal: literal(), requested: 3, available: 1 },
                SkipReason::NotFound,
            ),
            (LocateError::Ambiguous { literal: literal(), count: 2 }, SkipReason::Ambiguous),
            (LocateError::ContradictoryContext { literal: literal() }, SkipReason::Ambiguous),
            (LocateError::CrossBlockLiteral { literal: literal() }, SkipReason::CrossBlockLiteral),
        ];
        for (err, reason) in cases {
            assert_eq!(EditError::from(err).reason(), reason);
        }
    }

    #[test]
    fn validation_errors_map_to_skip_reasons() {
        assert_eq!(
            EditError::from(ValidationError::MissingHeadingLevel).reason(),
            SkipReason::InvalidHeadingLevel
        );
        assert_eq!(
            EditError::from(ValidationError::ZeroOccurrenceIndex).reason(),
            SkipReason::InvalidRequest
        );
        assert_eq!(
            EditError::from(ValidationError::InvalidParagraphType("table".into())).reason(),
            SkipReason::InvalidParagraphType
        );
    }
}
