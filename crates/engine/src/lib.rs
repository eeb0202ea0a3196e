// docpatch-engine: locates text in a rich-text document tree and applies
// structured edits and anchor-bounded rewrites to it.

pub mod config;
pub mod edit;
pub mod engine;
pub mod error;
pub mod locate;
pub mod merge;
pub mod tree;

pub use config::EngineConfig;
pub use edit::{EditRequest, SkipReason};
pub use engine::{apply_edits, rewrite_section, EditWarning, PatchEngine, PatchResult, SkippedEdit};
pub use error::PatchError;
pub use locate::{LocatorQuery, Span};
pub use merge::{AnchorPair, DiffSummary};
pub use tree::{Block, Document, Mark, MarkSet, TextRun};
