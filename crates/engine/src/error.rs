// Errors that reject a whole engine call.
//
// Per-edit failures are not errors at this level: they become skipped
// entries of a `PatchResult` (see `edit::EditError`).

use thiserror::Error;

use crate::merge::RewriteError;
use crate::tree::TreeError;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("rewrite rejected: {0}")]
    Rewrite(#[from] RewriteError),
}
