// Consistent exit codes for the docpatch CLI.
//
//   0 = success
//   1 = general error
//   2 = usage/input error (bad arguments, unreadable requests or config)
//   3 = partial: some edits were skipped, or a locate query did not resolve
//   4 = rejected: malformed document tree or unresolvable rewrite

use std::process;

use docpatch_engine::config::ConfigError;
use docpatch_engine::tree::TreeError;
use docpatch_engine::{PatchError, PatchResult};

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    Partial = 3,
    Rejected = 4,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Success, or `Partial` when any edit was skipped.
    pub fn for_result(result: &PatchResult) -> Self {
        if result.is_partial() {
            Self::Partial
        } else {
            Self::Success
        }
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if cause.downcast_ref::<PatchError>().is_some()
                || cause.downcast_ref::<TreeError>().is_some()
            {
                return Self::Rejected;
            }
            if cause.downcast_ref::<serde_json::Error>().is_some()
                || cause.downcast_ref::<ConfigError>().is_some()
            {
                return Self::Usage;
            }
        }

        Self::Error
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}
