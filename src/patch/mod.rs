//! Turning free-form model output into an applicable unified diff.

pub mod apply;
pub mod extract;

pub use apply::{apply_patch, PatchError};
pub use extract::{extract_diff, normalize_dev_null, UnifiedDiff};

/// Header that opens every file section of a git-style diff.
pub const FILE_PAIR_MARKER: &str = "diff --git ";

/// Old-file header of a plain (non-git) unified diff.
pub const LEGACY_MARKER: &str = "--- ";

/// Canonical old-file header for files created by the patch.
pub const DEV_NULL_HEADER: &str = "--- /dev/null";
