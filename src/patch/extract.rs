use std::fmt;

use super::{DEV_NULL_HEADER, FILE_PAIR_MARKER, LEGACY_MARKER};

/// Diff text produced from model output, normalized and newline-terminated.
///
/// Construction never fails: whether the text is actually a patch is decided
/// by [`UnifiedDiff::looks_like_patch`] right before it is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedDiff(String);

impl UnifiedDiff {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the model answered with nothing but whitespace and fences.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Structural precondition for handing the text to `git apply`.
    pub fn looks_like_patch(&self) -> bool {
        self.0.contains(FILE_PAIR_MARKER) || self.0.trim_start().starts_with(LEGACY_MARKER)
    }

    /// Number of `@@` hunk headers.
    pub fn hunk_count(&self) -> usize {
        self.0.lines().filter(|l| l.starts_with("@@")).count()
    }

    /// Paths named on `+++ b/<path>` lines, in order of appearance.
    pub fn touched_paths(&self) -> Vec<&str> {
        self.0
            .lines()
            .filter_map(|l| l.strip_prefix("+++ "))
            .map(|p| p.split('\t').next().unwrap_or(p).trim())
            .filter(|p| *p != "/dev/null")
            .map(|p| p.strip_prefix("b/").unwrap_or(p))
            .collect()
    }
}

impl fmt::Display for UnifiedDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Isolate the diff portion of `text` and canonicalize its `/dev/null` headers.
///
/// Fence lines are dropped first. The result starts at the first
/// `diff --git ` marker, else at the first `--- ` marker, else it is the whole
/// fence-stripped text.
pub fn extract_diff(text: &str) -> UnifiedDiff {
    let stripped = strip_fences(text);

    let located = if let Some(idx) = stripped.find(FILE_PAIR_MARKER) {
        &stripped[idx..]
    } else if let Some(idx) = stripped.find(LEGACY_MARKER) {
        tracing::debug!("No file-pair header in model output, using legacy '--- ' marker");
        &stripped[idx..]
    } else {
        tracing::debug!("No diff marker in model output, passing text through");
        stripped.as_str()
    };

    UnifiedDiff(normalize_dev_null(&terminate(located)))
}

/// Rewrite every spelling of a missing old file to `--- /dev/null`.
///
/// Accepted spellings: `/dev/null`, `dev/null`, `./dev/null`, `a/dev/null`,
/// backslash variants and any path ending in `/dev/null`. Other lines are
/// kept byte for byte.
pub fn normalize_dev_null(diff: &str) -> String {
    let lines: Vec<&str> = diff
        .lines()
        .map(|line| {
            if is_dev_null_old_header(line) {
                DEV_NULL_HEADER
            } else {
                line
            }
        })
        .collect();

    terminate(&lines.join("\n"))
}

fn is_dev_null_old_header(line: &str) -> bool {
    let Some(rhs) = line.trim().strip_prefix(LEGACY_MARKER) else {
        return false;
    };
    // Drop a trailing timestamp (`--- /dev/null\t1970-01-01 ...`).
    let rhs = rhs.split('\t').next().unwrap_or(rhs).trim();
    let rhs = rhs.replace('\\', "/");
    let rhs = rhs.trim_start_matches(['.', '/']);

    rhs == "dev/null" || rhs.ends_with("/dev/null")
}

fn strip_fences(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let kept: Vec<&str> = unified
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect();
    terminate(&kept.join("\n"))
}

/// Exactly one trailing newline. Trailing spaces on the last line are kept:
/// a hunk may end in a blank context line.
fn terminate(text: &str) -> String {
    let mut out = text.trim_start().trim_end_matches('\n').to_string();
    out.push('\n');
    out
}
