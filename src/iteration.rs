//! Loop progress encoded as labels on the pull request.
//!
//! The label set is the only persisted state: one `agent:iter-<n>` label and
//! one status label. Both functions here are pure; the workflow loads the
//! labels, decides, and writes the whole set back on every step.

use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

pub const ITERATION_PREFIX: &str = "agent:iter-";

static ITERATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^agent:iter-(\d+)$").expect("iteration label pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IterationStatus {
    Running,
    Done,
    Stopped,
}

impl IterationStatus {
    pub const ALL: [IterationStatus; 3] = [
        IterationStatus::Running,
        IterationStatus::Done,
        IterationStatus::Stopped,
    ];

    pub fn label(self) -> &'static str {
        match self {
            IterationStatus::Running => "agent:running",
            IterationStatus::Done => "agent:done",
            IterationStatus::Stopped => "agent:stopped",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.label() == label)
    }

    /// Done and Stopped end the loop for a pull request.
    pub fn is_terminal(self) -> bool {
        !matches!(self, IterationStatus::Running)
    }
}

impl fmt::Display for IterationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn iteration_label(iteration: u32) -> String {
    format!("{ITERATION_PREFIX}{iteration}")
}

fn parse_iteration(label: &str) -> Option<u32> {
    ITERATION_RE
        .captures(label)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Highest iteration encoded in `labels`, `None` when there is none.
pub fn read_iteration<S: AsRef<str>>(labels: &[S]) -> Option<u32> {
    labels
        .iter()
        .filter_map(|l| parse_iteration(l.as_ref()))
        .max()
}

/// Status labels present in `labels`.
///
/// A well-formed set has at most one; several can appear after a human edit,
/// in which case a terminal status wins.
pub fn read_status<S: AsRef<str>>(labels: &[S]) -> Option<IterationStatus> {
    let present: Vec<IterationStatus> = labels
        .iter()
        .filter_map(|l| IterationStatus::from_label(l.as_ref()))
        .collect();

    present
        .iter()
        .copied()
        .find(|s| s.is_terminal())
        .or_else(|| present.first().copied())
}

/// Replace every iteration and status label in `labels`.
///
/// The iteration label is written only when `iteration` is `Some`. The result
/// is deduplicated and sorted, so calling this twice with the same arguments
/// gives the same set.
pub fn write_iteration<S: AsRef<str>>(
    labels: &[S],
    iteration: Option<u32>,
    status: IterationStatus,
) -> Vec<String> {
    let mut out: BTreeSet<String> = labels
        .iter()
        .map(|l| l.as_ref())
        .filter(|l| parse_iteration(l).is_none())
        .filter(|l| IterationStatus::from_label(l).is_none())
        .map(str::to_string)
        .collect();

    out.insert(status.label().to_string());
    if let Some(n) = iteration {
        out.insert(iteration_label(n));
    }

    out.into_iter().collect()
}
