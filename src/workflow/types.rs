use std::fmt;

use crate::platform::types::ReviewEvent;
use crate::review::Verdict;

/// Outcome of an issue-solving unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    /// Changes were pushed and a pull request is open for them.
    PullRequestOpened {
        number: u64,
        url: String,
        /// An open pull request for the branch already existed.
        reused: bool,
    },
    /// The model produced no change; an explanatory comment was posted.
    NoChanges,
}

/// What a feedback unit of work did with the pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackAction {
    /// Reviewer passed the change; tags set to done.
    Done,
    /// Iteration budget exhausted; tags set to stopped.
    StoppedMaxIterations,
    /// The fix produced no file changes; tags set to stopped.
    StoppedNoChanges,
    /// A fix was pushed and the iteration advanced.
    Advanced,
    /// The pull request was already done or stopped.
    AlreadyFinished,
}

impl fmt::Display for FeedbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FeedbackAction::Done => "done",
            FeedbackAction::StoppedMaxIterations => "stopped (max iterations)",
            FeedbackAction::StoppedNoChanges => "stopped (no changes)",
            FeedbackAction::Advanced => "advanced",
            FeedbackAction::AlreadyFinished => "already finished",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackOutcome {
    pub verdict: Verdict,
    pub action: FeedbackAction,
    /// Iteration recorded on the pull request after this unit of work.
    pub iteration: u32,
    /// Head branch that was checked out, when the flow got that far.
    pub branch: Option<String>,
}

/// Outcome of reviewing a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// A review was posted. `event` is what the platform accepted, which is
    /// `Comment` when the verdict event was refused.
    Submitted { verdict: Verdict, event: ReviewEvent },
    /// Nothing was reviewed.
    Skipped { reason: &'static str },
}
