use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

static VERDICT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*VERDICT:\s*(PASS|FAIL)\s*$").expect("verdict pattern is valid")
});

static NEXT_ACTIONS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ims)^\s*NEXT_ACTIONS:\s*(.*)$").expect("next actions pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("PASS"),
            Verdict::Fail => f.write_str("FAIL"),
        }
    }
}

/// Reviewer output reduced to what the fix loop needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewVerdict {
    /// `None` when the review has no `VERDICT:` line.
    pub explicit: Option<Verdict>,
    /// The `NEXT_ACTIONS:` block through end of text, or empty.
    pub next_actions: String,
}

impl ReviewVerdict {
    /// The verdict to act on; a review without a verdict line counts as FAIL.
    pub fn outcome(&self) -> Verdict {
        self.explicit.unwrap_or(Verdict::Fail)
    }

    pub fn is_parseable(&self) -> bool {
        self.explicit.is_some()
    }
}

pub fn parse_review(body: &str) -> ReviewVerdict {
    let explicit = VERDICT_RE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| {
            if m.as_str().eq_ignore_ascii_case("pass") {
                Verdict::Pass
            } else {
                Verdict::Fail
            }
        });

    let next_actions = NEXT_ACTIONS_RE
        .find(body)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    ReviewVerdict {
        explicit,
        next_actions,
    }
}
