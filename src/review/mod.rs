pub mod verdict;

pub use verdict::{parse_review, ReviewVerdict, Verdict};
