use std::fmt;

use crate::labels::Labels;

pub type Result<T> = std::result::Result<T, Error>;

/// Which operand of a binary operation a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSide {
    Left,
    Right,
}

impl fmt::Display for MatchSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchSide::Left => f.write_str("left"),
            MatchSide::Right => f.write_str("right"),
        }
    }
}

/// Deterministic caller errors; none of these is transient and no partial
/// vector is ever returned alongside one.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("duplicate sample for label set {labels}")]
    DuplicateSample { labels: Labels },

    #[error("found duplicate match key {labels} on the {side} side of a binary operation")]
    DuplicateMatchKey { side: MatchSide, labels: Labels },

    #[error("binary operation produced two samples with label set {labels}")]
    DuplicateResultLabelSet { labels: Labels },
}
