use crate::labels::MatchSpec;

/// Declares whether one side of a binary operation may match multiple
/// rows on the other side. PromQL convention: `group_left` means the
/// left side carries the "many" rows (`ManyToOne`), `group_right` the
/// right side (`OneToMany`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchCardinality {
    #[default]
    OneToOne,
    ManyToOne,
    OneToMany,
}

/// How two vectors are joined in a binary operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VectorMatching {
    pub cardinality: MatchCardinality,
    /// `true` — match using only `labels`; `false` — match using all
    /// labels except `labels` (`ignoring`).
    pub on: bool,
    pub labels: Vec<String>,
    /// Labels copied from the "one" side into the result when the
    /// cardinality is not one-to-one.
    pub include: Vec<String>,
}

impl VectorMatching {
    /// The join-key selector this matching declares.
    pub fn match_spec(&self) -> MatchSpec {
        MatchSpec {
            on: self.on,
            labels: self.labels.clone(),
        }
    }
}

/// Which labels survive grouped aggregation: `without == false` ("by")
/// keeps exactly `grouping`; `without == true` drops exactly `grouping`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateModifier {
    pub grouping: Vec<String>,
    pub without: bool,
}

/// `return_bool == true` turns a comparison operator from a filter into
/// a 0/1-valued pass-through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinaryModifier {
    pub return_bool: bool,
}

/// The full modifier record carried by an [`InstantVector`] view.
///
/// [`InstantVector`]: crate::value::InstantVector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub matching: VectorMatching,
    pub aggregate: AggregateModifier,
    pub binary: BinaryModifier,
}
