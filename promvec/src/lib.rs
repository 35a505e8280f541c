pub mod aggregations;
pub mod binop;
mod error;
pub mod eval;
mod labels;
mod matching;
pub mod value;

pub use {
    binop::{combine, BinaryFunc},
    error::{Error, MatchSide, Result},
    eval::{Bindings, Evaluate},
    labels::{Labels, MatchSpec, Signature},
    matching::{AggregateModifier, BinaryModifier, MatchCardinality, Modifiers, VectorMatching},
    value::{InstantVector, Sample, Value},
};
