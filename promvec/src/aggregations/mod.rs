use strum::{Display, EnumString};

use crate::{
    error::Result,
    labels::{Labels, MatchSpec},
    matching::AggregateModifier,
    value::{FxIndexMap, InstantVector, Sample, Value},
};

mod avg;
mod count;
mod max;
mod min;
mod sum;

pub use avg::avg;
pub use count::count;
pub use max::max;
pub use min::min;
pub use sum::sum;

/// Grouped reduction of a vector's values through `op`.
///
/// With no grouping declared (`by()` over nothing) every value feeds a
/// single reduction and the bare number comes back as `Value::Float`.
/// Otherwise each sample is assigned to the group selected by its
/// projected labels (`by` keeps exactly the named labels, `without`
/// drops exactly the named ones) and one output sample is emitted per
/// group, in first-member insertion order.
pub fn aggregate<F>(vector: &InstantVector, modifier: &AggregateModifier, op: F) -> Result<Value>
where
    F: Fn(&[f64]) -> f64,
{
    if modifier.grouping.is_empty() && !modifier.without {
        let values = vector.samples().map(|s| s.value).collect::<Vec<_>>();
        return Ok(Value::Float(op(&values)));
    }

    let spec = MatchSpec {
        on: !modifier.without,
        labels: modifier.grouping.clone(),
    };
    let mut groups: FxIndexMap<_, (Labels, Vec<f64>)> = FxIndexMap::default();
    for sample in vector.samples() {
        let (_, values) = groups
            .entry(sample.signature_with(&spec))
            .or_insert_with(|| (sample.labels.project(&spec), Vec::new()));
        values.push(sample.value);
    }
    tracing::debug!(
        samples = vector.len(),
        groups = groups.len(),
        "aggregated vector"
    );

    let out = groups
        .into_iter()
        .map(|(sig, (labels, values))| (sig, Sample::new(labels, op(&values))))
        .collect();
    Ok(Value::Vector(InstantVector::from_map(
        vector.timestamp(),
        out,
    )))
}

/// The standard aggregation operators, parsable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum AggregateFunc {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

impl AggregateFunc {
    pub fn apply(&self, values: &[f64]) -> f64 {
        match self {
            Self::Sum => sum(values),
            Self::Avg => avg(values),
            Self::Count => count(values),
            Self::Min => min(values),
            Self::Max => max(values),
        }
    }
}
