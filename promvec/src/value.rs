use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

use crate::{
    aggregations, binop,
    error::{Error, Result},
    labels::{Labels, MatchSpec, Signature},
    matching::{MatchCardinality, Modifiers},
};

// See https://docs.rs/indexmap/latest/indexmap/#alternate-hashers
pub(crate) type FxIndexMap<K, V> =
    IndexMap<K, V, std::hash::BuildHasherDefault<rustc_hash::FxHasher>>;

/// One label set paired with one value. The timestamp lives on the
/// owning [`InstantVector`], not the sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    #[serde(rename = "metric")]
    pub labels: Labels,
    pub value: f64,
}

impl Sample {
    pub fn new(labels: Labels, value: f64) -> Self {
        Self { labels, value }
    }

    pub fn signature(&self) -> Signature {
        self.labels.signature()
    }

    pub fn signature_with(&self, spec: &MatchSpec) -> Signature {
        self.labels.signature_with(spec)
    }

    /// Rebuilds the sample with only the labels selected by `spec`.
    pub fn project(&self, spec: &MatchSpec) -> Sample {
        Sample {
            labels: self.labels.project(spec),
            value: self.value,
        }
    }
}

/// A set of samples unique by full-label signature, all at one timestamp,
/// plus the modifier record the fluent builders accumulate.
///
/// Builders are O(1) copy-on-write views: the sample table is shared via
/// `Arc`, only the modifiers differ between views.
#[derive(Debug, Clone, Default)]
pub struct InstantVector {
    timestamp: i64,
    samples: Arc<FxIndexMap<Signature, Sample>>,
    modifiers: Modifiers,
}

/// Operand/result of [`binop`] and [`aggregate`]: an ungrouped
/// aggregation and a scalar-only binary operation reduce to a float.
///
/// [`binop`]: InstantVector::binop
/// [`aggregate`]: InstantVector::aggregate
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Float(f64),
    Vector(InstantVector),
}

impl InstantVector {
    pub fn new(timestamp: i64, samples: Vec<Sample>) -> Result<Self> {
        let mut map = FxIndexMap::with_capacity_and_hasher(samples.len(), Default::default());
        for sample in samples {
            let sig = sample.signature();
            if map.contains_key(&sig) {
                return Err(Error::DuplicateSample {
                    labels: sample.labels,
                });
            }
            map.insert(sig, sample);
        }
        Ok(Self {
            timestamp,
            samples: Arc::new(map),
            modifiers: Modifiers::default(),
        })
    }

    pub(crate) fn from_map(timestamp: i64, samples: FxIndexMap<Signature, Sample>) -> Self {
        Self {
            timestamp,
            samples: Arc::new(samples),
            modifiers: Modifiers::default(),
        }
    }

    /// Inserts a sample. Fails without mutating the vector if a sample
    /// with the same full label set is already present.
    pub fn push(&mut self, sample: Sample) -> Result<()> {
        let sig = sample.signature();
        if self.samples.contains_key(&sig) {
            return Err(Error::DuplicateSample {
                labels: sample.labels,
            });
        }
        Arc::make_mut(&mut self.samples).insert(sig, sample);
        Ok(())
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Samples in insertion order.
    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.values()
    }

    pub(crate) fn sample_map(&self) -> &FxIndexMap<Signature, Sample> {
        &self.samples
    }

    pub fn modifiers(&self) -> &Modifiers {
        &self.modifiers
    }

    fn with_modifiers(&self, modifiers: Modifiers) -> Self {
        Self {
            timestamp: self.timestamp,
            samples: Arc::clone(&self.samples),
            modifiers,
        }
    }

    /// Match using only the named labels.
    pub fn on<S: Into<String>>(&self, labels: impl IntoIterator<Item = S>) -> Self {
        let mut modifiers = self.modifiers.clone();
        modifiers.matching.on = true;
        modifiers.matching.labels = labels.into_iter().map(Into::into).collect();
        self.with_modifiers(modifiers)
    }

    /// Match using all labels except the named ones.
    pub fn ignoring<S: Into<String>>(&self, labels: impl IntoIterator<Item = S>) -> Self {
        let mut modifiers = self.modifiers.clone();
        modifiers.matching.on = false;
        modifiers.matching.labels = labels.into_iter().map(Into::into).collect();
        self.with_modifiers(modifiers)
    }

    /// Aggregate into groups keyed by exactly the named labels.
    pub fn by<S: Into<String>>(&self, labels: impl IntoIterator<Item = S>) -> Self {
        let mut modifiers = self.modifiers.clone();
        modifiers.aggregate.grouping = labels.into_iter().map(Into::into).collect();
        modifiers.aggregate.without = false;
        self.with_modifiers(modifiers)
    }

    /// Aggregate into groups keyed by all labels except the named ones.
    pub fn without<S: Into<String>>(&self, labels: impl IntoIterator<Item = S>) -> Self {
        let mut modifiers = self.modifiers.clone();
        modifiers.aggregate.grouping = labels.into_iter().map(Into::into).collect();
        modifiers.aggregate.without = true;
        self.with_modifiers(modifiers)
    }

    /// Declares that the left side may have many rows per match key and
    /// names the labels to copy over from the right side.
    pub fn group_left<S: Into<String>>(&self, include: impl IntoIterator<Item = S>) -> Self {
        let mut modifiers = self.modifiers.clone();
        modifiers.matching.cardinality = MatchCardinality::ManyToOne;
        modifiers.matching.include = include.into_iter().map(Into::into).collect();
        self.with_modifiers(modifiers)
    }

    /// Declares that the right side may have many rows per match key and
    /// names the labels to copy over from the left side.
    pub fn group_right<S: Into<String>>(&self, include: impl IntoIterator<Item = S>) -> Self {
        let mut modifiers = self.modifiers.clone();
        modifiers.matching.cardinality = MatchCardinality::OneToMany;
        modifiers.matching.include = include.into_iter().map(Into::into).collect();
        self.with_modifiers(modifiers)
    }

    /// Turns a comparison operator from a filter into a 0/1 result.
    pub fn return_bool(&self) -> Self {
        let mut modifiers = self.modifiers.clone();
        modifiers.binary.return_bool = true;
        self.with_modifiers(modifiers)
    }

    /// Combines `self` (as the left operand) with `other` under this
    /// view's matching and binary modifiers.
    pub fn binop<F>(&self, other: &Value, op: F) -> Result<Value>
    where
        F: Fn(f64, f64) -> (f64, bool),
    {
        binop::combine(
            &Value::Vector(self.clone()),
            other,
            op,
            &self.modifiers.matching,
            &self.modifiers.binary,
        )
    }

    /// Reduces this view's samples under its aggregate modifier.
    pub fn aggregate<F>(&self, op: F) -> Result<Value>
    where
        F: Fn(&[f64]) -> f64,
    {
        aggregations::aggregate(self, &self.modifiers.aggregate, op)
    }
}

impl Serialize for InstantVector {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.samples.len()))?;
        for sample in self.samples.values() {
            seq.serialize_element(sample)?;
        }
        seq.end()
    }
}
