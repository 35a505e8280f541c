use rustc_hash::FxHashMap;
use strum::{Display, EnumString};

use crate::{
    error::{Error, MatchSide, Result},
    matching::{BinaryModifier, MatchCardinality, VectorMatching},
    value::{FxIndexMap, InstantVector, Sample, Value},
};

/// Combines two operands under the given matching and binary modifiers.
///
/// Both operands are explicit; `left` and `right` are always in the
/// order the caller wrote the expression, so `op` receives
/// `(left_value, right_value)` in every case.
pub fn combine<F>(
    left: &Value,
    right: &Value,
    op: F,
    matching: &VectorMatching,
    binary: &BinaryModifier,
) -> Result<Value>
where
    F: Fn(f64, f64) -> (f64, bool),
{
    match (left, right) {
        (Value::Float(lhs), Value::Float(rhs)) => {
            let (value, keep) = op(*lhs, *rhs);
            Ok(Value::Float(if binary.return_bool {
                keep as i64 as f64
            } else {
                value
            }))
        }
        (Value::Float(lhs), Value::Vector(rhs)) => {
            combine_scalar(rhs, |value| op(*lhs, value), binary)
        }
        (Value::Vector(lhs), Value::Float(rhs)) => {
            combine_scalar(lhs, |value| op(value, *rhs), binary)
        }
        (Value::Vector(lhs), Value::Vector(rhs)) => {
            combine_vectors(lhs, rhs, op, matching, binary)
        }
    }
}

/// Applies `op` (already bound to the scalar operand) to every sample.
///
/// The bool modifier follows the same policy as the vector-vector path:
/// set, the result is `keep` as 1/0 and every sample survives; unset, a
/// false `keep` drops the sample.
fn combine_scalar<F>(vector: &InstantVector, op: F, binary: &BinaryModifier) -> Result<Value>
where
    F: Fn(f64) -> (f64, bool),
{
    let mut out = FxIndexMap::default();
    for (sig, sample) in vector.sample_map() {
        let (value, keep) = op(sample.value);
        let value = if binary.return_bool {
            keep as i64 as f64
        } else if !keep {
            continue;
        } else {
            value
        };
        out.insert(*sig, Sample::new(sample.labels.clone(), value));
    }
    Ok(Value::Vector(InstantVector::from_map(
        vector.timestamp(),
        out,
    )))
}

/// One-pass equi-join keyed by the matching signature.
///
/// The side that may hold only one row per match key is indexed; the
/// other side probes. On a one-to-one join the matched index entry is
/// consumed, so data that is secretly one-to-many degrades to
/// first-match-wins instead of erroring.
fn combine_vectors<F>(
    left: &InstantVector,
    right: &InstantVector,
    op: F,
    matching: &VectorMatching,
    binary: &BinaryModifier,
) -> Result<Value>
where
    F: Fn(f64, f64) -> (f64, bool),
{
    let spec = matching.match_spec();
    let one_to_one = matching.cardinality == MatchCardinality::OneToOne;
    // group_right: the right side carries the many rows, so it probes
    let (probe, index_side, indexed) = match matching.cardinality {
        MatchCardinality::OneToMany => (right, MatchSide::Left, left),
        MatchCardinality::OneToOne | MatchCardinality::ManyToOne => {
            (left, MatchSide::Right, right)
        }
    };
    tracing::debug!(
        left = left.len(),
        right = right.len(),
        cardinality = ?matching.cardinality,
        "combining vectors"
    );

    let mut index = FxHashMap::default();
    index.reserve(indexed.len());
    for sample in indexed.samples() {
        if index
            .insert(sample.signature_with(&spec), sample)
            .is_some()
        {
            return Err(Error::DuplicateMatchKey {
                side: index_side,
                labels: sample.labels.project(&spec),
            });
        }
    }

    let mut out: FxIndexMap<_, Sample> = FxIndexMap::default();
    for sample in probe.samples() {
        let key = sample.signature_with(&spec);
        let Some(matched) = index.get(&key).copied() else {
            continue;
        };
        // restore caller order: the probe side is the left operand
        // except under group_right
        let (lhs, rhs) = match index_side {
            MatchSide::Right => (sample.value, matched.value),
            MatchSide::Left => (matched.value, sample.value),
        };
        let (value, keep) = op(lhs, rhs);
        let value = if binary.return_bool {
            keep as i64 as f64
        } else if !keep {
            continue;
        } else {
            value
        };
        if one_to_one {
            // the join key is removed from the output; the output table
            // is keyed by the consumed match signature, which cannot
            // repeat since each index entry matches at most once
            let labels = sample.labels.project(&spec.complement());
            index.remove(&key);
            out.insert(key, Sample::new(labels, value));
        } else {
            let labels = sample.labels.overlay(&matched.labels, &matching.include);
            let out_sig = labels.signature();
            if out.contains_key(&out_sig) {
                return Err(Error::DuplicateResultLabelSet { labels });
            }
            out.insert(out_sig, Sample::new(labels, value));
        }
    }
    Ok(Value::Vector(InstantVector::from_map(left.timestamp(), out)))
}

/// The standard binary operators. Arithmetic always keeps its row;
/// comparisons report the left value plus a keep verdict, which
/// [`combine`] turns into either a filter or a 0/1 result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
pub enum BinaryFunc {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "^")]
    Pow,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "<=")]
    Le,
}

impl BinaryFunc {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Gt | Self::Lt | Self::Ge | Self::Le
        )
    }

    /// IEEE-754 semantics throughout; division by zero yields an
    /// infinity or NaN rather than an error.
    pub fn apply(&self, lhs: f64, rhs: f64) -> (f64, bool) {
        match self {
            Self::Add => (lhs + rhs, true),
            Self::Sub => (lhs - rhs, true),
            Self::Mul => (lhs * rhs, true),
            Self::Div => (lhs / rhs, true),
            Self::Mod => (lhs % rhs, true),
            Self::Pow => (lhs.powf(rhs), true),
            Self::Eq => (lhs, lhs == rhs),
            Self::Ne => (lhs, lhs != rhs),
            Self::Gt => (lhs, lhs > rhs),
            Self::Lt => (lhs, lhs < rhs),
            Self::Ge => (lhs, lhs >= rhs),
            Self::Le => (lhs, lhs <= rhs),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::labels::Labels;

    fn vector(timestamp: i64, samples: &[(&[(&str, &str)], f64)]) -> InstantVector {
        InstantVector::new(
            timestamp,
            samples
                .iter()
                .map(|(pairs, value)| Sample::new(Labels::new(pairs.iter().copied()), *value))
                .collect(),
        )
        .unwrap()
    }

    fn as_vector(value: Value) -> InstantVector {
        match value {
            Value::Vector(v) => v,
            Value::Float(f) => panic!("expected a vector, got {f}"),
        }
    }

    fn add(l: f64, r: f64) -> (f64, bool) {
        (l + r, true)
    }

    #[test]
    fn scalar_multiply_preserves_labels() {
        let v = vector(0, &[(&[("job", "a")], 1.0), (&[("job", "b")], 2.0)]);
        let out = as_vector(
            v.binop(&Value::Float(5.0), |l, r| (l * r, true))
                .unwrap(),
        );
        assert_eq!(out.len(), 2);
        let samples = out.samples().collect::<Vec<_>>();
        assert_eq!(samples[0].labels.get("job"), Some("a"));
        assert_eq!(samples[0].value, 5.0);
        assert_eq!(samples[1].labels.get("job"), Some("b"));
        assert_eq!(samples[1].value, 10.0);
    }

    #[test]
    fn scalar_on_the_left_keeps_caller_order() {
        let v = vector(0, &[(&[("job", "a")], 2.0)]);
        let out = as_vector(
            combine(
                &Value::Float(10.0),
                &Value::Vector(v),
                |l, r| (l - r, true),
                &VectorMatching::default(),
                &BinaryModifier::default(),
            )
            .unwrap(),
        );
        assert_eq!(out.samples().next().unwrap().value, 8.0);
    }

    #[test]
    fn scalar_comparison_filters() {
        let v = vector(0, &[(&[("job", "a")], 1.0), (&[("job", "b")], 7.0)]);
        let out = as_vector(
            v.binop(&Value::Float(3.0), |l, r| BinaryFunc::Gt.apply(l, r))
                .unwrap(),
        );
        assert_eq!(out.len(), 1);
        let sample = out.samples().next().unwrap();
        assert_eq!(sample.labels.get("job"), Some("b"));
        assert_eq!(sample.value, 7.0);
    }

    #[test]
    fn scalar_comparison_bool() {
        let v = vector(0, &[(&[("job", "a")], 1.0), (&[("job", "b")], 7.0)]);
        let out = as_vector(
            v.return_bool()
                .binop(&Value::Float(3.0), |l, r| BinaryFunc::Gt.apply(l, r))
                .unwrap(),
        );
        // every sample survives, values collapse to 0/1
        assert_eq!(out.len(), 2);
        let values = out.samples().map(|s| s.value).collect::<Vec<_>>();
        assert_eq!(values, vec![0.0, 1.0]);
    }

    #[test]
    fn scalar_scalar() {
        let out = combine(
            &Value::Float(4.0),
            &Value::Float(2.0),
            |l, r| (l / r, true),
            &VectorMatching::default(),
            &BinaryModifier::default(),
        )
        .unwrap();
        assert!(matches!(out, Value::Float(v) if v == 2.0));
    }

    #[test]
    fn one_to_one_join_on() {
        let left = vector(0, &[(&[("job", "a")], 1.0), (&[("job", "b")], 2.0)]);
        let right = vector(0, &[(&[("job", "a")], 10.0), (&[("job", "b")], 18.0)]);
        let out = as_vector(
            left.on(["job"])
                .binop(&Value::Vector(right), add)
                .unwrap(),
        );
        assert_eq!(out.len(), 2);
        let values = out.samples().map(|s| s.value).collect::<Vec<_>>();
        assert_eq!(values, vec![11.0, 20.0]);
        // the join key does not survive a one-to-one join with `on`
        assert!(out.samples().all(|s| s.labels.is_empty()));
    }

    #[test]
    fn one_to_one_join_ignoring() {
        let left = vector(
            0,
            &[
                (&[("job", "a"), ("host", "h1")], 1.0),
                (&[("job", "b"), ("host", "h2")], 2.0),
            ],
        );
        let right = vector(
            0,
            &[
                (&[("job", "a"), ("host", "h9")], 10.0),
                (&[("job", "b"), ("host", "h8")], 20.0),
            ],
        );
        let out = as_vector(
            left.ignoring(["host"])
                .binop(&Value::Vector(right), add)
                .unwrap(),
        );
        assert_eq!(out.len(), 2);
        // only the left-hand `host` survives (the complement of the key)
        let samples = out.samples().collect::<Vec<_>>();
        assert_eq!(samples[0].labels.get("host"), Some("h1"));
        assert!(samples[0].labels.get("job").is_none());
        assert_eq!(samples[0].value, 11.0);
    }

    #[test]
    fn unmatched_rows_drop_silently() {
        let left = vector(0, &[(&[("job", "a")], 1.0), (&[("job", "c")], 3.0)]);
        let right = vector(0, &[(&[("job", "a")], 10.0)]);
        let out = as_vector(
            left.on(["job"])
                .binop(&Value::Vector(right), add)
                .unwrap(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out.samples().next().unwrap().value, 11.0);
    }

    #[test]
    fn one_to_one_first_match_wins() {
        // left is secretly many-to-one; the one-to-one path consumes the
        // index entry, so the second left row finds nothing
        let left = vector(
            0,
            &[
                (&[("job", "a"), ("host", "h1")], 1.0),
                (&[("job", "a"), ("host", "h2")], 2.0),
            ],
        );
        let right = vector(0, &[(&[("job", "a")], 10.0)]);
        let out = as_vector(
            left.on(["job"])
                .binop(&Value::Vector(right), add)
                .unwrap(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out.samples().next().unwrap().value, 11.0);
    }

    #[test]
    fn duplicate_match_key_on_indexed_side() {
        let left = vector(0, &[(&[("job", "a"), ("host", "h1")], 1.0)]);
        let right = vector(
            0,
            &[
                (&[("job", "a"), ("host", "r1")], 10.0),
                (&[("job", "a"), ("host", "r2")], 20.0),
            ],
        );
        let err = left
            .on(["job"])
            .binop(&Value::Vector(right), add)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateMatchKey {
                side: MatchSide::Right,
                ..
            }
        ));
        assert!(err.to_string().contains("right side"));
        assert!(err.to_string().contains("job"));
    }

    #[test]
    fn duplicate_match_key_names_left_side_under_group_right() {
        // group_right indexes the left operand, so the diagnostic must
        // point at the left side
        let left = vector(
            0,
            &[
                (&[("job", "a"), ("env", "prod")], 1.0),
                (&[("job", "a"), ("env", "dev")], 2.0),
            ],
        );
        let right = vector(0, &[(&[("job", "a"), ("instance", "i1")], 10.0)]);
        let err = left
            .on(["job"])
            .group_right(["env"])
            .binop(&Value::Vector(right), add)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateMatchKey {
                side: MatchSide::Left,
                ..
            }
        ));
        assert!(err.to_string().contains("left side"));
        assert!(err.to_string().contains("job"));
    }

    #[test]
    fn group_left_propagates_include_labels() {
        let left = vector(
            0,
            &[
                (&[("job", "a"), ("instance", "i1")], 1.0),
                (&[("job", "a"), ("instance", "i2")], 2.0),
            ],
        );
        let right = vector(0, &[(&[("job", "a"), ("env", "prod"), ("dc", "eu")], 100.0)]);
        let out = as_vector(
            left.on(["job"])
                .group_left(["env"])
                .binop(&Value::Vector(right), add)
                .unwrap(),
        );
        assert_eq!(out.len(), 2);
        for sample in out.samples() {
            // left labels intact, exactly `env` copied over, `dc` not
            assert_eq!(sample.labels.get("job"), Some("a"));
            assert_eq!(sample.labels.get("env"), Some("prod"));
            assert!(sample.labels.get("dc").is_none());
            assert!(sample.labels.get("instance").is_some());
        }
        let values = out.samples().map(|s| s.value).collect::<Vec<_>>();
        assert_eq!(values, vec![101.0, 102.0]);
    }

    #[test]
    fn group_right_indexes_the_left_side() {
        let left = vector(0, &[(&[("job", "a"), ("env", "prod")], 100.0)]);
        let right = vector(
            0,
            &[
                (&[("job", "a"), ("instance", "i1")], 1.0),
                (&[("job", "a"), ("instance", "i2")], 2.0),
            ],
        );
        let out = as_vector(
            left.on(["job"])
                .group_right(["env"])
                .binop(&Value::Vector(right), |l, r| (l - r, true))
                .unwrap(),
        );
        assert_eq!(out.len(), 2);
        // caller order is preserved: 100 - instance value
        let values = out.samples().map(|s| s.value).collect::<Vec<_>>();
        assert_eq!(values, vec![99.0, 98.0]);
        for sample in out.samples() {
            assert_eq!(sample.labels.get("env"), Some("prod"));
            assert!(sample.labels.get("instance").is_some());
        }
    }

    #[test]
    fn duplicate_result_label_set() {
        // both left rows collapse to the same label set after the
        // include overlay rewrites `host`
        let left = vector(
            0,
            &[
                (&[("job", "a"), ("host", "h1")], 1.0),
                (&[("job", "a"), ("host", "h2")], 2.0),
            ],
        );
        let right = vector(0, &[(&[("job", "a"), ("host", "shared")], 10.0)]);
        let err = left
            .on(["job"])
            .group_left(["host"])
            .binop(&Value::Vector(right), add)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateResultLabelSet { .. }));
    }

    #[test]
    fn vector_comparison_bool_always_keeps() {
        let left = vector(0, &[(&[("job", "a")], 1.0), (&[("job", "b")], 9.0)]);
        let right = vector(0, &[(&[("job", "a")], 5.0), (&[("job", "b")], 5.0)]);
        let out = as_vector(
            left.on(["job"])
                .return_bool()
                .binop(&Value::Vector(right), |l, r| BinaryFunc::Gt.apply(l, r))
                .unwrap(),
        );
        assert_eq!(out.len(), 2);
        let values = out.samples().map(|s| s.value).collect::<Vec<_>>();
        assert_eq!(values, vec![0.0, 1.0]);
    }

    #[test]
    fn binary_func_parse_and_apply() {
        let op = BinaryFunc::from_str(">=").unwrap();
        assert!(op.is_comparison());
        assert_eq!(op.apply(2.0, 2.0), (2.0, true));
        assert_eq!(op.apply(1.0, 2.0), (1.0, false));

        let add = BinaryFunc::from_str("+").unwrap();
        assert!(!add.is_comparison());
        assert_eq!(add.apply(1.0, 2.0), (3.0, true));
        assert_eq!(add.to_string(), "+");

        assert!(BinaryFunc::from_str("??").is_err());

        let (value, _) = BinaryFunc::Div.apply(1.0, 0.0);
        assert!(value.is_infinite());
    }
}
