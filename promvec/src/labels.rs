use std::{fmt, ops::Index, sync::Arc};

use itertools::Itertools;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Label is a key/value pair of strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub(crate) name: String,
    pub(crate) value: String,
}

/// `Labels` is a sorted set of `Label`s identifying one series.
///
/// The set is immutable after construction; derived sets are produced by
/// [`Labels::project`] and [`Labels::overlay`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels(Vec<Arc<Label>>);

impl Labels {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut labels = labels
            .into_iter()
            .map(|(k, v)| {
                Arc::new(Label {
                    name: k.as_ref().to_owned(),
                    value: v.as_ref().to_owned(),
                })
            })
            .collect::<Vec<_>>();
        labels.sort_by(|a, b| a.name.cmp(&b.name));
        assert!(
            !labels.windows(2).any(|w| w[0].name == w[1].name),
            "label names are not unique"
        );
        Self(labels)
    }

    /// Returns the value of the label with given name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .binary_search_by_key(&name, |label| label.name.as_str())
            .ok()
            .map(|index| self.0[index].value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Canonical signature of the full label set. Order-independent since
    /// the underlying storage is sorted by name.
    pub fn signature(&self) -> Signature {
        self.signature_with(&MatchSpec::default())
    }

    /// Signature of the subset selected by `spec`.
    pub fn signature_with(&self, spec: &MatchSpec) -> Signature {
        let mut hasher = blake3::Hasher::new();
        self.0
            .iter()
            .filter(|label| spec.selects(&label.name))
            .for_each(|label| {
                // separator bytes keep ("ab","c") and ("a","bc") apart
                hasher.update(label.name.as_bytes());
                hasher.update(&[0xff]);
                hasher.update(label.value.as_bytes());
                hasher.update(&[0xff]);
            });
        Signature(hasher.finalize().into())
    }

    /// Returns the subset selected by `spec` as a new label set.
    pub fn project(&self, spec: &MatchSpec) -> Labels {
        if !spec.on && spec.labels.is_empty() {
            // ignoring() with no names selects everything
            return self.clone();
        }
        Labels(
            self.0
                .iter()
                .filter(|label| spec.selects(&label.name))
                .cloned()
                .collect(),
        )
    }

    /// Returns a new set with the labels named in `names` copied in from
    /// `other`, replacing same-named entries. Names absent from `other`
    /// are left untouched.
    pub fn overlay<S: AsRef<str>>(&self, other: &Labels, names: &[S]) -> Labels {
        let mut labels = self.0.clone();
        for name in names {
            let name = name.as_ref();
            let Some(value) = other.get(name) else {
                continue;
            };
            let incoming = Arc::new(Label {
                name: name.to_owned(),
                value: value.to_owned(),
            });
            match labels.binary_search_by_key(&name, |label| label.name.as_str()) {
                Ok(index) => labels[index] = incoming,
                Err(index) => labels.insert(index, incoming),
            }
        }
        Labels(labels)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|label| (label.name.as_str(), label.value.as_str()))
    }
}

impl Index<&str> for Labels {
    type Output = str;

    fn index(&self, key: &str) -> &Self::Output {
        self.get(key)
            .unwrap_or_else(|| panic!("no label found for key {key:?}"))
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.0
                .iter()
                .map(|label| format!("{}={:?}", label.name, label.value))
                .join(",")
        )
    }
}

impl Serialize for Labels {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for label in &self.0 {
            map.serialize_entry(&label.name, &label.value)?;
        }
        map.end()
    }
}

/// Selects the subset of a label set that is relevant for matching or
/// grouping: `on == true` keeps only the named labels, `on == false`
/// keeps all labels except the named ones (PromQL `ignoring`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSpec {
    pub on: bool,
    pub labels: Vec<String>,
}

impl MatchSpec {
    pub fn on<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            on: true,
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn ignoring<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            on: false,
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Selects exactly the labels this spec excludes.
    pub fn complement(&self) -> Self {
        Self {
            on: !self.on,
            labels: self.labels.clone(),
        }
    }

    fn selects(&self, name: &str) -> bool {
        self.labels.iter().any(|label| label == name) == self.on
    }
}

/// Canonical, order-independent digest of a (possibly projected) label set.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 32]);

impl From<Signature> for String {
    fn from(sig: Signature) -> Self {
        hex::encode(sig.0)
    }
}
