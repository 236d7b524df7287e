use std::{fmt, slice::Iter};

use crate::common::Fingerprinter;
use crate::error::UsageError;

/// A single name/value pair attached to a metric.
///
/// Labels are ordered by name first and value second, which is the order a [`LabelSet`] is
/// canonicalized into.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Label {
    name: String,
    value: String,
}

impl Label {
    /// Creates a [`Label`] from a name and value.
    pub fn new<N, V>(name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Label { name: name.into(), value: value.into() }
    }

    /// Name of this label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of this label.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether or not this label sorts before `other`.
    pub fn before(&self, other: &Label) -> bool {
        self < other
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// An ordered collection of labels.
///
/// Labels are accumulated in whatever order callers provide them and only put into canonical
/// order by [`canonicalize`](LabelSet::canonicalize), which happens when a partial is applied.
/// The fingerprint of a canonical set is its identity within a family.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LabelSet(Vec<Label>);

impl LabelSet {
    /// Creates an empty [`LabelSet`].
    pub fn new() -> Self {
        LabelSet(Vec::new())
    }

    /// Creates a [`LabelSet`] from a flat list of alternating names and values.
    ///
    /// Returns [`UsageError::Argument`] if an odd number of strings is given.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<Self, UsageError> {
        let mut labels = LabelSet::new();
        labels.append_pairs(pairs)?;
        Ok(labels)
    }

    /// Appends a label without reordering.
    pub fn append<N, V>(&mut self, name: N, value: V)
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.0.push(Label::new(name, value));
    }

    /// Appends a flat list of alternating names and values without reordering.
    ///
    /// Nothing is appended if an odd number of strings is given.
    pub fn append_pairs<S: AsRef<str>>(&mut self, pairs: &[S]) -> Result<(), UsageError> {
        if pairs.len() % 2 != 0 {
            return Err(UsageError::Argument {
                count: pairs.len(),
                labels: pairs.iter().map(|s| s.as_ref().to_owned()).collect(),
            });
        }

        self.0.reserve(pairs.len() / 2);
        for pair in pairs.chunks_exact(2) {
            self.append(pair[0].as_ref(), pair[1].as_ref());
        }

        Ok(())
    }

    /// Whether or not the labels are already in canonical order.
    pub fn is_canonical(&self) -> bool {
        self.0.windows(2).all(|w| w[0] <= w[1])
    }

    /// Sorts the labels into canonical order.
    ///
    /// Does nothing if they already are, so calling this more than once is harmless.
    pub fn canonicalize(&mut self) {
        if !self.is_canonical() {
            self.0.sort();
        }
    }

    /// Fingerprint of the labels in their current order.
    ///
    /// Only reproducible as an identity once the set has been canonicalized.
    pub fn fingerprint(&self) -> u64 {
        let mut fp = Fingerprinter::new();
        for label in &self.0 {
            fp.feed(&label.name);
            fp.feed(&label.value);
        }
        fp.finish()
    }

    /// Whether or not this set sorts before `other`.
    ///
    /// Compares pairwise and stops at the first difference.  Only meaningful between sets of the
    /// same family, i.e. of equal length and over the same dimensions.
    pub fn before(&self, other: &LabelSet) -> bool {
        self < other
    }

    /// Number of labels in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether or not the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the labels in their current order.
    pub fn iter(&self) -> Iter<'_, Label> {
        self.0.iter()
    }

    /// Names of the labels, in their current order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(Label::name)
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for label in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "{}", label)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a LabelSet {
    type Item = &'a Label;
    type IntoIter = Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Label> for LabelSet {
    fn from_iter<I: IntoIterator<Item = Label>>(iter: I) -> Self {
        LabelSet(iter.into_iter().collect())
    }
}
