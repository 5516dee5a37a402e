//! Label space: the bijective mapping between category names and dense
//! class indices `0..K-1`.
//!
//! Built once at training time from the distinct label names, immutable
//! afterwards. Serialized as the ordered name list; the reverse map is
//! rebuilt on load so the bijection survives a round-trip.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Bijective `label ↔ index` mapping over contiguous indices.
///
/// Index order is the sorted order of the distinct names, matching how
/// the training procedure assigns classes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelSpace {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

#[derive(Debug, thiserror::Error)]
#[error("duplicate label name: {0}")]
pub struct DuplicateLabel(String);

impl LabelSpace {
    /// Build a label space from raw label names (duplicates collapsed,
    /// names sorted so index assignment is deterministic).
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = labels
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        names.sort();
        names.dedup();

        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();

        Self { names, index }
    }

    /// Number of classes `K`.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Dense index for a label name, if the label is in the trained set.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Label name for a dense index.
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(|s| s.as_str())
    }

    /// Names in index order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }
}

impl TryFrom<Vec<String>> for LabelSpace {
    type Error = DuplicateLabel;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(DuplicateLabel(name.clone()));
            }
        }
        Ok(Self { names, index })
    }
}

impl From<LabelSpace> for Vec<String> {
    fn from(space: LabelSpace) -> Self {
        space.names
    }
}
