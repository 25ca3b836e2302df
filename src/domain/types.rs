use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder entries the portal renders in the specialty dropdown.
pub const SENTINEL_LABELS: &[&str] = &["", "Selecione...", "Selecione a Especialidade..."];

/// Set of appointment categories currently offered, keyed by trimmed label.
///
/// Iteration is sorted, which keeps snapshots and chat listings stable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotSet(BTreeSet<String>);

impl SlotSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from raw option text, trimming labels and dropping sentinels.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let inner = labels
            .into_iter()
            .map(|l| l.as_ref().trim().to_string())
            .filter(|l| !is_sentinel(l))
            .collect();
        Self(inner)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    /// `self − other`
    pub fn difference(&self, other: &SlotSet) -> SlotSet {
        Self(self.0.difference(&other.0).cloned().collect())
    }

    pub fn to_sorted_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl FromIterator<String> for SlotSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self::from_labels(iter)
    }
}

impl<'a> IntoIterator for &'a SlotSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for SlotSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(String::as_str).collect();
        write!(f, "{}", names.join(", "))
    }
}

fn is_sentinel(label: &str) -> bool {
    SENTINEL_LABELS.contains(&label) || label.to_lowercase().starts_with("selecione")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_placeholders_and_trims() {
        let set = SlotSet::from_labels([
            "  CARDIOLOGIA  ",
            "",
            "Selecione a Especialidade...",
            "Selecione...",
            "DERMATOLOGIA",
            "CARDIOLOGIA",
        ]);
        assert_eq!(set.to_sorted_vec(), vec!["CARDIOLOGIA", "DERMATOLOGIA"]);
    }

    #[test]
    fn difference_is_one_sided() {
        let a = SlotSet::from_labels(["A", "B"]);
        let b = SlotSet::from_labels(["B", "C"]);
        assert_eq!(a.difference(&b).to_sorted_vec(), vec!["A"]);
        assert_eq!(b.difference(&a).to_sorted_vec(), vec!["C"]);
    }
}
