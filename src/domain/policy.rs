use serde::{Deserialize, Serialize};

/// Ordered, upper-cased substrings the operator is hunting for.
///
/// A non-empty list switches the monitor into sniper mode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetList(Vec<String>);

impl TargetList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for n in names {
            list.add(n.as_ref());
        }
        list
    }

    /// Returns the stored form, or `None` if blank or already present.
    pub fn add(&mut self, name: &str) -> Option<String> {
        let name = name.trim().to_uppercase();
        if name.is_empty() || self.0.contains(&name) {
            return None;
        }
        self.0.push(name.clone());
        Some(name)
    }

    /// Drops every target containing `fragment`; returns what was dropped.
    pub fn remove_matching(&mut self, fragment: &str) -> Vec<String> {
        let fragment = fragment.trim().to_uppercase();
        let (dropped, kept): (Vec<String>, Vec<String>) =
            self.0.drain(..).partition(|t| t.contains(&fragment));
        self.0 = kept;
        dropped
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn matches(&self, slot: &str) -> bool {
        let upper = slot.to_uppercase();
        self.0.iter().any(|t| upper.contains(t.as_str()))
    }
}

/// Decides which newly opened slots are worth an alert.
#[derive(Clone, Debug, Default)]
pub struct InterestPolicy {
    pub targets: TargetList,
    pub blacklist: Vec<String>,
}

impl InterestPolicy {
    pub fn new(targets: TargetList, blacklist: Vec<String>) -> Self {
        Self { targets, blacklist }
    }

    pub fn is_sniper(&self) -> bool {
        !self.targets.is_empty()
    }

    pub fn is_notable(&self, slot: &str) -> bool {
        if self.is_sniper() {
            self.targets.matches(slot)
        } else {
            !self.blacklist.iter().any(|b| b == slot)
        }
    }

    pub fn mode_label(&self) -> String {
        if self.is_sniper() {
            format!("SNIPER ({})", self.targets.len())
        } else {
            "GENERAL".to_string()
        }
    }
}
