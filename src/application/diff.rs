use std::collections::BTreeSet;

use crate::domain::{InterestPolicy, SlotSet};

/// Result of comparing two consecutive reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffReport {
    /// `previous` was empty, so `current` was taken as the starting point.
    pub baseline: bool,
    pub added: SlotSet,
    pub removed: SlotSet,
    /// Additions that pass the interest policy.
    pub notable: SlotSet,
    /// Notable additions not yet alerted on in this process life.
    pub fresh: SlotSet,
}

impl DiffReport {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Computes set changes and remembers what has already been alerted on.
#[derive(Clone, Debug, Default)]
pub struct DiffEngine {
    notified: BTreeSet<String>,
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(
        &mut self,
        current: &SlotSet,
        previous: &SlotSet,
        policy: &InterestPolicy,
    ) -> DiffReport {
        if previous.is_empty() {
            return DiffReport {
                baseline: true,
                added: current.clone(),
                ..DiffReport::default()
            };
        }

        let added = current.difference(previous);
        let removed = previous.difference(current);

        // Closed slots become alertable again if they reopen later.
        for name in &removed {
            self.notified.remove(name);
        }

        let notable: SlotSet = added
            .iter()
            .filter(|a| policy.is_notable(a))
            .cloned()
            .collect();

        let fresh: SlotSet = notable
            .iter()
            .filter(|n| !self.notified.contains(n.as_str()))
            .cloned()
            .collect();

        self.notified.extend(fresh.iter().cloned());

        DiffReport {
            baseline: false,
            added,
            removed,
            notable,
            fresh,
        }
    }

    pub fn was_notified(&self, slot: &str) -> bool {
        self.notified.contains(slot)
    }

    pub fn notified_count(&self) -> usize {
        self.notified.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TargetList;

    fn set(items: &[&str]) -> SlotSet {
        SlotSet::from_labels(items.iter().copied())
    }

    fn general(blacklist: &[&str]) -> InterestPolicy {
        InterestPolicy::new(
            TargetList::default(),
            blacklist.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn added_and_removed_are_disjoint_set_differences() {
        let mut engine = DiffEngine::new();
        let prev = set(&["A", "B", "C"]);
        let cur = set(&["B", "C", "D", "E"]);
        let report = engine.process(&cur, &prev, &general(&[]));

        assert_eq!(report.added, set(&["D", "E"]));
        assert_eq!(report.removed, set(&["A"]));
        assert!(report.added.iter().all(|a| !report.removed.contains(a)));
    }

    #[test]
    fn empty_previous_is_a_silent_baseline() {
        let mut engine = DiffEngine::new();
        let report = engine.process(&set(&["X", "Y"]), &SlotSet::new(), &general(&[]));

        assert!(report.baseline);
        assert!(report.notable.is_empty());
        assert!(report.fresh.is_empty());
        assert_eq!(engine.notified_count(), 0);
    }

    #[test]
    fn identical_sets_produce_no_changes() {
        let mut engine = DiffEngine::new();
        let prev = set(&["A"]);
        let cur = set(&["A", "B"]);
        engine.process(&cur, &prev, &general(&[]));
        let second = engine.process(&cur, &cur, &general(&[]));

        assert!(!second.has_changes());
        assert!(second.fresh.is_empty());
    }

    #[test]
    fn blacklisted_addition_is_logged_but_not_notable() {
        let mut engine = DiffEngine::new();
        let report = engine.process(&set(&["B", "C"]), &set(&["A", "B"]), &general(&["C"]));

        assert_eq!(report.added, set(&["C"]));
        assert_eq!(report.removed, set(&["A"]));
        assert!(report.notable.is_empty());
        assert_eq!(engine.notified_count(), 0);
    }

    #[test]
    fn sniper_mode_matches_substrings_case_insensitively() {
        let mut engine = DiffEngine::new();
        let sniper = InterestPolicy::new(TargetList::new(["cardio"]), vec![]);
        let report = engine.process(
            &set(&["BASE", "CardioLogia Geral", "DERMATOLOGIA"]),
            &set(&["BASE"]),
            &sniper,
        );
        assert_eq!(report.notable, set(&["CardioLogia Geral"]));

        let mut engine = DiffEngine::new();
        let general = general(&["CARDIOLOGIA GERAL"]);
        let report = engine.process(&set(&["BASE", "CARDIOLOGIA GERAL"]), &set(&["BASE"]), &general);
        assert!(report.notable.is_empty());
    }

    #[test]
    fn reopened_slot_alerts_again_after_removal() {
        let mut engine = DiffEngine::new();
        let policy = general(&[]);
        let base = set(&["BASE"]);
        let open = set(&["BASE", "X"]);

        let first = engine.process(&open, &base, &policy);
        assert_eq!(first.fresh, set(&["X"]));
        assert!(engine.was_notified("X"));

        // Same addition observed again against a stale previous: suppressed.
        let repeat = engine.process(&open, &base, &policy);
        assert_eq!(repeat.notable, set(&["X"]));
        assert!(repeat.fresh.is_empty());

        let closed = engine.process(&base, &open, &policy);
        assert_eq!(closed.removed, set(&["X"]));
        assert!(!engine.was_notified("X"));

        let reopened = engine.process(&open, &base, &policy);
        assert_eq!(reopened.fresh, set(&["X"]));
    }
}
