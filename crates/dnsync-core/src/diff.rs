//! Diff engine
//!
//! Pure set arithmetic between a desired and an actual record set. Each
//! record kind is diffed on its own; bindings and aliases never mix.

use crate::record::{Alias, Binding, RecordSet};
use std::collections::BTreeSet;

/// Add/remove sets for a single record kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff<T: Ord> {
    /// Present in desired, absent in actual
    pub to_add: BTreeSet<T>,
    /// Present in actual, absent in desired
    pub to_remove: BTreeSet<T>,
}

impl<T: Ord> Default for Diff<T> {
    fn default() -> Self {
        Self {
            to_add: BTreeSet::new(),
            to_remove: BTreeSet::new(),
        }
    }
}

impl<T: Ord + Clone> Diff<T> {
    /// Compute `desired − actual` and `actual − desired`
    pub fn compute(desired: &BTreeSet<T>, actual: &BTreeSet<T>) -> Self {
        Self {
            to_add: desired.difference(actual).cloned().collect(),
            to_remove: actual.difference(desired).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }
}

/// Diff of a whole record set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub bindings: Diff<Binding>,
    pub aliases: Diff<Alias>,
}

impl DiffResult {
    pub fn compute(desired: &RecordSet, actual: &RecordSet) -> Self {
        Self {
            bindings: Diff::compute(&desired.bindings, &actual.bindings),
            aliases: Diff::compute(&desired.aliases, &actual.aliases),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.aliases.is_empty()
    }

    /// Number of store operations needed to converge
    pub fn operation_count(&self) -> usize {
        self.bindings.len() + self.aliases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> BTreeSet<Binding> {
        pairs.iter().map(|(h, ip)| Binding::new(*h, *ip)).collect()
    }

    #[test]
    fn add_and_remove_are_plain_set_differences() {
        let desired = bindings(&[("h1", "1.1.1.1"), ("h2", "2.2.2.2")]);
        let actual = bindings(&[("h1", "1.1.1.1"), ("h3", "3.3.3.3")]);

        let diff = Diff::compute(&desired, &actual);

        assert_eq!(diff.to_add, bindings(&[("h2", "2.2.2.2")]));
        assert_eq!(diff.to_remove, bindings(&[("h3", "3.3.3.3")]));
        assert!(!diff.to_add.iter().chain(&diff.to_remove).any(|b| b.hostname == "h1"));
    }

    #[test]
    fn changed_ip_is_one_add_and_one_remove() {
        let desired = bindings(&[("nas", "10.0.0.6")]);
        let actual = bindings(&[("nas", "10.0.0.5")]);

        let diff = Diff::compute(&desired, &actual);

        assert_eq!(diff.to_add, bindings(&[("nas", "10.0.0.6")]));
        assert_eq!(diff.to_remove, bindings(&[("nas", "10.0.0.5")]));
        assert!(diff.to_add.is_disjoint(&diff.to_remove));
    }

    #[test]
    fn identical_sets_produce_no_operations() {
        let set = bindings(&[("h1", "1.1.1.1"), ("h2", "2.2.2.2")]);
        let diff = Diff::compute(&set, &set);
        assert!(diff.is_empty());
        assert_eq!(diff.len(), 0);
    }

    #[test]
    fn diff_is_deterministic() {
        let desired = bindings(&[("a", "1.1.1.1"), ("b", "2.2.2.2")]);
        let actual = bindings(&[("c", "3.3.3.3")]);
        assert_eq!(Diff::compute(&desired, &actual), Diff::compute(&desired, &actual));
    }

    #[test]
    fn record_kinds_are_diffed_independently() {
        let desired = RecordSet::new(
            bindings(&[("app.example.com", "10.0.0.1")]),
            [Alias::new("app.example.com", "edge.home.arpa")].into(),
        );
        let actual = RecordSet::new(
            BTreeSet::new(),
            [Alias::new("app.example.com", "edge.home.arpa")].into(),
        );

        let diff = DiffResult::compute(&desired, &actual);

        assert_eq!(diff.bindings.to_add.len(), 1);
        assert!(diff.aliases.is_empty());
        assert_eq!(diff.operation_count(), 1);
    }
}
