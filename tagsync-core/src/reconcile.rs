//! Reconcile - Compare current tags with desired tags
//!
//! Compares the tags a resource currently carries with the tags declared in
//! configuration, and computes the tags to set and the keys to remove.
//! Nothing is called here; the result is handed to a [`crate::tagger::Tagger`].

use std::fmt;

use log::debug;

use crate::reserved::ReservedKeys;
use crate::tags::{LabelSet, TagPair};

/// A single tag-level change, for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagChange {
    /// Key does not exist yet
    Add { key: String, value: String },
    /// Key exists with another value
    Update {
        key: String,
        from: String,
        to: String,
    },
    /// Key exists but is no longer desired
    Remove { key: String, value: String },
}

impl TagChange {
    pub fn key(&self) -> &str {
        match self {
            TagChange::Add { key, .. }
            | TagChange::Update { key, .. }
            | TagChange::Remove { key, .. } => key,
        }
    }
}

/// Tags to set and keys to remove
///
/// A key whose value changed appears in both: it is untagged first and then
/// set again with its new value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Tags to create or overwrite, with their desired values
    pub to_create: LabelSet,
    /// Keys to remove, sorted and unique
    pub to_remove: Vec<String>,
}

impl Reconciliation {
    /// Returns whether no API call is needed
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_remove.is_empty()
    }

    pub fn keys_to_remove(&self) -> &[String] {
        &self.to_remove
    }

    /// Tag state of the resource once both calls have succeeded
    pub fn apply_to(&self, old: &LabelSet) -> LabelSet {
        let mut merged = old.clone();
        for key in &self.to_remove {
            merged.remove(key);
        }
        merged.merge(&self.to_create)
    }

    /// Per-key view of the reconciliation, ordered by key
    pub fn changes(&self, old: &LabelSet) -> Vec<TagChange> {
        let mut changes = Vec::new();

        for (key, value) in &self.to_create {
            match old.get(key) {
                Some(from) if self.to_remove.contains(key) => changes.push(TagChange::Update {
                    key: key.clone(),
                    from: from.to_string(),
                    to: value.clone(),
                }),
                _ => changes.push(TagChange::Add {
                    key: key.clone(),
                    value: value.clone(),
                }),
            }
        }

        for key in &self.to_remove {
            if !self.to_create.contains_key(key) {
                changes.push(TagChange::Remove {
                    key: key.clone(),
                    value: old.get(key).unwrap_or_default().to_string(),
                });
            }
        }

        changes.sort_by(|a, b| a.key().cmp(b.key()));
        changes
    }

    /// Generate a summary of the Reconciliation for display
    pub fn summary(&self) -> ReconciliationSummary {
        let update = self
            .to_remove
            .iter()
            .filter(|k| self.to_create.contains_key(k))
            .count();

        ReconciliationSummary {
            add: self.to_create.len() - update,
            update,
            remove: self.to_remove.len() - update,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationSummary {
    pub add: usize,
    pub update: usize,
    pub remove: usize,
}

impl fmt::Display for ReconciliationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tags: {} to add, {} to update, {} to remove",
            self.add, self.update, self.remove
        )
    }
}

/// Compare current tags (`old`) with desired tags (`new`)
///
/// Reserved keys are dropped from both sides and never appear in the result.
pub fn reconcile(old: &LabelSet, new: &LabelSet, reserved: &ReservedKeys) -> Reconciliation {
    let mut to_create = reserved.filter(new);
    let mut to_remove = Vec::new();

    for (key, old_value) in old {
        if reserved.is_reserved(key) {
            continue;
        }

        match to_create.get(key) {
            Some(new_value) if new_value == old_value => {
                to_create.remove(key);
            }
            _ => to_remove.push(key.clone()),
        }
    }

    debug!(
        "Reconciled {} current / {} desired tag(s): {} to set, {} to remove",
        old.len(),
        new.len(),
        to_create.len(),
        to_remove.len()
    );

    Reconciliation {
        to_create,
        to_remove,
    }
}

/// [`reconcile`] over the list representation
///
/// Duplicate keys collapse to their last value first, so no key is ever
/// repeated in `to_remove`.
pub fn reconcile_pairs<O, N>(old: &[O], new: &[N], reserved: &ReservedKeys) -> Reconciliation
where
    O: TagPair,
    N: TagPair,
{
    reconcile(
        &LabelSet::from_pairs(old),
        &LabelSet::from_pairs(new),
        reserved,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::KeyValue;

    fn set(pairs: &[(&str, &str)]) -> LabelSet {
        pairs.iter().copied().collect()
    }

    fn aws() -> ReservedKeys {
        ReservedKeys::aws()
    }

    #[test]
    fn identical_sets_need_no_change() {
        let tags = set(&[("foo", "bar"), ("hello", "world"), ("", "")]);
        let result = reconcile(&tags, &tags, &aws());

        assert!(result.is_empty());
        assert!(result.to_create.is_empty());
        assert!(result.to_remove.is_empty());
    }

    #[test]
    fn create_only() {
        let new = set(&[("foo", "bar"), ("aws:reserved", "x")]);
        let result = reconcile(&LabelSet::new(), &new, &aws());

        assert_eq!(result.to_create, set(&[("foo", "bar")]));
        assert!(result.to_remove.is_empty());
    }

    #[test]
    fn remove_only() {
        let old = set(&[("foo", "bar"), ("bar", "baz"), ("aws:reserved", "x")]);
        let result = reconcile(&old, &LabelSet::new(), &aws());

        assert!(result.to_create.is_empty());
        assert_eq!(result.to_remove, vec!["bar".to_string(), "foo".to_string()]);
    }

    #[test]
    fn value_change_creates_and_removes() {
        let result = reconcile(&set(&[("foo", "bar")]), &set(&[("foo", "baz")]), &aws());

        assert_eq!(result.to_create, set(&[("foo", "baz")]));
        assert_eq!(result.to_remove, vec!["foo".to_string()]);
    }

    #[test]
    fn overlap_leaves_unchanged_keys_alone() {
        let old = set(&[("foo", "bar"), ("hello", "world")]);
        let new = set(&[("foo", "baz"), ("hello", "world")]);
        let result = reconcile(&old, &new, &aws());

        assert_eq!(result.to_create, set(&[("foo", "baz")]));
        assert_eq!(result.to_remove, vec!["foo".to_string()]);
    }

    #[test]
    fn remove_scenario() {
        let old = set(&[("foo", "bar"), ("bar", "baz")]);
        let new = set(&[("foo", "bar")]);
        let result = reconcile(&old, &new, &aws());

        assert!(result.to_create.is_empty());
        assert_eq!(result.to_remove, vec!["bar".to_string()]);
    }

    #[test]
    fn reserved_keys_never_appear() {
        let key = "aws:cloudformation:logical-id";
        let result = reconcile(&set(&[(key, "v1")]), &set(&[(key, "v2")]), &aws());

        assert!(result.is_empty());

        let only_old = reconcile(&set(&[(key, "v1")]), &LabelSet::new(), &aws());
        assert!(only_old.is_empty());

        let only_new = reconcile(&LabelSet::new(), &set(&[(key, "v2")]), &aws());
        assert!(only_new.is_empty());
    }

    #[test]
    fn reserved_predicate_is_configurable() {
        let reserved = ReservedKeys::new(["^internal/"]).unwrap();
        let old = set(&[("internal/owner", "a"), ("aws:tag", "x")]);
        let new = set(&[("internal/owner", "b")]);
        let result = reconcile(&old, &new, &reserved);

        assert!(result.to_create.is_empty());
        assert_eq!(result.to_remove, vec!["aws:tag".to_string()]);
    }

    #[test]
    fn pairs_with_duplicate_keys_remove_once() {
        let old = vec![
            KeyValue::new("foo", "bar"),
            KeyValue::new("foo", "bar"),
            KeyValue::new("env", "dev"),
            KeyValue::new("env", "test"),
        ];
        let new = vec![KeyValue::new("env", "test")];
        let result = reconcile_pairs(&old, &new, &aws());

        assert!(result.to_create.is_empty());
        assert_eq!(result.to_remove, vec!["foo".to_string()]);
    }

    #[test]
    fn apply_to_yields_desired_state() {
        let old = set(&[("foo", "bar"), ("hello", "world"), ("gone", "x"), ("aws:id", "1")]);
        let new = set(&[("foo", "baz"), ("hello", "world"), ("added", "y")]);
        let result = reconcile(&old, &new, &aws());

        assert_eq!(
            result.apply_to(&old),
            set(&[("foo", "baz"), ("hello", "world"), ("added", "y"), ("aws:id", "1")])
        );
    }

    #[test]
    fn changes_and_summary() {
        let old = set(&[("foo", "bar"), ("hello", "world"), ("gone", "x")]);
        let new = set(&[("foo", "baz"), ("hello", "world"), ("added", "y")]);
        let result = reconcile(&old, &new, &aws());

        assert_eq!(
            result.changes(&old),
            vec![
                TagChange::Add {
                    key: "added".to_string(),
                    value: "y".to_string()
                },
                TagChange::Update {
                    key: "foo".to_string(),
                    from: "bar".to_string(),
                    to: "baz".to_string()
                },
                TagChange::Remove {
                    key: "gone".to_string(),
                    value: "x".to_string()
                },
            ]
        );

        let summary = result.summary();
        assert_eq!(
            summary,
            ReconciliationSummary {
                add: 1,
                update: 1,
                remove: 1
            }
        );
        assert_eq!(
            summary.to_string(),
            "Tags: 1 to add, 1 to update, 1 to remove"
        );
    }
}
