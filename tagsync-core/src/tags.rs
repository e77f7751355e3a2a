//! Tags - Label sets and their list representation
//!
//! A [`LabelSet`] is the key → value tag state of a resource. Some AWS APIs
//! carry tags as a list of `{Key, Value}` pairs instead; [`KeyValue`] and the
//! [`TagPair`] trait cover that shape.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::reserved::ReservedKeys;

/// Accessors shared by every tag pair type
///
/// Each service SDK defines its own tag struct. Implementing this trait for
/// one lets it flow through the generic helpers in this crate.
pub trait TagPair {
    fn key(&self) -> &str;
    fn value(&self) -> &str;
}

impl<T: TagPair + ?Sized> TagPair for &T {
    fn key(&self) -> &str {
        (**self).key()
    }

    fn value(&self) -> &str {
        (**self).value()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> TagPair for (K, V) {
    fn key(&self) -> &str {
        self.0.as_ref()
    }

    fn value(&self) -> &str {
        self.1.as_ref()
    }
}

/// A single tag in the list representation (CloudFormation shape)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyValue {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl TagPair for KeyValue {
    fn key(&self) -> &str {
        &self.key
    }

    fn value(&self) -> &str {
        &self.value
    }
}

/// Tag state of a resource, keyed by tag key
///
/// Iteration is ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet {
    tags: BTreeMap<String, String>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a LabelSet from a list of pairs, without filtering
    ///
    /// When a key appears more than once, the last value wins.
    pub fn from_pairs<I, P>(pairs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: TagPair,
    {
        pairs
            .into_iter()
            .map(|p| (p.key().to_string(), p.value().to_string()))
            .collect()
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.tags.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.tags.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.tags.iter()
    }

    /// Tag keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        self.tags.keys().cloned().collect()
    }

    pub fn to_pairs(&self) -> Vec<KeyValue> {
        self.iter().map(|(k, v)| KeyValue::new(k, v)).collect()
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        self.tags
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Keep only the entries whose key satisfies `keep`
    pub fn retain_keys(&self, mut keep: impl FnMut(&str) -> bool) -> LabelSet {
        self.iter()
            .filter(|(k, _)| keep(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Union of both sets; values from `other` win
    pub fn merge(&self, other: &LabelSet) -> LabelSet {
        let mut merged = self.clone();
        merged.extend(other.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Entries whose key is also present in `other`
    pub fn only(&self, other: &LabelSet) -> LabelSet {
        self.retain_keys(|k| other.contains_key(k))
    }

    /// Entries whose key is not present in `other` (values are not compared)
    pub fn ignore(&self, other: &LabelSet) -> LabelSet {
        self.retain_keys(|k| !other.contains_key(k))
    }

    /// Entries whose key starts with none of `prefixes`
    pub fn ignore_prefixes<S: AsRef<str>>(&self, prefixes: &[S]) -> LabelSet {
        self.retain_keys(|k| !prefixes.iter().any(|p| k.starts_with(p.as_ref())))
    }

    /// Entries of `self` whose key no longer exists in `new`
    pub fn removed(&self, new: &LabelSet) -> LabelSet {
        self.retain_keys(|k| !new.contains_key(k))
    }

    /// Entries of `new` that are missing from `self` or carry a different value
    pub fn updated(&self, new: &LabelSet) -> LabelSet {
        new.iter()
            .filter(|(k, v)| self.get(k) != Some(v.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Whether every entry of `target` is present here with the same value
    pub fn contains_all(&self, target: &LabelSet) -> bool {
        target.iter().all(|(k, v)| self.get(k) == Some(v.as_str()))
    }

    /// Split into sets of at most `size` entries
    ///
    /// A `size` of zero puts everything in a single chunk.
    pub fn chunks(&self, size: usize) -> Vec<LabelSet> {
        if self.is_empty() {
            return Vec::new();
        }
        if size == 0 {
            return vec![self.clone()];
        }

        let entries: Vec<(&String, &String)> = self.iter().collect();
        entries
            .chunks(size)
            .map(|chunk| chunk.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
            .collect()
    }

    /// `application/x-www-form-urlencoded` form, ordered by key
    pub fn url_encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }

    /// `key=value` pairs joined with `&`, without encoding
    pub fn url_query_string(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            tags: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for LabelSet {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.tags.insert(k.into(), v.into());
        }
    }
}

impl From<HashMap<String, String>> for LabelSet {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<BTreeMap<String, String>> for LabelSet {
    fn from(tags: BTreeMap<String, String>) -> Self {
        Self { tags }
    }
}

impl IntoIterator for LabelSet {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.into_iter()
    }
}

impl<'a> IntoIterator for &'a LabelSet {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

/// Convert raw API tag pairs to a LabelSet, dropping reserved keys
///
/// Duplicate keys collapse to the last value seen.
pub fn to_label_set<I, P>(pairs: I, reserved: &ReservedKeys) -> LabelSet
where
    I: IntoIterator<Item = P>,
    P: TagPair,
{
    pairs
        .into_iter()
        .filter(|p| !reserved.is_reserved(p.key()))
        .map(|p| (p.key().to_string(), p.value().to_string()))
        .collect()
}

/// Convert a LabelSet to the list representation
///
/// No filtering is applied here; callers pass sets that already went through
/// [`to_label_set`] or reconciliation.
pub fn from_label_set(set: &LabelSet) -> Vec<KeyValue> {
    set.to_pairs()
}
