//! Configuration - Ignore rules, default tags and the tagsync config file

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reserved::{AWS_RESERVED_PATTERN, ReservedKeys};
use crate::tags::LabelSet;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid reserved key pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Tags the user wants left alone
///
/// Ignored tags are dropped from both the current and the desired side before
/// reconciling, so they are never added, changed or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IgnoreConfig {
    /// Exact keys to ignore
    pub keys: Vec<String>,
    /// Key prefixes to ignore
    pub key_prefixes: Vec<String>,
}

impl IgnoreConfig {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.key_prefixes.is_empty()
    }

    pub fn apply(&self, tags: &LabelSet) -> LabelSet {
        if self.is_empty() {
            return tags.clone();
        }

        tags.retain_keys(|k| !self.keys.iter().any(|i| i == k))
            .ignore_prefixes(&self.key_prefixes)
    }
}

/// Provider-level tags applied to every resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefaultConfig {
    pub tags: LabelSet,
}

impl DefaultConfig {
    pub fn new(tags: LabelSet) -> Self {
        Self { tags }
    }

    /// Default tags overlaid with the resource's own tags
    pub fn merge_tags(&self, tags: &LabelSet) -> LabelSet {
        self.tags.merge(tags)
    }

    /// Drop entries that only repeat a default tag
    ///
    /// A resource tag that overrides a default with another value is kept.
    pub fn remove_default_config(&self, tags: &LabelSet) -> LabelSet {
        tags.iter()
            .filter(|(k, v)| self.tags.get(k) != Some(v.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn tags_equal(&self, tags: &LabelSet) -> bool {
        self.tags == *tags
    }
}

fn default_reserved_patterns() -> Vec<String> {
    vec![AWS_RESERVED_PATTERN.to_string()]
}

/// Contents of the tagsync configuration file
///
/// ```json
/// {
///   "reserved_key_patterns": ["^aws:"],
///   "ignore_tags": { "keys": ["Owner"], "key_prefixes": ["kubernetes.io/"] },
///   "default_tags": { "Environment": "production" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagConfig {
    #[serde(default = "default_reserved_patterns")]
    pub reserved_key_patterns: Vec<String>,
    #[serde(default)]
    pub ignore_tags: IgnoreConfig,
    #[serde(default)]
    pub default_tags: DefaultConfig,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            reserved_key_patterns: default_reserved_patterns(),
            ignore_tags: IgnoreConfig::default(),
            default_tags: DefaultConfig::default(),
        }
    }
}

impl TagConfig {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn reserved_keys(&self) -> Result<ReservedKeys, ConfigError> {
        ReservedKeys::new(&self.reserved_key_patterns)
    }

    /// Apply ignore rules to both sides and merge default tags into `new`
    pub fn prepare(&self, old: &LabelSet, new: &LabelSet) -> (LabelSet, LabelSet) {
        let new = self.default_tags.merge_tags(new);
        (self.ignore_tags.apply(old), self.ignore_tags.apply(&new))
    }
}
