//! tagsync Core
//!
//! Core library for reconciling cloud resource tags. Given the tags a resource
//! carries and the tags its configuration declares, it computes the tags to
//! set and the keys to remove, never touching provider-reserved keys.
//!
//! ## Module Structure
//!
//! - `tags` - LabelSet, the list representation and shape conversion
//! - `reserved` - Provider-reserved key rules (`aws:` by default)
//! - `reconcile` - The reconciliation itself
//! - `config` - Ignore rules, default tags and the config file
//! - `tagger` - Trait for tag/untag APIs and the update sequence

pub mod config;
pub mod reconcile;
pub mod reserved;
pub mod tagger;
pub mod tags;

// Re-export main types
pub use config::{ConfigError, DefaultConfig, IgnoreConfig, TagConfig};
pub use reconcile::{Reconciliation, ReconciliationSummary, TagChange, reconcile, reconcile_pairs};
pub use reserved::ReservedKeys;
pub use tagger::{
    BoxFuture, Tagger, TaggerError, TaggerResult, UpdateError, sync_tags, update_tags,
};
pub use tags::{KeyValue, LabelSet, TagPair, from_label_set, to_label_set};
