//! Utility functions for region normalization and tag JSON conversion

use serde_json::json;
use tagsync_core::{KeyValue, LabelSet};

/// Normalize region value (e.g., "aws.Region.ap_northeast_1" -> "ap-northeast-1")
pub fn normalize_region(s: &str) -> String {
    let region_part = if s.contains('.') {
        s.split('.').next_back().unwrap_or(s)
    } else {
        s
    };
    region_part.replace('_', "-")
}

/// Build tags array for CloudFormation format
pub fn tags_to_json(tags: &LabelSet) -> serde_json::Value {
    json!(tags.to_pairs())
}

/// Parse tags from CloudFormation format
///
/// Entries without a string `Key` and `Value` are skipped.
pub fn tags_from_json(tags_array: &[serde_json::Value]) -> LabelSet {
    let pairs = tags_array
        .iter()
        .filter_map(|tag| serde_json::from_value::<KeyValue>(tag.clone()).ok());
    LabelSet::from_pairs(pairs)
}
