//! tagsync AWS Taggers
//!
//! Tagger implementations for AWS.
//!
//! ## Module Structure
//!
//! - `resources` - Resource addresses and the taggable resource types
//! - `provider` - AwsccTagger, tags through the Cloud Control API
//! - `s3` - S3BucketTagger, tags through the S3 bucket tagging API
//! - `utils` - Helper functions for region normalization and tag JSON

pub mod provider;
pub mod resources;
pub mod s3;
pub mod utils;

// Re-export main types
pub use provider::AwsccTagger;
pub use resources::{AddressError, ResourceAddress, TaggableResource, taggable_resource};
pub use s3::S3BucketTagger;
pub use utils::normalize_region;

use tagsync_core::{BoxFuture, LabelSet, ReservedKeys, Tagger, TaggerError, TaggerResult};

/// Parse a `TYPE|IDENTIFIER` resource string into an address
fn parse_address(resource: &str) -> TaggerResult<ResourceAddress> {
    resource
        .parse()
        .map_err(|e: AddressError| TaggerError::new(e.to_string()))
}

/// Reserved keys that apply to the resource behind `resource`
///
/// Unknown or malformed addresses fall back to the `aws:` rule.
pub fn reserved_keys_for(resource: &str) -> ReservedKeys {
    resource
        .parse::<ResourceAddress>()
        .ok()
        .and_then(|addr| addr.taggable().ok())
        .map(|r| r.reserved.reserved_keys())
        .unwrap_or_default()
}

// =============================================================================
// Tagger Trait Implementation
// =============================================================================

impl Tagger for AwsccTagger {
    fn name(&self) -> &'static str {
        "cloudcontrol"
    }

    fn list_tags(&self, resource: &str) -> BoxFuture<'_, TaggerResult<LabelSet>> {
        let resource = resource.to_string();
        Box::pin(async move {
            let address = parse_address(&resource)?;
            self.read_tags(&address).await
        })
    }

    fn untag(&self, resource: &str, keys: &[String]) -> BoxFuture<'_, TaggerResult<()>> {
        let resource = resource.to_string();
        let keys = keys.to_vec();
        Box::pin(async move {
            let address = parse_address(&resource)?;
            self.untag_resource(&address, &keys).await
        })
    }

    fn tag(&self, resource: &str, tags: &LabelSet) -> BoxFuture<'_, TaggerResult<()>> {
        let resource = resource.to_string();
        let tags = tags.clone();
        Box::pin(async move {
            let address = parse_address(&resource)?;
            self.tag_resource(&address, &tags).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_keys_follow_resource_type() {
        let rds = reserved_keys_for("AWS::RDS::DBCluster|cluster-1");
        assert!(rds.is_reserved("rds:managed"));
        assert!(rds.is_reserved("aws:cloudformation:stack-id"));

        let vpc = reserved_keys_for("AWS::EC2::VPC|vpc-0abc");
        assert!(!vpc.is_reserved("rds:managed"));
        assert!(vpc.is_reserved("aws:cloudformation:stack-id"));
    }

    #[test]
    fn reserved_keys_default_for_unknown_resources() {
        assert!(reserved_keys_for("not-an-address").is_reserved("aws:foo"));
        assert!(!reserved_keys_for("AWS::EC2::Route|r-1").is_reserved("Name"));
    }

    #[test]
    fn parse_address_reports_malformed_input() {
        let err = parse_address("vpc-0abc").unwrap_err();
        assert!(err.message.starts_with("Invalid resource address 'vpc-0abc'"));
    }
}
