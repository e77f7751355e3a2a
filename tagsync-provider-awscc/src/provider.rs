//! AWS Cloud Control Tagger implementation
//!
//! This module contains the tagger that reads and writes the `Tags` property
//! of resources through the AWS Cloud Control API.

use std::time::Duration;

use aws_config::Region;
use aws_sdk_cloudcontrol::Client as CloudControlClient;
use aws_sdk_cloudcontrol::types::OperationStatus;
use log::{debug, warn};
use serde_json::json;
use tagsync_core::{LabelSet, ReservedKeys, TaggerError, TaggerResult};

use crate::resources::ResourceAddress;
use crate::utils::{tags_from_json, tags_to_json};

/// Tags property of a resource as Cloud Control reported it
struct CurrentTags {
    tags: LabelSet,
    /// Whether the resource had a `Tags` property at all
    present: bool,
}

/// AWS Cloud Control Tagger
pub struct AwsccTagger {
    cloudcontrol_client: CloudControlClient,
    region: String,
    max_attempts: u32,
    delay: Duration,
}

impl AwsccTagger {
    /// Default number of status polls before giving up
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;
    /// Default delay between status polls
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

    /// Create a new AwsccTagger for the specified region
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            cloudcontrol_client: CloudControlClient::new(&config),
            region: region.to_string(),
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            delay: Self::DEFAULT_DELAY,
        }
    }

    /// Override how long to wait for Cloud Control operations
    pub fn with_polling(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.delay = delay;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    // =========================================================================
    // Cloud Control API Methods
    // =========================================================================

    /// Get a resource's properties using Cloud Control API
    pub async fn cc_get_resource(
        &self,
        type_name: &str,
        identifier: &str,
    ) -> TaggerResult<Option<serde_json::Value>> {
        let result = self
            .cloudcontrol_client
            .get_resource()
            .type_name(type_name)
            .identifier(identifier)
            .send()
            .await;

        match result {
            Ok(response) => {
                if let Some(desc) = response.resource_description()
                    && let Some(props_str) = desc.properties()
                {
                    let props: serde_json::Value =
                        serde_json::from_str(props_str).map_err(|e| {
                            TaggerError::new("Failed to parse resource properties").with_cause(e)
                        })?;
                    Ok(Some(props))
                } else {
                    Ok(None)
                }
            }
            Err(e) => {
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception())
                {
                    Ok(None)
                } else {
                    Err(TaggerError::new(format!("Failed to get resource: {:?}", e)))
                }
            }
        }
    }

    /// Update a resource using Cloud Control API
    pub async fn cc_update_resource(
        &self,
        type_name: &str,
        identifier: &str,
        patch_ops: Vec<serde_json::Value>,
    ) -> TaggerResult<()> {
        if patch_ops.is_empty() {
            return Ok(());
        }

        let patch_document = serde_json::to_string(&patch_ops)
            .map_err(|e| TaggerError::new(format!("Failed to build patch: {}", e)))?;

        let result = self
            .cloudcontrol_client
            .update_resource()
            .type_name(type_name)
            .identifier(identifier)
            .patch_document(patch_document)
            .send()
            .await
            .map_err(|e| TaggerError::new(format!("Failed to update resource: {:?}", e)))?;

        if let Some(request_token) = result.progress_event().and_then(|p| p.request_token()) {
            self.wait_for_operation(request_token).await?;
        }

        Ok(())
    }

    /// Wait for a Cloud Control operation to complete
    async fn wait_for_operation(&self, request_token: &str) -> TaggerResult<String> {
        for _ in 0..self.max_attempts {
            let status = self
                .cloudcontrol_client
                .get_resource_request_status()
                .request_token(request_token)
                .send()
                .await
                .map_err(|e| {
                    TaggerError::new(format!("Failed to get operation status: {:?}", e))
                })?;

            if let Some(progress) = status.progress_event() {
                match progress.operation_status() {
                    Some(OperationStatus::Success) => {
                        return Ok(progress.identifier().unwrap_or("").to_string());
                    }
                    Some(OperationStatus::Failed) => {
                        let msg = progress.status_message().unwrap_or("Unknown error");
                        return Err(TaggerError::new(format!("Operation failed: {}", msg)));
                    }
                    Some(OperationStatus::CancelComplete) => {
                        return Err(TaggerError::new("Operation was cancelled"));
                    }
                    _ => {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }

        Err(TaggerError::new("Operation timed out"))
    }

    // =========================================================================
    // Tag Operations
    // =========================================================================

    async fn current_tags(&self, address: &ResourceAddress) -> TaggerResult<CurrentTags> {
        address
            .taggable()
            .map_err(|e| TaggerError::new(e.to_string()))?;

        let props = self
            .cc_get_resource(&address.type_name, &address.identifier)
            .await?
            .ok_or_else(|| TaggerError::new("Resource not found"))?;

        Ok(match props.get("Tags").and_then(|v| v.as_array()) {
            Some(tags_array) => CurrentTags {
                tags: tags_from_json(tags_array),
                present: true,
            },
            None => CurrentTags {
                tags: LabelSet::new(),
                present: false,
            },
        })
    }

    /// Tags currently attached to a resource
    pub async fn read_tags(&self, address: &ResourceAddress) -> TaggerResult<LabelSet> {
        Ok(self.current_tags(address).await?.tags)
    }

    /// Remove keys from a resource's Tags property
    pub async fn untag_resource(
        &self,
        address: &ResourceAddress,
        keys: &[String],
    ) -> TaggerResult<()> {
        let current = self.current_tags(address).await?;
        let mut remaining = current.tags.clone();
        for key in keys {
            remaining.remove(key);
        }

        if remaining == current.tags {
            debug!("{}: no tags to remove", address);
            return Ok(());
        }

        self.write_tags(address, current.present, &remaining).await
    }

    /// Create or overwrite tags on a resource's Tags property
    pub async fn tag_resource(&self, address: &ResourceAddress, tags: &LabelSet) -> TaggerResult<()> {
        let current = self.current_tags(address).await?;
        let merged = current.tags.merge(tags);

        if merged == current.tags {
            debug!("{}: tags already set", address);
            return Ok(());
        }

        self.write_tags(address, current.present, &merged).await
    }

    /// Replace the whole Tags property in one patch
    ///
    /// Keys under `aws:` are owned by AWS and are left out of the written list.
    async fn write_tags(
        &self,
        address: &ResourceAddress,
        present: bool,
        tags: &LabelSet,
    ) -> TaggerResult<()> {
        let reserved = ReservedKeys::aws_default();
        let writable = reserved.filter(tags);
        if writable.len() != tags.len() {
            warn!(
                "{}: leaving {} reserved tag(s) out of the update",
                address,
                tags.len() - writable.len()
            );
        }

        let patch_ops = build_tags_patch(present, &writable);
        self.cc_update_resource(&address.type_name, &address.identifier, patch_ops)
            .await
    }
}

/// JSON Patch operations that set the Tags property to `tags`
fn build_tags_patch(present: bool, tags: &LabelSet) -> Vec<serde_json::Value> {
    match (present, tags.is_empty()) {
        (true, true) => vec![json!({"op": "remove", "path": "/Tags"})],
        (false, true) => Vec::new(),
        (true, false) => vec![json!({"op": "replace", "path": "/Tags", "value": tags_to_json(tags)})],
        (false, false) => vec![json!({"op": "add", "path": "/Tags", "value": tags_to_json(tags)})],
    }
}
