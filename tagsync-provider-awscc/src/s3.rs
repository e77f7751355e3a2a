//! S3 bucket tagging
//!
//! S3 has no per-key untag call: the bucket's tag set is read and written as
//! a whole, so both `untag` and `tag` are read-modify-write.

use aws_sdk_s3::Client;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::types::{Tag, Tagging};
use log::debug;
use tagsync_core::{BoxFuture, LabelSet, ReservedKeys, Tagger, TaggerError, TaggerResult};

/// Tagger for S3 buckets, addressed by bucket name
pub struct S3BucketTagger {
    client: Client,
    region: String,
}

impl S3BucketTagger {
    /// Create a new S3BucketTagger for the specified region
    pub async fn new(region: &str) -> Self {
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region.to_string()))
            .load()
            .await;

        Self {
            client: Client::new(&aws_config),
            region: region.to_string(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Read a bucket's tag set; a bucket without tags yields an empty set
    pub async fn get_bucket_tags(&self, bucket: &str) -> TaggerResult<LabelSet> {
        let result = self.client.get_bucket_tagging().bucket(bucket).send().await;

        match result {
            Ok(output) => Ok(tag_set_to_label_set(output.tag_set())),
            Err(err) => {
                if is_no_tag_set_error(&err) {
                    Ok(LabelSet::new())
                } else {
                    Err(TaggerError::new(format!("Failed to get bucket tagging: {}", err)))
                }
            }
        }
    }

    /// Replace a bucket's tag set, deleting it when `tags` is empty
    pub async fn put_bucket_tags(&self, bucket: &str, tags: &LabelSet) -> TaggerResult<()> {
        if tags.is_empty() {
            debug!("{}: deleting bucket tagging", bucket);
            self.client
                .delete_bucket_tagging()
                .bucket(bucket)
                .send()
                .await
                .map_err(|e| TaggerError::new(format!("Failed to delete bucket tagging: {}", e)))?;
            return Ok(());
        }

        let tagging = build_tagging(tags)?;
        self.client
            .put_bucket_tagging()
            .bucket(bucket)
            .tagging(tagging)
            .send()
            .await
            .map_err(|e| TaggerError::new(format!("Failed to put bucket tagging: {}", e)))?;

        Ok(())
    }

    async fn untag_bucket(&self, bucket: &str, keys: &[String]) -> TaggerResult<()> {
        let current = self.get_bucket_tags(bucket).await?;
        let mut remaining = current.clone();
        for key in keys {
            remaining.remove(key);
        }

        if remaining == current {
            return Ok(());
        }
        self.put_bucket_tags(bucket, &remaining).await
    }

    async fn tag_bucket(&self, bucket: &str, tags: &LabelSet) -> TaggerResult<()> {
        let current = self.get_bucket_tags(bucket).await?;
        let merged = current.merge(tags);

        if merged == current {
            return Ok(());
        }
        self.put_bucket_tags(bucket, &merged).await
    }
}

impl Tagger for S3BucketTagger {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn list_tags(&self, resource: &str) -> BoxFuture<'_, TaggerResult<LabelSet>> {
        let bucket = resource.to_string();
        Box::pin(async move { self.get_bucket_tags(&bucket).await })
    }

    fn untag(&self, resource: &str, keys: &[String]) -> BoxFuture<'_, TaggerResult<()>> {
        let bucket = resource.to_string();
        let keys = keys.to_vec();
        Box::pin(async move { self.untag_bucket(&bucket, &keys).await })
    }

    fn tag(&self, resource: &str, tags: &LabelSet) -> BoxFuture<'_, TaggerResult<()>> {
        let bucket = resource.to_string();
        let tags = tags.clone();
        Box::pin(async move { self.tag_bucket(&bucket, &tags).await })
    }
}

/// Build the S3 Tagging payload, leaving out `aws:` keys S3 refuses to write
fn build_tagging(tags: &LabelSet) -> TaggerResult<Tagging> {
    let tag_set = ReservedKeys::aws_default()
        .filter(tags)
        .iter()
        .map(|(k, v)| {
            Tag::builder()
                .key(k)
                .value(v)
                .build()
                .map_err(|e| TaggerError::new("Failed to build tag").with_cause(e))
        })
        .collect::<TaggerResult<Vec<_>>>()?;

    Tagging::builder()
        .set_tag_set(Some(tag_set))
        .build()
        .map_err(|e| TaggerError::new("Failed to build tagging").with_cause(e))
}

fn tag_set_to_label_set(tag_set: &[Tag]) -> LabelSet {
    LabelSet::from_pairs(tag_set.iter().map(|t| (t.key(), t.value())))
}

/// Check if an error means the bucket has no tag set
fn is_no_tag_set_error<E: ProvideErrorMetadata>(err: &E) -> bool {
    err.code() == Some("NoSuchTagSet")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdk_tags_convert_to_label_set() {
        let tags = vec![
            Tag::builder().key("Name").value("logs").build().unwrap(),
            Tag::builder()
                .key("aws:cloudformation:stack-name")
                .value("stack")
                .build()
                .unwrap(),
        ];

        let set = tag_set_to_label_set(&tags);
        assert_eq!(set.len(), 2);
        assert_eq!(ReservedKeys::aws().filter(&set).keys(), vec!["Name".to_string()]);
    }

    #[test]
    fn tagging_payload_skips_reserved_keys() {
        let tags: LabelSet = [("Name", "logs"), ("aws:createdBy", "x"), ("Team", "infra")]
            .into_iter()
            .collect();

        let tagging = build_tagging(&tags).unwrap();
        let keys: Vec<&str> = tagging.tag_set().iter().map(|t| t.key()).collect();
        assert_eq!(keys, vec!["Name", "Team"]);
    }
}
