//! Tagger - Trait abstracting the tag/untag API of a cloud service
//!
//! A Tagger turns a [`Reconciliation`] into actual API calls. Each service
//! (Cloud Control, S3, ...) implements this trait.

use std::future::Future;
use std::pin::Pin;

use log::info;
use thiserror::Error;

use crate::reconcile::{Reconciliation, reconcile};
use crate::reserved::ReservedKeys;
use crate::tags::LabelSet;

/// Error type for Tagger operations
#[derive(Debug)]
pub struct TaggerError {
    pub message: String,
    pub resource: Option<String>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for TaggerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref resource) = self.resource {
            write!(f, "[{}] {}", resource, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for TaggerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl TaggerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource: None,
            cause: None,
        }
    }

    pub fn for_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type TaggerResult<T> = Result<T, TaggerError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Main Tagger trait
///
/// `resource` is the service-specific address of the resource (an ARN, a
/// bucket name, a Cloud Control `TYPE|IDENTIFIER` pair).
pub trait Tagger: Send + Sync {
    /// Name of this Tagger (e.g., "cloudcontrol")
    fn name(&self) -> &'static str;

    /// Tags currently attached to the resource
    fn list_tags(&self, resource: &str) -> BoxFuture<'_, TaggerResult<LabelSet>>;

    /// Remove the given keys from the resource
    fn untag(&self, resource: &str, keys: &[String]) -> BoxFuture<'_, TaggerResult<()>>;

    /// Create or overwrite the given tags on the resource
    fn tag(&self, resource: &str, tags: &LabelSet) -> BoxFuture<'_, TaggerResult<()>>;
}

/// Tagger implementation for Box<dyn Tagger>
impl Tagger for Box<dyn Tagger> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn list_tags(&self, resource: &str) -> BoxFuture<'_, TaggerResult<LabelSet>> {
        (**self).list_tags(resource)
    }

    fn untag(&self, resource: &str, keys: &[String]) -> BoxFuture<'_, TaggerResult<()>> {
        (**self).untag(resource, keys)
    }

    fn tag(&self, resource: &str, tags: &LabelSet) -> BoxFuture<'_, TaggerResult<()>> {
        (**self).tag(resource, tags)
    }
}

/// Errors from running a reconciliation against a Tagger
///
/// Nothing is retried. The untag and tag calls are not atomic, so a failed
/// tag call reports the keys that were already removed.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Failed to list tags: {0}")]
    List(#[source] TaggerError),

    #[error("Failed to remove tags: {0}")]
    Untag(#[source] TaggerError),

    #[error("Failed to set tags after removing {applied_removals:?}: {source}")]
    Tag {
        source: TaggerError,
        applied_removals: Vec<String>,
    },
}

impl UpdateError {
    /// Whether the resource may have been left between the old and new state
    pub fn is_partial(&self) -> bool {
        matches!(self, UpdateError::Tag { applied_removals, .. } if !applied_removals.is_empty())
    }
}

/// Reconcile `old` against `new` and issue the untag and tag calls
///
/// Untag runs first, then tag. Returns the reconciliation so the caller can
/// persist `apply_to(old)`.
pub async fn update_tags<T>(
    tagger: &T,
    resource: &str,
    old: &LabelSet,
    new: &LabelSet,
    reserved: &ReservedKeys,
) -> Result<Reconciliation, UpdateError>
where
    T: Tagger + ?Sized,
{
    let reconciliation = reconcile(old, new, reserved);

    if !reconciliation.to_remove.is_empty() {
        info!(
            "{}: removing {} tag(s) from {}",
            tagger.name(),
            reconciliation.to_remove.len(),
            resource
        );
        tagger
            .untag(resource, &reconciliation.to_remove)
            .await
            .map_err(|e| UpdateError::Untag(e.for_resource(resource)))?;
    }

    if !reconciliation.to_create.is_empty() {
        info!(
            "{}: setting {} tag(s) on {}",
            tagger.name(),
            reconciliation.to_create.len(),
            resource
        );
        tagger
            .tag(resource, &reconciliation.to_create)
            .await
            .map_err(|e| UpdateError::Tag {
                source: e.for_resource(resource),
                applied_removals: reconciliation.to_remove.clone(),
            })?;
    }

    Ok(reconciliation)
}

/// Read the current tags from the Tagger, then run [`update_tags`]
pub async fn sync_tags<T>(
    tagger: &T,
    resource: &str,
    new: &LabelSet,
    reserved: &ReservedKeys,
) -> Result<Reconciliation, UpdateError>
where
    T: Tagger + ?Sized,
{
    let current = tagger
        .list_tags(resource)
        .await
        .map_err(|e| UpdateError::List(e.for_resource(resource)))?;
    let old = reserved.filter(&current);

    update_tags(tagger, resource, &old, new, reserved).await
}
