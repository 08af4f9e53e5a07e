//! Restoring trashed items
//!
//! Each item goes through the same steps: derive the destination from
//!  the item's original path, stat it, apply the [`RestorePolicy`] if it
//!  is taken, then issue exactly one restore call.

use tokio_util::sync::CancellationToken;

use super::{modify_filename, Gateway, GatewayError, RecycleItem, RestorePolicy, MIN_RENAME_ATTEMPTS};
use crate::reference::{make_relative_path, Reference};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestoreError {
    #[error("failed to list trash: {0}")]
    List(#[source] GatewayError),
    #[error("failed to stat destination {path}: {source}")]
    Stat {
        path: String,
        #[source]
        source: GatewayError,
    },
    #[error("failed to delete existing {path}: {source}")]
    Delete {
        path: String,
        #[source]
        source: GatewayError,
    },
    #[error("no free name for {path} after {attempts} attempts")]
    DestinationCollisionUnresolved { path: String, attempts: usize },
    #[error("failed to restore {key}: {source}")]
    Restore {
        key: String,
        #[source]
        source: GatewayError,
    },
    #[error("item '{0}' not found in trash")]
    ItemNotFound(String),
    #[error("restore cancelled")]
    Cancelled,
}

/// Terminal state of a successful restore call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Restored to this destination
    Restored(Reference),
    /// Destination taken and the policy said to leave it
    Skipped(Reference),
}

impl RestoreOutcome {
    pub fn destination(&self) -> &Reference {
        match self {
            RestoreOutcome::Restored(dst) | RestoreOutcome::Skipped(dst) => dst,
        }
    }
}

/// Result of restoring a batch of items
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub restored: Vec<(RecycleItem, Reference)>,
    pub skipped: Vec<(RecycleItem, Reference)>,
    pub failed: Vec<(RecycleItem, RestoreError)>,
    /// The batch stopped before every item was handled
    pub cancelled: bool,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    pub fn total(&self) -> usize {
        self.restored.len() + self.skipped.len() + self.failed.len()
    }
}

/// Restores trash items through a [`Gateway`], resolving name
///  collisions according to a [`RestorePolicy`]
#[derive(Debug)]
pub struct TrashRestoreResolver<G> {
    gateway: G,
    policy: RestorePolicy,
    max_rename_attempts: usize,
    cancel: CancellationToken,
}

impl<G: Gateway> TrashRestoreResolver<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            policy: RestorePolicy::default(),
            max_rename_attempts: MIN_RENAME_ATTEMPTS,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_policy(mut self, policy: RestorePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Ceiling for keep-both probing. Values below
    ///  [`MIN_RENAME_ATTEMPTS`] are raised to it.
    pub fn with_max_rename_attempts(mut self, attempts: usize) -> Self {
        if attempts < MIN_RENAME_ATTEMPTS {
            tracing::warn!(
                requested = attempts,
                minimum = MIN_RENAME_ATTEMPTS,
                "raising rename attempt ceiling to the minimum"
            );
        }
        self.max_rename_attempts = attempts.max(MIN_RENAME_ATTEMPTS);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn policy(&self) -> RestorePolicy {
        self.policy
    }

    pub fn max_rename_attempts(&self) -> usize {
        self.max_rename_attempts
    }

    /// Items in the trash of `space`
    pub async fn list(&self, space: &Reference) -> Result<Vec<RecycleItem>, RestoreError> {
        self.gateway
            .list_recycle(space)
            .await
            .map_err(RestoreError::List)
    }

    /// Restore a single item to where it was deleted from
    pub async fn restore(
        &self,
        space: &Reference,
        item: &RecycleItem,
    ) -> Result<RestoreOutcome, RestoreError> {
        if self.cancel.is_cancelled() {
            return Err(RestoreError::Cancelled);
        }

        let mut destination = space.with_path(make_relative_path(&item.path));

        if let Some(existing) = self.stat(&destination).await? {
            tracing::info!(key = %item.key, path = %existing.path, "destination exists");
            match self.policy {
                RestorePolicy::Skip => {
                    tracing::info!(key = %item.key, path = %destination.path, "skipping restore");
                    return Ok(RestoreOutcome::Skipped(destination));
                }
                RestorePolicy::Replace => match self.gateway.delete(&destination).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(source) => {
                        return Err(RestoreError::Delete {
                            path: destination.path.clone(),
                            source,
                        })
                    }
                },
                RestorePolicy::KeepBoth => {
                    destination = self.free_destination(&destination).await?;
                }
            }
        }

        let key = item.key.trim_end_matches('/');
        let restored = self
            .gateway
            .restore(space, key, &destination)
            .await
            .map_err(|source| RestoreError::Restore {
                key: item.key.clone(),
                source,
            })?;
        tracing::info!(key = %item.key, path = %item.path, destination = %restored.path, "restored item");
        Ok(RestoreOutcome::Restored(restored))
    }

    /// Look an item up by key and restore it
    pub async fn restore_by_key(
        &self,
        space: &Reference,
        key: &str,
    ) -> Result<(RecycleItem, RestoreOutcome), RestoreError> {
        let item = self
            .list(space)
            .await?
            .into_iter()
            .find(|item| item.key == key)
            .ok_or_else(|| RestoreError::ItemNotFound(key.to_string()))?;
        let outcome = self.restore(space, &item).await?;
        Ok((item, outcome))
    }

    /// Restore every item independently; failures are collected and
    ///  the batch carries on
    pub async fn restore_all(&self, space: &Reference, items: Vec<RecycleItem>) -> BatchReport {
        let mut report = BatchReport::default();
        for item in items {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            tracing::info!(key = %item.key, path = %item.path, kind = %item.kind, "restoring item");
            match self.restore(space, &item).await {
                Ok(RestoreOutcome::Restored(dst)) => report.restored.push((item, dst)),
                Ok(RestoreOutcome::Skipped(dst)) => report.skipped.push((item, dst)),
                Err(RestoreError::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(key = %item.key, error = %e, "failed to restore item");
                    report.failed.push((item, e));
                }
            }
        }
        report
    }

    /// Stat, mapping not-found to `None`
    async fn stat(&self, reference: &Reference) -> Result<Option<super::ResourceInfo>, RestoreError> {
        match self.gateway.stat(reference).await {
            Ok(info) => Ok(info),
            Err(e) if e.is_not_found() => Ok(None),
            Err(source) => Err(RestoreError::Stat {
                path: reference.path.clone(),
                source,
            }),
        }
    }

    /// First `name (n).ext` that doesn't exist yet
    async fn free_destination(&self, taken: &Reference) -> Result<Reference, RestoreError> {
        for n in 1..self.max_rename_attempts {
            let candidate = taken.with_path(modify_filename(&taken.path, n));
            if self.stat(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            tracing::debug!(path = %candidate.path, "candidate taken");
        }
        Err(RestoreError::DestinationCollisionUnresolved {
            path: taken.path.clone(),
            attempts: self.max_rename_attempts,
        })
    }
}
