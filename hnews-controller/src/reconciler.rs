//! Reconciliation cycle
//!
//! One cycle for one resource:
//! 1. Load the resource; a missing resource ends the cycle quietly, as does
//!    one deleted before a write lands.
//! 2. Normalize the filter; if anything was defaulted, write the spec back and
//!    stop (the spec write triggers the next cycle).
//! 3. Fetch ranked candidate ids.
//! 4. Fetch items in order and admit up to `limit` matches.
//! 5. Overwrite the status with the admitted links and `lastSyncedAt`.
//!
//! Transient failures (network, upstream status, store writes) defer the
//! resource by a fixed delay. Malformed upstream payloads abort the cycle with
//! an error and schedule nothing. The status is only written by step 5, so an
//! abandoned or failed cycle never leaves a partial list behind.

use hnews_common::resource::HNewsStatus;
use hnews_common::ResourceKey;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::assembler::assemble;
use crate::hn_client::{FetchError, ItemSource};
use crate::normalizer::normalize;
use crate::store::ResourceStore;

/// Delay before a deferred resource is retried
pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(30);

/// How a cycle ended without error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Resource no longer exists
    Skipped,
    /// Defaults written back at this generation
    Defaulted { generation: i64 },
    /// Status overwritten with this many links
    Synced { links: usize },
    /// Transient failure; retry after the delay
    Deferred { after: Duration, reason: String },
}

impl CycleOutcome {
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            CycleOutcome::Deferred { after, .. } => Some(*after),
            _ => None,
        }
    }
}

/// Cycle aborted; nothing is rescheduled
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Store error: {0}")]
    Store(#[from] hnews_common::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

pub struct Reconciler {
    store: Arc<dyn ResourceStore>,
    source: Arc<dyn ItemSource>,
    requeue_after: Duration,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ResourceStore>, source: Arc<dyn ItemSource>) -> Self {
        Self {
            store,
            source,
            requeue_after: DEFAULT_REQUEUE_AFTER,
        }
    }

    pub fn with_requeue_after(mut self, requeue_after: Duration) -> Self {
        self.requeue_after = requeue_after;
        self
    }

    pub fn requeue_after(&self) -> Duration {
        self.requeue_after
    }

    fn defer(&self, reason: impl ToString) -> CycleOutcome {
        CycleOutcome::Deferred {
            after: self.requeue_after,
            reason: reason.to_string(),
        }
    }

    pub async fn reconcile(&self, key: &ResourceKey) -> Result<CycleOutcome, ReconcileError> {
        let mut resource = match self.store.get(key).await {
            Ok(Some(resource)) => resource,
            Ok(None) => {
                info!(resource = %key, "Resource not found, skipping");
                return Ok(CycleOutcome::Skipped);
            }
            Err(e) => {
                error!(resource = %key, error = %e, "Unable to fetch resource");
                return Err(e.into());
            }
        };

        let (filter, defaulted) = normalize(&resource.spec.filter);
        if defaulted {
            resource.spec.filter = filter.into();
            return match self.store.update_spec(&resource).await {
                Ok(updated) => {
                    info!(
                        resource = %key,
                        generation = updated.metadata.generation,
                        "Filter defaults applied"
                    );
                    Ok(CycleOutcome::Defaulted {
                        generation: updated.metadata.generation,
                    })
                }
                Err(e) if e.is_not_found() => {
                    info!(resource = %key, "Resource deleted during cycle");
                    Ok(CycleOutcome::Skipped)
                }
                Err(e) => {
                    error!(resource = %key, error = %e, "Unable to write defaulted spec");
                    Ok(self.defer(e))
                }
            };
        }

        let ids = match self.source.list_candidate_ids().await {
            Ok(ids) => ids,
            Err(e) if e.is_transient() => {
                error!(resource = %key, error = %e, "Unable to list top stories");
                return Ok(self.defer(e));
            }
            Err(e) => {
                error!(resource = %key, error = %e, "Malformed top stories response");
                return Err(e.into());
            }
        };
        debug!(resource = %key, candidates = ids.len(), "Listed candidates");

        let links = match assemble(&ids, self.source.as_ref(), &filter).await {
            Ok(links) => links,
            Err(e) if e.is_transient() => {
                error!(resource = %key, error = %e, "Unable to fetch item");
                return Ok(self.defer(e));
            }
            Err(e) => {
                error!(resource = %key, error = %e, "Malformed item response");
                return Err(e.into());
            }
        };

        let count = links.len();
        resource.status = HNewsStatus {
            links,
            last_synced_at: Some(hnews_common::time::now()),
        };

        match self.store.update_status(&resource).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                info!(resource = %key, "Resource deleted during cycle");
                return Ok(CycleOutcome::Skipped);
            }
            Err(e) => {
                error!(resource = %key, error = %e, "Unable to write status");
                return Ok(self.defer(e));
            }
        }

        info!(resource = %key, links = count, "Status synced");
        Ok(CycleOutcome::Synced { links: count })
    }
}
