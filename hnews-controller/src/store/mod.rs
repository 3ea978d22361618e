//! Resource store
//!
//! Typed access to `HNews` resources. Spec and status are written separately so
//! the controller can overwrite observed state without touching desired state.
//! Every successful write emits a [`ResourceEvent`] on the store's bus.
//!
//! Writes are last-write-wins; there is no optimistic-concurrency check.

mod memory;
mod retry;
mod sqlite;

pub use memory::MemoryStore;
pub use retry::retry_on_lock;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use hnews_common::events::ResourceEvent;
use hnews_common::{HNews, ResourceKey, Result};

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// `Ok(None)` when no resource has this key
    async fn get(&self, key: &ResourceKey) -> Result<Option<HNews>>;

    /// All resources ordered by namespace, then name
    async fn list(&self) -> Result<Vec<HNews>>;

    /// Insert a new resource at generation 1 with an empty status
    ///
    /// Fails with `Error::Conflict` if the key exists.
    async fn create(&self, resource: HNews) -> Result<HNews>;

    /// Replace the spec and bump the generation
    ///
    /// Fails with `Error::NotFound` if the key does not exist.
    async fn update_spec(&self, resource: &HNews) -> Result<HNews>;

    /// Replace the status; spec and generation are untouched
    ///
    /// Fails with `Error::NotFound` if the key does not exist.
    async fn update_status(&self, resource: &HNews) -> Result<()>;

    /// Fails with `Error::NotFound` if the key does not exist.
    async fn delete(&self, key: &ResourceKey) -> Result<()>;
}

fn created_event(key: ResourceKey) -> ResourceEvent {
    ResourceEvent::Created {
        key,
        timestamp: hnews_common::time::now(),
    }
}

fn spec_updated_event(key: ResourceKey, generation: i64) -> ResourceEvent {
    ResourceEvent::SpecUpdated {
        key,
        generation,
        timestamp: hnews_common::time::now(),
    }
}

fn status_updated_event(key: ResourceKey, links: usize) -> ResourceEvent {
    ResourceEvent::StatusUpdated {
        key,
        links,
        timestamp: hnews_common::time::now(),
    }
}

fn deleted_event(key: ResourceKey) -> ResourceEvent {
    ResourceEvent::Deleted {
        key,
        timestamp: hnews_common::time::now(),
    }
}
