//! In-memory store, used with `--in-memory` and in tests

use async_trait::async_trait;
use hnews_common::events::EventBus;
use hnews_common::{Error, HNews, ResourceKey, Result};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{created_event, deleted_event, spec_updated_event, status_updated_event, ResourceStore};

pub struct MemoryStore {
    resources: RwLock<BTreeMap<ResourceKey, HNews>>,
    event_bus: EventBus,
}

impl MemoryStore {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            resources: RwLock::new(BTreeMap::new()),
            event_bus,
        }
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<HNews>> {
        Ok(self.resources.read().await.get(key).cloned())
    }

    async fn list(&self) -> Result<Vec<HNews>> {
        Ok(self.resources.read().await.values().cloned().collect())
    }

    async fn create(&self, mut resource: HNews) -> Result<HNews> {
        let key = resource.key();
        {
            let mut resources = self.resources.write().await;
            if resources.contains_key(&key) {
                return Err(Error::Conflict(key.to_string()));
            }

            resource.metadata.generation = 1;
            resource.metadata.created_at = Some(hnews_common::time::now());
            resource.status = Default::default();
            resources.insert(key.clone(), resource.clone());
        }

        self.event_bus.emit_lossy(created_event(key));
        Ok(resource)
    }

    async fn update_spec(&self, resource: &HNews) -> Result<HNews> {
        let key = resource.key();
        let updated = {
            let mut resources = self.resources.write().await;
            let stored = resources
                .get_mut(&key)
                .ok_or_else(|| Error::NotFound(key.to_string()))?;

            stored.spec = resource.spec.clone();
            stored.metadata.generation += 1;
            stored.clone()
        };

        self.event_bus
            .emit_lossy(spec_updated_event(key, updated.metadata.generation));
        Ok(updated)
    }

    async fn update_status(&self, resource: &HNews) -> Result<()> {
        let key = resource.key();
        {
            let mut resources = self.resources.write().await;
            let stored = resources
                .get_mut(&key)
                .ok_or_else(|| Error::NotFound(key.to_string()))?;

            stored.status = resource.status.clone();
        }

        self.event_bus
            .emit_lossy(status_updated_event(key, resource.status.links.len()));
        Ok(())
    }

    async fn delete(&self, key: &ResourceKey) -> Result<()> {
        if self.resources.write().await.remove(key).is_none() {
            return Err(Error::NotFound(key.to_string()));
        }

        self.event_bus.emit_lossy(deleted_event(key.clone()));
        Ok(())
    }
}
