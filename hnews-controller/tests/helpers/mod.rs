//! Shared fakes for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use hnews_common::events::EventBus;
use hnews_common::resource::{Comparison, Filter, HNewsSpec, ItemType};
use hnews_common::{Error, HNews, ResourceKey, Result};
use hnews_controller::hn_client::{FetchError, HackerNewsItem, ItemSource};
use hnews_controller::store::{MemoryStore, ResourceStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// How the fake upstream fails, if at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    None,
    Network,
    Status(u16),
    Decode,
}

impl Failure {
    fn to_error(self, url: &str) -> Option<FetchError> {
        match self {
            Failure::None => None,
            Failure::Network => Some(FetchError::Network("connection refused".into())),
            Failure::Status(status) => Some(FetchError::Status {
                status,
                url: url.to_string(),
            }),
            Failure::Decode => Some(FetchError::Decode {
                url: url.to_string(),
                message: "expected value".into(),
            }),
        }
    }
}

/// In-process [`ItemSource`] that records every call
pub struct FakeSource {
    ids: Vec<i64>,
    items: HashMap<i64, HackerNewsItem>,
    list_failure: Mutex<Failure>,
    item_failures: Mutex<HashMap<i64, Failure>>,
    list_calls: Mutex<usize>,
    fetched: Mutex<Vec<i64>>,
}

impl FakeSource {
    pub fn new(items: Vec<HackerNewsItem>) -> Self {
        Self {
            ids: items.iter().map(|item| item.id).collect(),
            items: items.into_iter().map(|item| (item.id, item)).collect(),
            list_failure: Mutex::new(Failure::None),
            item_failures: Mutex::new(HashMap::new()),
            list_calls: Mutex::new(0),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_list(&self, failure: Failure) {
        *self.list_failure.lock().unwrap() = failure;
    }

    pub fn fail_item(&self, id: i64, failure: Failure) {
        self.item_failures.lock().unwrap().insert(id, failure);
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }

    pub fn fetched(&self) -> Vec<i64> {
        self.fetched.lock().unwrap().clone()
    }

    /// Total upstream requests, list plus items
    pub fn calls(&self) -> usize {
        self.list_calls() + self.fetched().len()
    }
}

#[async_trait]
impl ItemSource for FakeSource {
    async fn list_candidate_ids(&self) -> std::result::Result<Vec<i64>, FetchError> {
        *self.list_calls.lock().unwrap() += 1;
        let failure = *self.list_failure.lock().unwrap();
        match failure.to_error("fake://topstories.json") {
            Some(e) => Err(e),
            None => Ok(self.ids.clone()),
        }
    }

    async fn fetch_item(&self, id: i64) -> std::result::Result<HackerNewsItem, FetchError> {
        self.fetched.lock().unwrap().push(id);
        let url = format!("fake://item/{}.json", id);
        let failure = self
            .item_failures
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .unwrap_or(Failure::None);
        if let Some(e) = failure.to_error(&url) {
            return Err(e);
        }
        self.items.get(&id).cloned().ok_or(FetchError::Decode {
            url,
            message: "malformed item".into(),
        })
    }
}

pub fn story(id: i64, score: i64, descendants: i64) -> HackerNewsItem {
    HackerNewsItem {
        by: "pg".into(),
        descendants,
        id,
        score,
        time: 1_160_418_111,
        title: format!("Story {}", id),
        item_type: "story".to_string(),
        url: format!("https://example.com/{}", id),
        ..HackerNewsItem::default()
    }
}

pub fn filter(limit: u32, score: &str, descendants: &str) -> Filter {
    Filter {
        limit: Some(limit),
        item_type: Some(ItemType::Story),
        score: Some(Comparison::from(score)),
        descendants: Some(Comparison::from(descendants)),
    }
}

pub fn key(name: &str) -> ResourceKey {
    ResourceKey::new("default", name)
}

pub async fn seed(store: &dyn ResourceStore, name: &str, filter: Filter) -> HNews {
    store
        .create(HNews::new(key(name), HNewsSpec { filter }))
        .await
        .expect("Should create resource")
}

/// [`MemoryStore`] whose writes can be made to fail
pub struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
    delete_before_status_write: AtomicBool,
    status_writes: Mutex<usize>,
}

impl FlakyStore {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            inner: MemoryStore::new(event_bus),
            fail_writes: AtomicBool::new(false),
            delete_before_status_write: AtomicBool::new(false),
            status_writes: Mutex::new(0),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Remove the resource just before the next status write lands
    pub fn delete_before_status_write(&self, delete: bool) {
        self.delete_before_status_write.store(delete, Ordering::SeqCst);
    }

    /// Status writes attempted, including failed ones
    pub fn status_writes(&self) -> usize {
        *self.status_writes.lock().unwrap()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Internal("database is read-only".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for FlakyStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<HNews>> {
        self.inner.get(key).await
    }

    async fn list(&self) -> Result<Vec<HNews>> {
        self.inner.list().await
    }

    async fn create(&self, resource: HNews) -> Result<HNews> {
        self.inner.create(resource).await
    }

    async fn update_spec(&self, resource: &HNews) -> Result<HNews> {
        self.check_writable()?;
        self.inner.update_spec(resource).await
    }

    async fn update_status(&self, resource: &HNews) -> Result<()> {
        *self.status_writes.lock().unwrap() += 1;
        self.check_writable()?;
        if self.delete_before_status_write.swap(false, Ordering::SeqCst) {
            self.inner.delete(&resource.key()).await?;
        }
        self.inner.update_status(resource).await
    }

    async fn delete(&self, key: &ResourceKey) -> Result<()> {
        self.inner.delete(key).await
    }
}
