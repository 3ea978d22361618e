//! Integration tests for the controller runner

mod helpers;

use helpers::{filter, key, seed, story, FakeSource, Failure};
use hnews_common::events::EventBus;
use hnews_common::resource::{Filter, HNewsSpec};
use hnews_common::HNews;
use hnews_controller::controller::Controller;
use hnews_controller::reconciler::Reconciler;
use hnews_controller::store::{MemoryStore, ResourceStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    store: Arc<MemoryStore>,
    source: Arc<FakeSource>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Spawn the controller and let it consume its startup resync tick
async fn start(source: FakeSource, requeue_after: Duration) -> Harness {
    let event_bus = EventBus::new(64);
    let store = Arc::new(MemoryStore::new(event_bus.clone()));
    let source = Arc::new(source);
    let reconciler =
        Reconciler::new(store.clone(), source.clone()).with_requeue_after(requeue_after);
    let controller = Controller::new(
        Arc::new(reconciler),
        store.clone(),
        event_bus,
        Duration::from_secs(3600),
    );

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(controller.run(cancel.clone()));
    tokio::time::sleep(Duration::from_millis(20)).await;

    Harness {
        store,
        source,
        cancel,
        handle,
    }
}

/// Poll until the resource has been synced at least once
async fn wait_for_sync(store: &MemoryStore, name: &str) -> HNews {
    tokio::time::timeout(WAIT, async {
        loop {
            if let Some(resource) = store.get(&key(name)).await.unwrap() {
                if resource.status.last_synced_at.is_some() {
                    return resource;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Resource should be synced")
}

#[tokio::test]
async fn test_created_resource_is_defaulted_then_synced() {
    let harness = start(
        FakeSource::new(vec![story(1, 500, 50), story(2, 10, 0), story(3, 300, 6)]),
        Duration::from_secs(30),
    )
    .await;

    seed(harness.store.as_ref(), "sample", Filter::default()).await;
    let synced = wait_for_sync(&harness.store, "sample").await;

    // Defaults: limit 5, score >200, descendents >5
    assert!(synced.spec.filter.is_complete());
    assert_eq!(synced.metadata.generation, 2);
    let urls: Vec<&str> = synced
        .status
        .links
        .iter()
        .map(|link| link.hnews_url.as_str())
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://news.ycombinator.com/item?id=1",
            "https://news.ycombinator.com/item?id=3"
        ]
    );

    harness.cancel.cancel();
    harness.handle.await.unwrap();
}

#[tokio::test]
async fn test_spec_update_triggers_new_cycle() {
    let harness = start(
        FakeSource::new(vec![story(1, 500, 50), story(2, 300, 10)]),
        Duration::from_secs(30),
    )
    .await;

    seed(harness.store.as_ref(), "top", filter(1, ">200", ">1")).await;
    let first = wait_for_sync(&harness.store, "top").await;
    assert_eq!(first.status.links.len(), 1);

    let mut resource = first.clone();
    resource.spec = HNewsSpec {
        filter: filter(2, ">200", ">1"),
    };
    harness.store.update_spec(&resource).await.unwrap();

    tokio::time::timeout(WAIT, async {
        loop {
            let current = harness.store.get(&key("top")).await.unwrap().unwrap();
            if current.status.links.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Second cycle should pick up the new limit");

    harness.cancel.cancel();
    harness.handle.await.unwrap();
}

#[tokio::test]
async fn test_deferred_resource_is_retried() {
    let source = FakeSource::new(vec![story(1, 500, 50)]);
    source.fail_list(Failure::Network);
    let harness = start(source, Duration::from_millis(50)).await;

    seed(harness.store.as_ref(), "top", filter(1, ">200", ">1")).await;

    tokio::time::timeout(WAIT, async {
        while harness.source.list_calls() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Deferred cycle should be retried");

    harness.source.fail_list(Failure::None);
    let synced = wait_for_sync(&harness.store, "top").await;
    assert_eq!(synced.status.links.len(), 1);

    harness.cancel.cancel();
    harness.handle.await.unwrap();
}

#[tokio::test]
async fn test_status_write_does_not_retrigger() {
    let harness = start(FakeSource::new(vec![story(1, 500, 50)]), Duration::from_secs(30)).await;

    seed(harness.store.as_ref(), "top", filter(1, ">200", ">1")).await;
    wait_for_sync(&harness.store, "top").await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(harness.source.list_calls(), 1);

    harness.cancel.cancel();
    harness.handle.await.unwrap();
}

#[tokio::test]
async fn test_cancellation_stops_run() {
    let harness = start(FakeSource::new(vec![]), Duration::from_secs(30)).await;

    harness.cancel.cancel();
    tokio::time::timeout(WAIT, harness.handle)
        .await
        .expect("Controller should stop after cancellation")
        .unwrap();
}
