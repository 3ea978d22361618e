//! hnews-controller library
//!
//! Keeps `HNews` resources in sync with the Hacker News top stories: every
//! resource carries a filter (`limit`, `type`, `score`, `descendents`) and the
//! controller writes the matching items into its status.

pub mod api;
pub mod assembler;
pub mod comparison;
pub mod controller;
pub mod error;
pub mod hn_client;
pub mod normalizer;
pub mod reconciler;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::store::ResourceStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ResourceStore>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            startup_time: hnews_common::time::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::resource_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
