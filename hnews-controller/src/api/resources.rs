//! `HNews` resource endpoints
//!
//! - GET    /api/hnews                         list
//! - POST   /api/hnews                         create
//! - GET    /api/hnews/:namespace/:name        fetch
//! - PUT    /api/hnews/:namespace/:name/spec   replace spec
//! - DELETE /api/hnews/:namespace/:name        delete
//!
//! Spec writes emit events, so the controller reconciles without polling.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use hnews_common::resource::{HNewsSpec, DEFAULT_NAMESPACE};
use hnews_common::{HNews, ResourceKey};
use serde::{Deserialize, Serialize};

use crate::comparison::ComparisonExpr;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Largest accepted `spec.filter.limit`
pub const MAX_LIMIT: u32 = 20;

const MAX_NAME_LEN: usize = 253;

#[derive(Debug, Deserialize)]
pub struct NewResourceMeta {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub metadata: NewResourceMeta,
    #[serde(default)]
    pub spec: HNewsSpec,
}

#[derive(Debug, Serialize)]
pub struct ResourceResponse {
    #[serde(flatten)]
    pub resource: HNews,
    /// Non-fatal problems, e.g. expressions that can never match
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl From<HNews> for ResourceResponse {
    fn from(resource: HNews) -> Self {
        let warnings = spec_warnings(&resource.spec);
        Self { resource, warnings }
    }
}

#[derive(Debug, Serialize)]
pub struct ResourceList {
    pub items: Vec<HNews>,
}

fn validate_name(field: &str, value: &str) -> ApiResult<()> {
    let valid_chars = value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let alnum_edges = value
        .chars()
        .next()
        .zip(value.chars().last())
        .map(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric())
        .unwrap_or(false);

    if value.len() > MAX_NAME_LEN || !valid_chars || !alnum_edges {
        return Err(ApiError::BadRequest(format!(
            "{} '{}' must be 1-{} lowercase alphanumeric characters, '-' or '.', \
             starting and ending with an alphanumeric character",
            field, value, MAX_NAME_LEN
        )));
    }
    Ok(())
}

fn validate_spec(spec: &HNewsSpec) -> ApiResult<()> {
    if let Some(limit) = spec.filter.limit {
        if limit > MAX_LIMIT {
            return Err(ApiError::BadRequest(format!(
                "spec.filter.limit must be at most {}, got {}",
                MAX_LIMIT, limit
            )));
        }
    }
    Ok(())
}

fn spec_warnings(spec: &HNewsSpec) -> Vec<String> {
    [
        ("score", spec.filter.score.as_ref()),
        ("descendents", spec.filter.descendants.as_ref()),
    ]
    .into_iter()
    .filter_map(|(field, expr)| {
        let expr = expr?;
        ComparisonExpr::parse(expr.as_str()).err().map(|e| {
            format!(
                "spec.filter.{} '{}' will never match: {}",
                field, expr, e
            )
        })
    })
    .collect()
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// GET /api/hnews
pub async fn list_resources(State(state): State<AppState>) -> ApiResult<Json<ResourceList>> {
    let items = state.store.list().await?;
    Ok(Json(ResourceList { items }))
}

/// POST /api/hnews
pub async fn create_resource(
    State(state): State<AppState>,
    payload: Result<Json<CreateRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ResourceResponse>)> {
    let request = json_body(payload)?;
    validate_name("metadata.name", &request.metadata.name)?;
    validate_name("metadata.namespace", &request.metadata.namespace)?;
    validate_spec(&request.spec)?;

    let key = ResourceKey::new(request.metadata.namespace, request.metadata.name);
    let created = state.store.create(HNews::new(key, request.spec)).await?;

    tracing::info!(resource = %created.key(), "Resource created");
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /api/hnews/:namespace/:name
pub async fn get_resource(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<ResourceResponse>> {
    let key = ResourceKey::new(namespace, name);
    let resource = state
        .store
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(key.to_string()))?;

    Ok(Json(resource.into()))
}

/// PUT /api/hnews/:namespace/:name/spec
pub async fn replace_spec(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    payload: Result<Json<HNewsSpec>, JsonRejection>,
) -> ApiResult<Json<ResourceResponse>> {
    let spec = json_body(payload)?;
    validate_spec(&spec)?;

    let key = ResourceKey::new(namespace, name);
    let mut resource = state
        .store
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(key.to_string()))?;

    resource.spec = spec;
    let updated = state.store.update_spec(&resource).await?;

    tracing::info!(
        resource = %key,
        generation = updated.metadata.generation,
        "Resource spec replaced"
    );
    Ok(Json(updated.into()))
}

/// DELETE /api/hnews/:namespace/:name
pub async fn delete_resource(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let key = ResourceKey::new(namespace, name);
    state.store.delete(&key).await?;

    tracing::info!(resource = %key, "Resource deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn resource_routes() -> Router<AppState> {
    Router::new()
        .route("/api/hnews", get(list_resources).post(create_resource))
        .route(
            "/api/hnews/:namespace/:name",
            get(get_resource).delete(delete_resource),
        )
        .route("/api/hnews/:namespace/:name/spec", put(replace_spec))
}
