//! SQLite-backed store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hnews_common::events::EventBus;
use hnews_common::resource::{HNewsSpec, HNewsStatus, ObjectMeta};
use hnews_common::{Error, HNews, ResourceKey, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{
    created_event, deleted_event, retry_on_lock, spec_updated_event, status_updated_event,
    ResourceStore,
};

/// Upper bound on time spent retrying a locked database per write
const MAX_LOCK_WAIT_MS: u64 = 5000;

pub struct SqliteStore {
    pool: SqlitePool,
    event_bus: EventBus,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, event_bus: EventBus) -> Self {
        Self { pool, event_bus }
    }
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize {}: {}", what, e)))
}

fn from_row(row: &SqliteRow) -> Result<HNews> {
    let spec: String = row.get("spec");
    let spec: HNewsSpec = serde_json::from_str(&spec)
        .map_err(|e| Error::Internal(format!("Failed to deserialize spec: {}", e)))?;

    let status: String = row.get("status");
    let status: HNewsStatus = serde_json::from_str(&status)
        .map_err(|e| Error::Internal(format!("Failed to deserialize status: {}", e)))?;

    let created_at: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&Utc);

    Ok(HNews {
        metadata: ObjectMeta {
            name: row.get("name"),
            namespace: row.get("namespace"),
            generation: row.get("generation"),
            created_at: Some(created_at),
        },
        spec,
        status,
    })
}

#[async_trait]
impl ResourceStore for SqliteStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<HNews>> {
        let row = sqlx::query(
            r#"
            SELECT namespace, name, generation, spec, status, created_at
            FROM hnews
            WHERE namespace = ? AND name = ?
            "#,
        )
        .bind(&key.namespace)
        .bind(&key.name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<HNews>> {
        let rows = sqlx::query(
            r#"
            SELECT namespace, name, generation, spec, status, created_at
            FROM hnews
            ORDER BY namespace, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(from_row).collect()
    }

    async fn create(&self, mut resource: HNews) -> Result<HNews> {
        let key = resource.key();
        let now = hnews_common::time::now();
        resource.metadata.generation = 1;
        resource.metadata.created_at = Some(now);
        resource.status = HNewsStatus::default();

        let spec = to_json(&resource.spec, "spec")?;
        let status = to_json(&resource.status, "status")?;
        let timestamp = now.to_rfc3339();

        let result = retry_on_lock("create_hnews", MAX_LOCK_WAIT_MS, || async {
            sqlx::query(
                r#"
                INSERT INTO hnews (namespace, name, generation, spec, status, created_at, updated_at)
                VALUES (?, ?, 1, ?, ?, ?, ?)
                "#,
            )
            .bind(&key.namespace)
            .bind(&key.name)
            .bind(&spec)
            .bind(&status)
            .bind(&timestamp)
            .bind(&timestamp)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            Ok(())
        })
        .await;

        match result {
            Ok(()) => {}
            Err(Error::Database(sqlx::Error::Database(db_err))) if db_err.is_unique_violation() => {
                return Err(Error::Conflict(key.to_string()));
            }
            Err(e) => return Err(e),
        }

        self.event_bus.emit_lossy(created_event(key));
        Ok(resource)
    }

    async fn update_spec(&self, resource: &HNews) -> Result<HNews> {
        let key = resource.key();
        let spec = to_json(&resource.spec, "spec")?;
        let updated_at = hnews_common::time::now().to_rfc3339();

        let generation = retry_on_lock("update_hnews_spec", MAX_LOCK_WAIT_MS, || async {
            let generation: Option<i64> = sqlx::query_scalar(
                r#"
                UPDATE hnews
                SET spec = ?, generation = generation + 1, updated_at = ?
                WHERE namespace = ? AND name = ?
                RETURNING generation
                "#,
            )
            .bind(&spec)
            .bind(&updated_at)
            .bind(&key.namespace)
            .bind(&key.name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

            Ok(generation)
        })
        .await?
        .ok_or_else(|| Error::NotFound(key.to_string()))?;

        let mut updated = resource.clone();
        updated.metadata.generation = generation;

        self.event_bus.emit_lossy(spec_updated_event(key, generation));
        Ok(updated)
    }

    async fn update_status(&self, resource: &HNews) -> Result<()> {
        let key = resource.key();
        let status = to_json(&resource.status, "status")?;
        let updated_at = hnews_common::time::now().to_rfc3339();

        let rows_affected = retry_on_lock("update_hnews_status", MAX_LOCK_WAIT_MS, || async {
            let result = sqlx::query(
                r#"
                UPDATE hnews
                SET status = ?, updated_at = ?
                WHERE namespace = ? AND name = ?
                "#,
            )
            .bind(&status)
            .bind(&updated_at)
            .bind(&key.namespace)
            .bind(&key.name)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            Ok(result.rows_affected())
        })
        .await?;

        if rows_affected == 0 {
            return Err(Error::NotFound(key.to_string()));
        }

        self.event_bus
            .emit_lossy(status_updated_event(key, resource.status.links.len()));
        Ok(())
    }

    async fn delete(&self, key: &ResourceKey) -> Result<()> {
        let rows_affected = retry_on_lock("delete_hnews", MAX_LOCK_WAIT_MS, || async {
            let result = sqlx::query("DELETE FROM hnews WHERE namespace = ? AND name = ?")
                .bind(&key.namespace)
                .bind(&key.name)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;

            Ok(result.rows_affected())
        })
        .await?;

        if rows_affected == 0 {
            return Err(Error::NotFound(key.to_string()));
        }

        self.event_bus.emit_lossy(deleted_event(key.clone()));
        Ok(())
    }
}
