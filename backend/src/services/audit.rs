//! Activity log side channel
//!
//! Entries are emitted after a ledger transaction commits. Emission never
//! fails the caller: sink errors are logged and dropped.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{ActivityEntry, ActivityFilter, Pagination};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::AuditSinkKind;
use crate::error::{AppError, AppResult};

/// Fire-and-forget receiver of activity entries
#[async_trait]
pub trait AuditSink: Send + Sync {
    fn emit(&self, entry: ActivityEntry);

    /// Entries kept for one owner, newest first, with the total match count.
    /// Sinks that keep nothing return an empty page.
    async fn list(
        &self,
        _owner_id: Uuid,
        _filter: &ActivityFilter,
        _page: &Pagination,
    ) -> AppResult<(Vec<ActivityEntry>, u64)> {
        Ok((Vec::new(), 0))
    }
}

#[derive(Debug, FromRow)]
struct ActivityRow {
    id: Uuid,
    owner_id: Uuid,
    performed_by: Uuid,
    action: String,
    entity: String,
    entity_id: Uuid,
    details: String,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for ActivityEntry {
    type Error = AppError;

    fn try_from(row: ActivityRow) -> AppResult<Self> {
        Ok(ActivityEntry {
            id: row.id,
            owner_id: row.owner_id,
            performed_by: row.performed_by,
            action: row.action,
            entity: row.entity.parse()?,
            entity_id: row.entity_id,
            details: row.details,
            occurred_at: row.occurred_at,
        })
    }
}

/// Writes entries to `activity_logs` on a detached task
#[derive(Clone)]
pub struct PgAuditSink {
    db: PgPool,
}

impl PgAuditSink {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    fn emit(&self, entry: ActivityEntry) {
        let db = self.db.clone();
        tokio::spawn(async move {
            let result = sqlx::query(
                r#"
                INSERT INTO activity_logs (
                    id, owner_id, performed_by, action, entity, entity_id, details, occurred_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(entry.id)
            .bind(entry.owner_id)
            .bind(entry.performed_by)
            .bind(&entry.action)
            .bind(entry.entity.as_str())
            .bind(entry.entity_id)
            .bind(&entry.details)
            .bind(entry.occurred_at)
            .execute(&db)
            .await;

            if let Err(e) = result {
                tracing::warn!(error = %e, action = %entry.action, "failed to write activity log");
            }
        });
    }

    async fn list(
        &self,
        owner_id: Uuid,
        filter: &ActivityFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<ActivityEntry>, u64)> {
        let predicate = r#"
            owner_id = $1
            AND ($2::text IS NULL OR entity = $2)
            AND ($3::uuid IS NULL OR entity_id = $3)
        "#;
        let entity = filter.entity.map(|e| e.as_str());

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM activity_logs WHERE {}",
            predicate
        ))
        .bind(owner_id)
        .bind(entity)
        .bind(filter.entity_id)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, ActivityRow>(&format!(
            r#"
            SELECT id, owner_id, performed_by, action, entity, entity_id, details, occurred_at
            FROM activity_logs
            WHERE {}
            ORDER BY occurred_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
            predicate
        ))
        .bind(owner_id)
        .bind(entity)
        .bind(filter.entity_id)
        .bind(i64::from(page.limit()))
        .bind(page.offset() as i64)
        .fetch_all(&self.db)
        .await?;

        let entries = rows
            .into_iter()
            .map(ActivityEntry::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((entries, total as u64))
    }
}

/// Emits entries as structured log events on the `audit` target
#[derive(Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    fn emit(&self, entry: ActivityEntry) {
        tracing::info!(
            target: "audit",
            owner_id = %entry.owner_id,
            performed_by = %entry.performed_by,
            action = %entry.action,
            entity = entry.entity.as_str(),
            entity_id = %entry.entity_id,
            "{}",
            entry.details
        );
    }
}

/// Discards every entry
#[derive(Clone, Copy, Default)]
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    fn emit(&self, _entry: ActivityEntry) {}
}

/// Keeps entries in memory for inspection
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    entries: Arc<Mutex<Vec<ActivityEntry>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    fn emit(&self, entry: ActivityEntry) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }

    async fn list(
        &self,
        owner_id: Uuid,
        filter: &ActivityFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<ActivityEntry>, u64)> {
        let mut rows: Vec<ActivityEntry> = self
            .entries()
            .into_iter()
            .filter(|e| e.owner_id == owner_id && filter.matches(e))
            .collect();
        // Emission order breaks timestamp ties
        rows.reverse();
        rows.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));

        let total = rows.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let data = rows.into_iter().skip(offset).take(page.limit() as usize).collect();
        Ok((data, total))
    }
}

/// Build the configured sink. `Database` falls back to logging when no pool exists.
pub fn build_sink(kind: AuditSinkKind, db: Option<PgPool>) -> Arc<dyn AuditSink> {
    match (kind, db) {
        (AuditSinkKind::Database, Some(db)) => Arc::new(PgAuditSink::new(db)),
        (AuditSinkKind::Database, None) | (AuditSinkKind::Log, _) => Arc::new(TracingAuditSink),
        (AuditSinkKind::Off, _) => Arc::new(NullAuditSink),
    }
}
