//! Activity log queries

use std::sync::Arc;

use shared::{ActivityEntry, ActivityFilter, PaginatedResponse, Pagination};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::audit::AuditSink;

/// Reads back what the audit sink kept. Sinks that only log return empty pages.
#[derive(Clone)]
pub struct ActivityService {
    audit: Arc<dyn AuditSink>,
}

impl ActivityService {
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self { audit }
    }

    /// Entries of one owner, newest first
    pub async fn list(
        &self,
        user_id: Uuid,
        filter: &ActivityFilter,
        page: &Pagination,
    ) -> AppResult<PaginatedResponse<ActivityEntry>> {
        let (rows, total) = self.audit.list(user_id, filter, page).await?;
        Ok(PaginatedResponse::new(rows, page, total))
    }
}
