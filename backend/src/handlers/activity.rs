//! HTTP handlers for the activity log

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use shared::{ActivityEntry, ActivityFilter, EntityKind, PaginatedResponse};
use uuid::Uuid;

use super::page_request;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub entity: Option<EntityKind>,
    pub entity_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Activity entries, newest first. Admin only.
pub async fn list_activity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<PaginatedResponse<ActivityEntry>>> {
    current_user.require_admin()?;
    let page = page_request(&state, query.page, query.per_page);
    let filter = ActivityFilter {
        entity: query.entity,
        entity_id: query.entity_id,
    };
    let activity = state.activity().list(current_user.user_id, &filter, &page).await?;
    Ok(Json(activity))
}
