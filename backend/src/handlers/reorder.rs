//! HTTP handlers for reorder suggestions

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::{PaginatedResponse, ReorderSuggestion, SuggestionStatus, UpdateSuggestionInput};
use uuid::Uuid;

use super::page_request;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::SuggestionScope;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SuggestionListQuery {
    pub status: Option<SuggestionStatus>,
    /// Include every status; overrides `status`
    #[serde(default)]
    pub all: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl SuggestionListQuery {
    fn scope(&self) -> SuggestionScope {
        match (self.all, self.status) {
            (true, _) => SuggestionScope::All,
            (false, Some(status)) => SuggestionScope::Status(status),
            (false, None) => SuggestionScope::Pending,
        }
    }
}

/// List suggestions, pending ones by default
pub async fn list_suggestions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<SuggestionListQuery>,
) -> AppResult<Json<PaginatedResponse<ReorderSuggestion>>> {
    let page = page_request(&state, query.page, query.per_page);
    let service = state.reorder();
    let suggestions = service
        .list(current_user.user_id, query.scope(), &page)
        .await?;
    Ok(Json(suggestions))
}

/// Mark a suggestion Ordered or Ignored
pub async fn update_suggestion(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(suggestion_id): Path<Uuid>,
    Json(input): Json<UpdateSuggestionInput>,
) -> AppResult<Json<ReorderSuggestion>> {
    let service = state.reorder();
    let suggestion = service
        .update_status(current_user.user_id, suggestion_id, input)
        .await?;
    Ok(Json(suggestion))
}
