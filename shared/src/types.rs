//! Common types used across the ledger

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::EntityKind;

/// Pagination parameters (1-based page)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    pub fn limit(&self) -> u32 {
        self.per_page.clamp(1, 200)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit())
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub has_more: bool,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, pagination: &Pagination, total_items: u64) -> Self {
        let per_page = pagination.limit();
        let total_pages = total_items.div_ceil(u64::from(per_page)) as u32;
        let has_more = pagination.offset() + (data.len() as u64) < total_items;
        Self {
            data,
            pagination: PaginationMeta {
                page: pagination.page.max(1),
                per_page,
                total_items,
                total_pages,
                has_more,
            },
        }
    }
}

/// Success payload of a mutating operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationOutcome {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_entities: Vec<AffectedEntity>,
}

impl OperationOutcome {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            affected_entities: Vec::new(),
        }
    }

    pub fn with(mut self, entity: EntityKind, id: Uuid) -> Self {
        self.affected_entities.push(AffectedEntity { entity, id });
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AffectedEntity {
    pub entity: EntityKind,
    pub id: Uuid,
}

/// A stored enum value that does not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_offset() {
        assert_eq!(Pagination::new(1, 20).offset(), 0);
        assert_eq!(Pagination::new(3, 20).offset(), 40);
        assert_eq!(Pagination::new(0, 20).offset(), 0);
    }

    #[test]
    fn test_paginated_response_has_more() {
        let page = Pagination::new(1, 2);
        let response = PaginatedResponse::new(vec![1, 2], &page, 5);
        assert!(response.pagination.has_more);
        assert_eq!(response.pagination.total_pages, 3);

        let last = Pagination::new(3, 2);
        let response = PaginatedResponse::new(vec![5], &last, 5);
        assert!(!response.pagination.has_more);
    }

    #[test]
    fn test_outcome_omits_empty_entities() {
        let json = serde_json::to_value(OperationOutcome::new("ok")).unwrap();
        assert_eq!(json, serde_json::json!({ "message": "ok" }));
    }
}
