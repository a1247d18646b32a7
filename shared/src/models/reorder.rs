//! Reorder suggestion models and the threshold decision

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Suggested reorder quantity when none is configured
pub const DEFAULT_REORDER_QUANTITY: i64 = 50;

/// A suggestion to replenish a product.
///
/// At most one suggestion per (product, owner) is `Pending` at any time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReorderSuggestion {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub product_id: Uuid,
    pub suggested_quantity: i64,
    pub status: SuggestionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuggestionStatus {
    Pending,
    /// Closed by the user after placing an order
    Ordered,
    /// Dismissed by the user
    Ignored,
    /// Closed automatically once stock recovered above the threshold
    Resolved,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "Pending",
            SuggestionStatus::Ordered => "Ordered",
            SuggestionStatus::Ignored => "Ignored",
            SuggestionStatus::Resolved => "Resolved",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SuggestionStatus::Pending)
    }

    /// Statuses a user may move a pending suggestion to
    pub fn is_user_settable(&self) -> bool {
        matches!(self, SuggestionStatus::Ordered | SuggestionStatus::Ignored)
    }
}

impl std::fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SuggestionStatus {
    type Err = crate::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(SuggestionStatus::Pending),
            "Ordered" => Ok(SuggestionStatus::Ordered),
            "Ignored" => Ok(SuggestionStatus::Ignored),
            "Resolved" => Ok(SuggestionStatus::Resolved),
            other => Err(crate::ParseEnumError::new("suggestion status", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateSuggestionInput {
    pub status: SuggestionStatus,
}

/// What the reorder evaluator should do for a product
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderDecision {
    /// Total is at or below the threshold: ensure one pending suggestion exists
    EnsurePending,
    /// Total is above the threshold: resolve every pending suggestion
    ResolvePending,
}

impl ReorderDecision {
    pub fn for_levels(total_quantity: i64, reorder_threshold: i64) -> Self {
        if total_quantity <= reorder_threshold {
            ReorderDecision::EnsurePending
        } else {
            ReorderDecision::ResolvePending
        }
    }
}

/// Result of one reorder evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum ReorderOutcome {
    /// A new pending suggestion was created
    Created(ReorderSuggestion),
    /// A pending suggestion already existed
    AlreadyPending(Uuid),
    /// This many pending suggestions were resolved (possibly zero)
    Resolved(u64),
}
