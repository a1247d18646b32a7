//! Caller identity
//!
//! Authentication happens upstream. The gateway forwards the authenticated
//! user in `x-user-id` and their role in `x-user-role`; the user id is the
//! tenant key for every ledger call.

use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Manager,
    WarehouseStaff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::WarehouseStaff => "warehouse_staff",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "manager" => Some(Role::Manager),
            "warehouse_staff" | "staff" => Some(Role::WarehouseStaff),
            _ => None,
        }
    }

    /// May create and delete warehouses and storage locations, and approve purchase orders
    pub fn can_manage_facilities(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

/// The authenticated caller
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl CurrentUser {
    /// Require a manager or admin
    pub fn require_manager(&self) -> AppResult<()> {
        if self.role.can_manage_facilities() {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Role '{}' requires manager access",
                self.role.as_str()
            )))
        }
    }

    /// Require an admin, e.g. to read the activity log
    pub fn require_admin(&self) -> AppResult<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Role '{}' requires admin access",
                self.role.as_str()
            )))
        }
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        let user_id = header(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;
        let user_id = Uuid::parse_str(user_id.trim())
            .map_err(|_| AppError::Unauthorized("Invalid user id".to_string()))?;

        let role = match header(USER_ROLE_HEADER) {
            Some(role) => Role::from_str(&role)
                .ok_or_else(|| AppError::Forbidden(format!("Unknown role '{}'", role.trim())))?,
            None => Role::WarehouseStaff,
        };

        Ok(CurrentUser { user_id, role })
    }
}
