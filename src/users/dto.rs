use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::model::{Role, User};

/// Pagination, sorting and search parameters for list queries.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct Filter {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub search: Option<String>,
}

const SORTABLE_COLUMNS: &[&str] = &["created_at", "updated_at", "email", "name", "role"];

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

impl Filter {
    pub fn limit(&self) -> i64 {
        self.limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        let page = self.page.filter(|p| *p > 1).unwrap_or(1);
        (page - 1) * self.limit()
    }

    /// Whitelisted ORDER BY fragment. Unknown columns fall back to
    /// `created_at`, unknown orders to descending.
    pub fn order_clause(&self) -> String {
        let column = self
            .sort_by
            .as_deref()
            .filter(|c| SORTABLE_COLUMNS.contains(c))
            .unwrap_or("created_at");
        let order = match self.order.as_deref() {
            Some("asc") | Some("ASC") => "ASC",
            _ => "DESC",
        };
        format!("{column} {order}")
    }
}

/// Update the current user's profile; absent fields stay untouched.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Admin edit of any user, including role changes.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminUpdateUserRequest {
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
}

/// Public projection of a user. One-time tokens are echoed only in
/// debug mode so local clients can follow the email links by hand.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

impl UserResponse {
    pub fn from_user(user: &User, debug: bool) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            verified: user.verified,
            verification_token: if debug {
                user.verification_token.clone()
            } else {
                None
            },
            reset_token: if debug { user.reset_token.clone() } else { None },
        }
    }
}
