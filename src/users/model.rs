use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use super::dto::Filter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub verified: bool,
    pub verification_token: Option<String>,
    pub reset_token: Option<String>,
    pub reset_sent_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, thiserror::Error)]
pub enum UserStoreError {
    #[error("user with that email already exists")]
    EmailTaken,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

const USER_COLUMNS: &str = "id, email, name, first_name, last_name, password_hash, role, \
     verified, verification_token, reset_token, reset_sent_at, created_at, updated_at, deleted_at";

/// Replacement address written when a user is anonymized.
pub fn anonymized_email(id: Uuid) -> String {
    format!("deleted-{id}@anonymized.invalid")
}

// Role is decided inside the INSERT so two concurrent signups on an
// empty table cannot both read zero rows and both become admin.
fn insert_user_sql() -> String {
    format!(
        "INSERT INTO users (email, password_hash, role, verification_token) \
         VALUES ($1, $2, \
             CASE WHEN EXISTS (SELECT 1 FROM users) \
                  THEN 'user'::user_role ELSE 'admin'::user_role END, \
             $3) RETURNING {USER_COLUMNS}"
    )
}

impl User {
    /// Insert a new, unverified user. The first user in an empty table
    /// becomes admin. A duplicate email maps to `EmailTaken`.
    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        verification_token: &str,
    ) -> Result<User, UserStoreError> {
        let sql = insert_user_sql();
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(password_hash)
            .bind(verification_token)
            .fetch_one(db)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                    UserStoreError::EmailTaken
                }
                _ => UserStoreError::Database(e),
            })
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let sql =
            format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await?)
    }

    pub async fn find_by_verification_token(
        db: &PgPool,
        token: &str,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE verification_token = $1 AND deleted_at IS NULL"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .fetch_optional(db)
            .await?)
    }

    pub async fn find_by_reset_token(db: &PgPool, token: &str) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE reset_token = $1 AND deleted_at IS NULL"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .fetch_optional(db)
            .await?)
    }

    /// Update profile fields; absent fields keep their current value.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        name: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET \
                 name = COALESCE($2, name), \
                 first_name = COALESCE($3, first_name), \
                 last_name = COALESCE($4, last_name) \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(name)
            .bind(first_name)
            .bind(last_name)
            .fetch_optional(db)
            .await?)
    }

    /// Profile update plus role change, for admin edits.
    pub async fn admin_update(
        db: &PgPool,
        id: Uuid,
        name: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
        role: Option<Role>,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET \
                 name = COALESCE($2, name), \
                 first_name = COALESCE($3, first_name), \
                 last_name = COALESCE($4, last_name), \
                 role = COALESCE($5, role) \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(name)
            .bind(first_name)
            .bind(last_name)
            .bind(role)
            .fetch_optional(db)
            .await?)
    }

    /// Replace the active verification token. The single column keeps at
    /// most one token live per user.
    pub async fn set_verification_token(
        db: &PgPool,
        id: Uuid,
        token: &str,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET verification_token = $2 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(token)
            .fetch_optional(db)
            .await?)
    }

    /// Mark the account verified and consume the token; a replayed link
    /// no longer matches anything.
    pub async fn mark_verified(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET verified = TRUE, verification_token = NULL \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?)
    }

    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        token: &str,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET reset_token = $2, reset_sent_at = now() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(token)
            .fetch_optional(db)
            .await?)
    }

    /// New password via reset link: rehash and consume the reset token.
    pub async fn reset_password(
        db: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET password_hash = $2, reset_token = NULL, reset_sent_at = NULL \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(password_hash)
            .fetch_optional(db)
            .await?)
    }

    pub async fn update_password(
        db: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET password_hash = $2 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(password_hash)
            .fetch_optional(db)
            .await?)
    }

    /// Paginated listing with an optional case-insensitive search over
    /// email and name fields. The ORDER BY fragment comes from a
    /// whitelist, never from raw query input.
    pub async fn list(db: &PgPool, filter: &Filter) -> anyhow::Result<Vec<User>> {
        let order = filter.order_clause();
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE deleted_at IS NULL \
               AND ($1 = '' OR email ILIKE $2 OR name ILIKE $2 \
                    OR first_name ILIKE $2 OR last_name ILIKE $2) \
             ORDER BY {order} LIMIT $3 OFFSET $4"
        );
        let search = filter.search.clone().unwrap_or_default();
        let pattern = format!("%{search}%");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(search)
            .bind(pattern)
            .bind(filter.limit())
            .bind(filter.offset())
            .fetch_all(db)
            .await?)
    }

    /// Overwrite PII with synthetic values, then set the soft-delete
    /// marker. Returns false when the user was already gone.
    pub async fn anonymize_and_delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET \
                 email = $2, \
                 name = 'Deleted User', \
                 first_name = '', \
                 last_name = '', \
                 verification_token = NULL, \
                 reset_token = NULL, \
                 reset_sent_at = NULL, \
                 deleted_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(anonymized_email(id))
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serde_roundtrips_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"admin\"").unwrap(),
            Role::Admin
        );
        assert!(serde_json::from_str::<Role>("\"root\"").is_err());
    }

    #[test]
    fn anonymized_email_is_non_identifying() {
        let id = Uuid::new_v4();
        let email = anonymized_email(id);
        assert!(email.starts_with("deleted-"));
        assert!(email.ends_with("@anonymized.invalid"));
        assert!(email.contains(&id.to_string()));
    }

    #[test]
    fn first_admin_choice_happens_inside_the_insert() {
        let sql = insert_user_sql();
        assert!(sql.contains("CASE WHEN EXISTS (SELECT 1 FROM users)"));
        // No separate count query whose result could go stale between
        // statements.
        assert!(!sql.to_lowercase().contains("count("));
    }

    #[test]
    fn password_hash_never_serializes() {
        let user = crate::testing::test_user();
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(json.contains(&user.email));
    }
}
