use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, warn};

use crate::state::AppState;
use crate::users::model::{Role, User};

/// Authenticated user, loaded from the access token in the
/// Authorization header or the `access_token` cookie.
pub struct CurrentUser(pub User);

/// Authenticated user whose account is verified.
pub struct VerifiedUser(pub User);

/// Verified user with the admin role.
pub struct AdminUser(pub User);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .map(str::to_string)
            .or_else(|| {
                CookieJar::from_headers(&parts.headers)
                    .get("access_token")
                    .map(|c| c.value().to_string())
            })
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing access token".to_string(),
            ))?;

        let user_id = state
            .keys
            .access
            .verify(&state.config.app_name, &token)
            .map_err(|_| {
                warn!("invalid or expired access token");
                (
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                )
            })?;

        let user = User::find_by_id(&state.db, user_id)
            .await
            .map_err(|e| {
                error!(error = %e, %user_id, "load current user failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "could not load user".to_string(),
                )
            })?
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "The user belonging to this token no longer exists".to_string(),
            ))?;

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for VerifiedUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.verified {
            return Err((StatusCode::FORBIDDEN, "Account not verified".to_string()));
        }
        Ok(VerifiedUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let VerifiedUser(user) = VerifiedUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err((
                StatusCode::FORBIDDEN,
                "Admin privileges required".to_string(),
            ));
        }
        Ok(AdminUser(user))
    }
}
