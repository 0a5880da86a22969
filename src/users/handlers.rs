use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::{AdminUser, CurrentUser},
    state::AppState,
    users::{
        dto::{AdminUpdateUserRequest, Filter, UpdateMeRequest, UserResponse},
        model::User,
    },
};

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "unexpected failure");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Get the current user.
#[utoipa::path(
    get, path = "/users/me", context_path = "/api/v1", tag = "users",
    responses(
        (status = 200, body = UserResponse),
        (status = 401, description = "Not signed in"),
    )
)]
#[instrument(skip(state, user))]
pub async fn get_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<UserResponse> {
    Json(UserResponse::from_user(&user, state.config.debug))
}

/// Update the current user's profile fields.
#[utoipa::path(
    patch, path = "/users/me", context_path = "/api/v1", tag = "users",
    request_body = UpdateMeRequest,
    responses(
        (status = 200, body = UserResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Unknown user"),
    )
)]
#[instrument(skip(state, user, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateMeRequest>,
) -> Result<Json<UserResponse>, (StatusCode, String)> {
    let user = User::update_profile(
        &state.db,
        user.id,
        payload.name.as_deref(),
        payload.first_name.as_deref(),
        payload.last_name.as_deref(),
    )
    .await
    .map_err(internal)?
    .ok_or((StatusCode::NOT_FOUND, "unknown user".to_string()))?;

    Ok(Json(UserResponse::from_user(&user, state.config.debug)))
}

/// Delete the current user: PII is anonymized before the soft delete.
#[utoipa::path(
    delete, path = "/users/me", context_path = "/api/v1", tag = "users",
    responses(
        (status = 204, description = "User deleted"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Unknown user"),
    )
)]
#[instrument(skip(state, user))]
pub async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode, (StatusCode, String)> {
    let deleted = User::anonymize_and_delete(&state.db, user.id)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err((StatusCode::NOT_FOUND, "unknown user".into()));
    }
    info!(user_id = %user.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// List users (admin only).
#[utoipa::path(
    get, path = "/users", context_path = "/api/v1", tag = "users",
    params(Filter),
    responses(
        (status = 200, body = [UserResponse]),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Admin privileges required"),
    )
)]
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(filter): Query<Filter>,
) -> Result<Json<Vec<UserResponse>>, (StatusCode, String)> {
    let users = User::list(&state.db, &filter).await.map_err(internal)?;
    let items = users
        .iter()
        .map(|u| UserResponse::from_user(u, state.config.debug))
        .collect();
    Ok(Json(items))
}

/// Get a user by id (admin only).
#[utoipa::path(
    get, path = "/users/{id}", context_path = "/api/v1", tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, body = UserResponse),
        (status = 403, description = "Admin privileges required"),
        (status = 404, description = "Unknown user"),
    )
)]
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, (StatusCode, String)> {
    let user = User::find_by_id(&state.db, id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "unknown user".to_string()))?;
    Ok(Json(UserResponse::from_user(&user, state.config.debug)))
}

/// Update a user's profile and role (admin only).
#[utoipa::path(
    patch, path = "/users/{id}", context_path = "/api/v1", tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = AdminUpdateUserRequest,
    responses(
        (status = 200, body = UserResponse),
        (status = 403, description = "Admin privileges required"),
        (status = 404, description = "Unknown user"),
    )
)]
#[instrument(skip(state, admin, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<Json<UserResponse>, (StatusCode, String)> {
    let user = User::admin_update(
        &state.db,
        id,
        payload.name.as_deref(),
        payload.first_name.as_deref(),
        payload.last_name.as_deref(),
        payload.role,
    )
    .await
    .map_err(internal)?
    .ok_or((StatusCode::NOT_FOUND, "unknown user".to_string()))?;

    info!(admin_id = %admin.id, user_id = %user.id, "user updated by admin");
    Ok(Json(UserResponse::from_user(&user, state.config.debug)))
}

/// Delete a user (admin only): anonymize, then soft-delete.
#[utoipa::path(
    delete, path = "/users/{id}", context_path = "/api/v1", tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Admin privileges required"),
        (status = 404, description = "Unknown user"),
    )
)]
#[instrument(skip(state, admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let deleted = User::anonymize_and_delete(&state.db, id)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err((StatusCode::NOT_FOUND, "unknown user".into()));
    }
    info!(admin_id = %admin.id, user_id = %id, "user deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}
