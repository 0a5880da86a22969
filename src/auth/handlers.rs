use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use lazy_static::lazy_static;
use regex::Regex;
use time::Duration;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{EmailRequest, MessageResponse, PasswordRequest, RefreshRequest, SignInRequest,
              SignUpRequest},
        extractors::VerifiedUser,
        password::{hash_password, verify_password},
        tokens::{generate_one_time_token, issue_pair, TokenPair},
    },
    mailer::{templates, Email},
    state::AppState,
    users::{
        dto::UserResponse,
        model::{User, UserStoreError},
    },
};

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn auth_cookies(jar: CookieJar, pair: &TokenPair) -> CookieJar {
    jar.add(
        Cookie::build(("access_token", pair.access_token.clone()))
            .path("/")
            .http_only(true)
            .max_age(Duration::seconds(pair.expires_in))
            .build(),
    )
    .add(
        Cookie::build(("refresh_token", pair.refresh_token.clone()))
            .path("/")
            .http_only(true)
            .max_age(Duration::seconds(pair.refresh_expires_in))
            .build(),
    )
    .add(
        Cookie::build(("logged_in", "true"))
            .path("/")
            .max_age(Duration::seconds(pair.expires_in))
            .build(),
    )
}

fn clear_auth_cookies(jar: CookieJar) -> CookieJar {
    let expired = |name: &'static str, http_only: bool| {
        Cookie::build((name, ""))
            .path("/")
            .http_only(http_only)
            .max_age(Duration::ZERO)
            .build()
    };
    jar.add(expired("access_token", true))
        .add(expired("refresh_token", true))
        .add(expired("logged_in", false))
}

/// Queue the verification email without blocking the response; the send
/// outlives the request on purpose.
fn queue_verification_email(state: &AppState, user: &User) {
    let Some(token) = user.verification_token.clone() else {
        return;
    };
    let mail =
        templates::verification_email(&state.config.app_name, &state.config.client_url, &token);
    let mailer = state.mailer.clone();
    let to = user.email.clone();
    tokio::spawn(async move {
        mailer
            .enqueue(Email {
                to,
                subject: mail.subject,
                html: mail.html,
            })
            .await;
    });
}

fn queue_reset_email(state: &AppState, user: &User) {
    let Some(token) = user.reset_token.clone() else {
        return;
    };
    let mail =
        templates::password_reset_email(&state.config.app_name, &state.config.client_url, &token);
    let mailer = state.mailer.clone();
    let to = user.email.clone();
    tokio::spawn(async move {
        mailer
            .enqueue(Email {
                to,
                subject: mail.subject,
                html: mail.html,
            })
            .await;
    });
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "unexpected failure");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Create a new user. The first user created is an admin.
#[utoipa::path(
    post, path = "/auth/signup", context_path = "/api/v1", tag = "auth",
    request_body = SignUpRequest,
    responses(
        (status = 201, body = UserResponse),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered"),
        (status = 412, description = "Passwords do not match"),
        (status = 502, description = "Could not create user"),
    )
)]
#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<UserResponse>), (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.password != payload.password_confirmation {
        return Err((
            StatusCode::PRECONDITION_FAILED,
            "passwords do not match".into(),
        ));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }
    if payload.password.len() < 8 {
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    let hash = hash_password(&payload.password).map_err(internal)?;
    let verification_token = generate_one_time_token();

    let user = User::create(&state.db, &payload.email, &hash, &verification_token)
        .await
        .map_err(|e| match e {
            UserStoreError::EmailTaken => (StatusCode::CONFLICT, e.to_string()),
            UserStoreError::Database(e) => {
                error!(error = %e, "create user failed");
                (StatusCode::BAD_GATEWAY, "could not create user".into())
            }
        })?;

    queue_verification_email(&state, &user);

    info!(user_id = %user.id, email = %user.email, "user signed up");
    Ok((
        StatusCode::CREATED,
        Json(UserResponse::from_user(&user, state.config.debug)),
    ))
}

/// Sign in with email and password; sets auth cookies.
#[utoipa::path(
    post, path = "/auth/signin", context_path = "/api/v1", tag = "auth",
    request_body = SignInRequest,
    responses(
        (status = 201, body = TokenPair),
        (status = 401, description = "Invalid email or password"),
        (status = 403, description = "Account not verified"),
    )
)]
#[instrument(skip(state, jar, payload))]
pub async fn signin(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(mut payload): Json<SignInRequest>,
) -> Result<(StatusCode, CookieJar, Json<TokenPair>), (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    // Unknown email and wrong password produce the same response so the
    // endpoint cannot be used to enumerate accounts.
    let invalid = || (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            warn!(email = %payload.email, "signin unknown email");
            invalid()
        })?;

    let ok = verify_password(&payload.password, &user.password_hash).map_err(internal)?;
    if !ok {
        warn!(user_id = %user.id, "signin invalid password");
        return Err(invalid());
    }
    if !user.verified {
        return Err((StatusCode::FORBIDDEN, "Account not verified".into()));
    }

    let pair = issue_pair(&state.keys, &state.config.app_name, &user).map_err(internal)?;
    info!(user_id = %user.id, "user signed in");
    let jar = auth_cookies(jar, &pair);
    Ok((StatusCode::CREATED, jar, Json(pair)))
}

/// Sign out the current user; clears auth cookies.
#[utoipa::path(
    get, path = "/auth/signout", context_path = "/api/v1", tag = "auth",
    responses(
        (status = 200, body = MessageResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Account not verified"),
    )
)]
#[instrument(skip(jar, user))]
pub async fn signout(
    VerifiedUser(user): VerifiedUser,
    jar: CookieJar,
) -> (StatusCode, CookieJar, Json<MessageResponse>) {
    info!(user_id = %user.id, "user signed out");
    (
        StatusCode::OK,
        clear_auth_cookies(jar),
        Json(MessageResponse::new("signed_out", "Signed out successfully")),
    )
}

/// Re-send the verification email to an unverified account.
#[utoipa::path(
    post, path = "/auth/welcome", context_path = "/api/v1", tag = "auth",
    request_body = EmailRequest,
    responses(
        (status = 201, body = UserResponse),
        (status = 403, description = "Account already verified"),
        (status = 404, description = "Unknown user"),
    )
)]
#[instrument(skip(state, payload))]
pub async fn welcome(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<(StatusCode, Json<UserResponse>), (StatusCode, String)> {
    let email = payload.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &email)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "unknown user".to_string()))?;
    if user.verified {
        return Err((StatusCode::FORBIDDEN, "Account already verified".into()));
    }

    // Rotate the token; the previous link stops working.
    let token = generate_one_time_token();
    let user = User::set_verification_token(&state.db, user.id, &token)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "unknown user".to_string()))?;

    queue_verification_email(&state, &user);

    Ok((
        StatusCode::CREATED,
        Json(UserResponse::from_user(&user, state.config.debug)),
    ))
}

/// Verify an email address from the token sent by email. One-shot:
/// verifying consumes the token.
#[utoipa::path(
    get, path = "/auth/verify/{token}", context_path = "/api/v1", tag = "auth",
    params(("token" = String, Path, description = "Verification token sent by email")),
    responses(
        (status = 200, body = MessageResponse),
        (status = 404, description = "Unknown verification token"),
    )
)]
#[instrument(skip(state))]
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let user = User::find_by_verification_token(&state.db, &token)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::NOT_FOUND,
            "the user belonging to this token no longer exists".to_string(),
        ))?;

    User::mark_verified(&state.db, user.id)
        .await
        .map_err(internal)?;

    info!(user_id = %user.id, "email verified");
    Ok(Json(MessageResponse::new(
        "email_verified",
        "Email verified successfully",
    )))
}

/// Refresh the token pair. The refresh token comes from the body or,
/// when the body is absent, from the `refresh_token` cookie.
#[utoipa::path(
    post, path = "/auth/refresh", context_path = "/api/v1", tag = "auth",
    request_body(content = RefreshRequest, description = "Optional; falls back to the refresh_token cookie"),
    responses(
        (status = 201, body = TokenPair),
        (status = 400, description = "Missing refresh token"),
        (status = 401, description = "Invalid or expired refresh token"),
        (status = 404, description = "User no longer exists"),
    )
)]
#[instrument(skip(state, jar, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Option<Json<RefreshRequest>>,
) -> Result<(StatusCode, CookieJar, Json<TokenPair>), (StatusCode, String)> {
    let token = payload
        .map(|Json(body)| body.token)
        .or_else(|| jar.get("refresh_token").map(|c| c.value().to_string()))
        .ok_or((StatusCode::BAD_REQUEST, "missing refresh token".to_string()))?;

    let user_id = state
        .keys
        .refresh
        .verify(&state.config.app_name, &token)
        .map_err(|_| {
            warn!("invalid or expired refresh token");
            (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired token".to_string(),
            )
        })?;

    let user = User::find_by_id(&state.db, user_id)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::NOT_FOUND,
            "the user belonging to this token no longer exists".to_string(),
        ))?;

    let pair = issue_pair(&state.keys, &state.config.app_name, &user).map_err(internal)?;
    let jar = auth_cookies(jar, &pair);
    Ok((StatusCode::CREATED, jar, Json(pair)))
}

/// Send a password-reset token by email.
#[utoipa::path(
    post, path = "/auth/forgot-password", context_path = "/api/v1", tag = "auth",
    request_body = EmailRequest,
    responses(
        (status = 201, body = MessageResponse),
        (status = 401, description = "Account not verified"),
        (status = 404, description = "Unknown user"),
    )
)]
#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), (StatusCode, String)> {
    let email = payload.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &email)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "unknown user".to_string()))?;
    if !user.verified {
        return Err((StatusCode::UNAUTHORIZED, "Account not verified".into()));
    }

    let token = generate_one_time_token();
    let user = User::set_reset_token(&state.db, user.id, &token)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "unknown user".to_string()))?;

    queue_reset_email(&state, &user);

    let message = if state.config.debug {
        MessageResponse::with_data(
            "reset_token",
            "Reset token sent successfully",
            serde_json::json!(token),
        )
    } else {
        MessageResponse::new("reset_token", "Reset token sent successfully")
    };
    Ok((StatusCode::CREATED, Json(message)))
}

/// Set a new password using the reset token; signs the user out.
#[utoipa::path(
    patch, path = "/auth/reset-password/{token}", context_path = "/api/v1", tag = "auth",
    params(("token" = String, Path, description = "Reset token sent by email")),
    request_body = PasswordRequest,
    responses(
        (status = 200, body = MessageResponse),
        (status = 404, description = "Unknown reset token"),
        (status = 412, description = "Passwords do not match"),
    )
)]
#[instrument(skip(state, jar, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(token): Path<String>,
    Json(payload): Json<PasswordRequest>,
) -> Result<(StatusCode, CookieJar, Json<MessageResponse>), (StatusCode, String)> {
    if payload.password != payload.password_confirmation {
        return Err((
            StatusCode::PRECONDITION_FAILED,
            "passwords do not match".into(),
        ));
    }

    let user = User::find_by_reset_token(&state.db, &token)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::NOT_FOUND,
            "the user belonging to this token no longer exists".to_string(),
        ))?;

    let hash = hash_password(&payload.password).map_err(internal)?;
    User::reset_password(&state.db, user.id, &hash)
        .await
        .map_err(internal)?;

    info!(user_id = %user.id, "password reset");
    Ok((
        StatusCode::OK,
        clear_auth_cookies(jar),
        Json(MessageResponse::new(
            "password_reset",
            "Password reset successfully",
        )),
    ))
}

/// Change the password of the signed-in user; issues a fresh token pair.
#[utoipa::path(
    post, path = "/auth/change-password", context_path = "/api/v1", tag = "auth",
    request_body = PasswordRequest,
    responses(
        (status = 201, body = TokenPair),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Account not verified"),
        (status = 412, description = "Passwords do not match"),
    )
)]
#[instrument(skip(state, jar, user, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    VerifiedUser(user): VerifiedUser,
    jar: CookieJar,
    Json(payload): Json<PasswordRequest>,
) -> Result<(StatusCode, CookieJar, Json<TokenPair>), (StatusCode, String)> {
    if payload.password != payload.password_confirmation {
        return Err((
            StatusCode::PRECONDITION_FAILED,
            "passwords do not match".into(),
        ));
    }

    let hash = hash_password(&payload.password).map_err(internal)?;
    let user = User::update_password(&state.db, user.id, &hash)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "unknown user".to_string()))?;

    let pair = issue_pair(&state.keys, &state.config.app_name, &user).map_err(internal)?;
    info!(user_id = %user.id, "password changed");
    let jar = auth_cookies(jar, &pair);
    Ok((StatusCode::CREATED, jar, Json(pair)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("a.b+c@sub.domain.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("spaces in@mail.com"));
    }

    #[test]
    fn auth_cookies_set_scope_and_flags() {
        let pair = testing::test_token_pair();
        let jar = auth_cookies(CookieJar::new(), &pair);

        let access = jar.get("access_token").expect("access cookie");
        assert_eq!(access.value(), pair.access_token);
        assert_eq!(access.path(), Some("/"));
        assert_eq!(access.http_only(), Some(true));

        let refresh = jar.get("refresh_token").expect("refresh cookie");
        assert_eq!(refresh.http_only(), Some(true));

        // The logged_in flag stays readable by front-end scripts.
        let logged_in = jar.get("logged_in").expect("logged_in cookie");
        assert_eq!(logged_in.value(), "true");
        assert_ne!(logged_in.http_only(), Some(true));
    }

    #[test]
    fn clear_auth_cookies_expires_all_three() {
        let pair = testing::test_token_pair();
        let jar = auth_cookies(CookieJar::new(), &pair);
        let jar = clear_auth_cookies(jar);

        for name in ["access_token", "refresh_token", "logged_in"] {
            let cookie = jar.get(name).expect("cleared cookie present");
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        }
    }

    // The precondition checks below all fire before any query runs, so
    // the lazily connecting test state never opens a connection.

    #[tokio::test]
    async fn signup_mismatched_confirmation_is_precondition_failed() {
        let state = testing::test_state();
        let payload = SignUpRequest {
            email: "user@example.com".into(),
            password: "long-enough-password".into(),
            password_confirmation: "a-different-password".into(),
        };
        let Err((status, _)) = signup(State(state), Json(payload)).await else {
            panic!("mismatch must be rejected");
        };
        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    }

    #[tokio::test]
    async fn signup_rejects_invalid_email() {
        let state = testing::test_state();
        let payload = SignUpRequest {
            email: "not-an-email".into(),
            password: "long-enough-password".into(),
            password_confirmation: "long-enough-password".into(),
        };
        let Err((status, message)) = signup(State(state), Json(payload)).await else {
            panic!("bad email must be rejected");
        };
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "Invalid email");
    }

    #[tokio::test]
    async fn signup_rejects_short_password() {
        let state = testing::test_state();
        let payload = SignUpRequest {
            email: "user@example.com".into(),
            password: "short".into(),
            password_confirmation: "short".into(),
        };
        let Err((status, message)) = signup(State(state), Json(payload)).await else {
            panic!("short password must be rejected");
        };
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "Password too short");
    }

    #[tokio::test]
    async fn reset_password_mismatch_is_precondition_failed() {
        let state = testing::test_state();
        let payload = PasswordRequest {
            password: "long-enough-password".into(),
            password_confirmation: "a-different-password".into(),
        };
        let Err((status, _)) = reset_password(
            State(state),
            CookieJar::new(),
            Path("some-reset-token".to_string()),
            Json(payload),
        )
        .await
        else {
            panic!("mismatch must be rejected");
        };
        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    }

    #[tokio::test]
    async fn refresh_without_body_or_cookie_is_bad_request() {
        let state = testing::test_state();
        let Err((status, _)) = refresh(State(state), CookieJar::new(), None).await else {
            panic!("missing token must be rejected");
        };
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn refresh_rejects_garbage_token_before_any_lookup() {
        let state = testing::test_state();
        let payload = RefreshRequest {
            token: "not.a.jwt".into(),
        };
        let Err((status, _)) = refresh(State(state), CookieJar::new(), Some(Json(payload))).await
        else {
            panic!("garbage token must be rejected");
        };
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
