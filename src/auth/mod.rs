pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod password;
pub mod tokens;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/signin", post(handlers::signin))
        .route("/auth/signout", get(handlers::signout))
        .route("/auth/welcome", post(handlers::welcome))
        .route("/auth/verify/:token", get(handlers::verify_email))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/forgot-password", post(handlers::forgot_password))
        .route("/auth/reset-password/:token", patch(handlers::reset_password))
        .route("/auth/change-password", post(handlers::change_password))
}
