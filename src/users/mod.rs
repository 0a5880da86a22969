pub mod dto;
pub mod handlers;
pub mod model;

use axum::{
    routing::{delete, get, patch},
    Router,
};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/users/me",
            get(handlers::get_me)
                .patch(handlers::update_me)
                .delete(handlers::delete_me),
        )
        .route("/users", get(handlers::list_users))
        .route("/users/:id", get(handlers::get_user))
        .route("/users/:id", patch(handlers::update_user))
        .route("/users/:id", delete(handlers::delete_user))
}
