use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "gatekit",
        description = "Boilerplate REST API backend: registration, JWT authentication, \
                       email verification, password reset and user CRUD."
    ),
    tags(
        (name = "auth", description = "Registration, authentication and account recovery"),
        (name = "users", description = "Current-user and admin user management"),
        (name = "status", description = "Health and connection status"),
    ),
    paths(
        crate::auth::handlers::signup,
        crate::auth::handlers::signin,
        crate::auth::handlers::signout,
        crate::auth::handlers::welcome,
        crate::auth::handlers::verify_email,
        crate::auth::handlers::refresh,
        crate::auth::handlers::forgot_password,
        crate::auth::handlers::reset_password,
        crate::auth::handlers::change_password,
        crate::users::handlers::get_me,
        crate::users::handlers::update_me,
        crate::users::handlers::delete_me,
        crate::users::handlers::list_users,
        crate::users::handlers::get_user,
        crate::users::handlers::update_user,
        crate::users::handlers::delete_user,
        crate::status::healthcheck,
        crate::status::ping,
        crate::status::status,
    ),
    components(schemas(
        crate::auth::dto::SignUpRequest,
        crate::auth::dto::SignInRequest,
        crate::auth::dto::EmailRequest,
        crate::auth::dto::RefreshRequest,
        crate::auth::dto::PasswordRequest,
        crate::auth::dto::MessageResponse,
        crate::auth::tokens::TokenPair,
        crate::users::dto::UserResponse,
        crate::users::dto::UpdateMeRequest,
        crate::users::dto::AdminUpdateUserRequest,
        crate::users::model::Role,
        crate::status::StatusResponse,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_all_operations() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/api/v1/auth/signup",
            "/api/v1/auth/signin",
            "/api/v1/auth/signout",
            "/api/v1/auth/welcome",
            "/api/v1/auth/verify/{token}",
            "/api/v1/auth/refresh",
            "/api/v1/auth/forgot-password",
            "/api/v1/auth/reset-password/{token}",
            "/api/v1/auth/change-password",
            "/api/v1/users/me",
            "/api/v1/users",
            "/api/v1/users/{id}",
            "/api/v1/healthcheck",
            "/api/v1/ping",
            "/api/v1/status",
        ] {
            assert!(paths.contains_key(path), "missing path {path}");
        }
    }
}
