use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for sign-up.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

/// Request body for sign-in.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Request body carrying only an email (welcome resend, forgot password).
#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailRequest {
    pub email: String,
}

/// Request body for token refresh. The token may also come from the
/// `refresh_token` cookie when the body is absent.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub token: String,
}

/// New password with confirmation (reset and change password).
#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordRequest {
    pub password: String,
    pub password_confirmation: String,
}

/// Informational response envelope.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<serde_json::Value>,
}

impl MessageResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            data: None,
        }
    }

    pub fn with_data(code: &str, message: &str, data: serde_json::Value) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_response_omits_empty_data() {
        let json = serde_json::to_string(&MessageResponse::new("ok", "done")).unwrap();
        assert!(!json.contains("data"));

        let json = serde_json::to_string(&MessageResponse::with_data(
            "reset_token",
            "Reset token sent successfully",
            serde_json::json!("abc123"),
        ))
        .unwrap();
        assert!(json.contains("\"data\":\"abc123\""));
    }
}
