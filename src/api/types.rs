use serde::{Deserialize, Serialize};

use crate::services::UserInfo;

/// Envelope for every JSON body. Payload fields are flattened next to
/// `success`, so a login reply reads `{"success":true,"token":..,"user":..}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            details: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.details = details;
        self
    }
}

/// One rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub expires_at: String,
    pub user: UserInfo,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
    #[serde(default, alias = "new_password")]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
    pub database: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_flattens_payload() {
        let body = serde_json::to_value(ApiResponse::success(MessageResponse::new("ok"))).unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "message": "ok"}));
    }

    #[test]
    fn error_omits_empty_details() {
        let body = serde_json::to_value(ApiResponse::<()>::error("nope")).unwrap();
        assert_eq!(body, serde_json::json!({"success": false, "error": "nope"}));
    }

    #[test]
    fn error_carries_details() {
        let body = serde_json::to_value(
            ApiResponse::<()>::error("Validation failed")
                .with_details(vec![FieldError::new("email", "Invalid email address")]),
        )
        .unwrap();
        assert_eq!(body["details"][0]["field"], "email");
    }

    #[test]
    fn reset_request_accepts_both_casings() {
        let camel: ResetPasswordRequest =
            serde_json::from_str(r#"{"email":"a@b.co","otp":"123456","newPassword":"secret1"}"#)
                .unwrap();
        let snake: ResetPasswordRequest =
            serde_json::from_str(r#"{"email":"a@b.co","otp":"123456","new_password":"secret1"}"#)
                .unwrap();
        assert_eq!(camel.new_password, "secret1");
        assert_eq!(snake.new_password, "secret1");
    }
}
