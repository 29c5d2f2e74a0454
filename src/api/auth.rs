use axum::{
    Extension, Json,
    extract::{Request, State, rejection::JsonRejection},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::validation;
use super::{
    ApiError, ApiResponse, AppState, CurrentUserResponse, ForgotPasswordRequest, LoginRequest,
    LoginResponse, MessageResponse, ResetPasswordRequest, VerifyResponse,
};
use crate::constants::messages;
use crate::services::{AuthError, Claims};

// ============================================================================
// Middleware
// ============================================================================

/// Rejects requests without a valid `Authorization: Bearer <token>` session.
/// The verified [`Claims`] are added to the request extensions.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Access token required"))?;

    let claims = state.auth_service().verify_session(token)?;

    tracing::Span::current().record("user_id", claims.sub.value());
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let Json(payload) = payload?;
    let (username, password) = validation::validate_login(&payload)?;

    let result = state.auth_service().login(&username, &password).await?;

    Ok(Json(ApiResponse::success(LoginResponse {
        message: "Login successful".to_string(),
        token: result.token,
        expires_at: result.expires_at.to_rfc3339(),
        user: result.user,
    })))
}

/// POST /auth/forgot-password
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let Json(payload) = payload?;
    let email = validation::validate_forgot_password(&payload)?;

    state.auth_service().forgot_password(&email).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        messages::RESET_CODE_SENT,
    ))))
}

/// POST /auth/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let Json(payload) = payload?;
    let (email, otp, new_password) =
        validation::validate_reset_password(&payload, state.config().otp.length)?;

    match state
        .auth_service()
        .reset_password(&email, &otp, &new_password)
        .await
    {
        Ok(()) => Ok(Json(ApiResponse::success(MessageResponse::new(
            messages::PASSWORD_RESET,
        )))),
        // An unknown address must look exactly like a wrong code.
        Err(AuthError::InvalidCredentials | AuthError::InvalidOrExpiredOtp) => {
            Err(ApiError::validation(messages::INVALID_OTP))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /auth/verify
/// Only checks that a bearer token was sent. Protected routes verify it.
pub async fn verify(headers: HeaderMap) -> Result<Json<ApiResponse<VerifyResponse>>, ApiError> {
    if extract_bearer_token(&headers).is_none() {
        return Err(ApiError::unauthorized("Access token required"));
    }

    Ok(Json(ApiResponse::success(VerifyResponse {
        message: "Token is valid".to_string(),
    })))
}

/// GET /auth/me
pub async fn current_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<CurrentUserResponse>>, ApiError> {
    let user = state.auth_service().current_user(claims.user_id()).await?;
    Ok(Json(ApiResponse::success(CurrentUserResponse { user })))
}
