use regex::Regex;
use std::sync::OnceLock;

use super::{ApiError, FieldError, ForgotPasswordRequest, LoginRequest, ResetPasswordRequest};
use crate::constants::limits;
use crate::db::normalize_email;
use crate::domain::Otp;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
            .expect("Invalid regex")
    })
}

pub fn validate_username(username: &str) -> Result<String, FieldError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(FieldError::new("username", "Username is required"));
    }
    if trimmed.chars().count() > limits::MAX_USERNAME_LENGTH {
        return Err(FieldError::new(
            "username",
            format!(
                "Username must be {} characters or less",
                limits::MAX_USERNAME_LENGTH
            ),
        ));
    }
    Ok(trimmed.to_string())
}

/// Login passwords are checked only for presence and an upper bound, so
/// accounts created under older rules can still sign in.
pub fn validate_login_password(password: &str) -> Result<String, FieldError> {
    if password.is_empty() {
        return Err(FieldError::new("password", "Password is required"));
    }
    if password.chars().count() > limits::MAX_PASSWORD_LENGTH {
        return Err(FieldError::new(
            "password",
            format!(
                "Password must be {} characters or less",
                limits::MAX_PASSWORD_LENGTH
            ),
        ));
    }
    Ok(password.to_string())
}

pub fn validate_new_password(password: &str) -> Result<String, FieldError> {
    let len = password.chars().count();
    if len < limits::MIN_PASSWORD_LENGTH {
        return Err(FieldError::new(
            "newPassword",
            format!(
                "Password must be at least {} characters long",
                limits::MIN_PASSWORD_LENGTH
            ),
        ));
    }
    if len > limits::MAX_PASSWORD_LENGTH {
        return Err(FieldError::new(
            "newPassword",
            format!(
                "Password must be {} characters or less",
                limits::MAX_PASSWORD_LENGTH
            ),
        ));
    }
    Ok(password.to_string())
}

/// Returns the trimmed, lower-cased address.
pub fn validate_email(email: &str) -> Result<String, FieldError> {
    let normalized = normalize_email(email);
    if normalized.len() > limits::MAX_EMAIL_LENGTH || !email_regex().is_match(&normalized) {
        return Err(FieldError::new("email", "Valid email is required"));
    }
    Ok(normalized)
}

pub fn validate_otp(otp: &str, length: usize) -> Result<Otp, FieldError> {
    let otp = otp.trim();
    if otp.len() != length || !otp.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FieldError::new(
            "otp",
            format!("OTP must be {length} digits"),
        ));
    }
    Ok(Otp::new(otp))
}

fn collect<A, B>(a: Result<A, FieldError>, b: Result<B, FieldError>) -> Result<(A, B), ApiError> {
    match (a, b) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (a, b) => Err(ApiError::InvalidFields(
            [a.err(), b.err()].into_iter().flatten().collect(),
        )),
    }
}

pub fn validate_login(req: &LoginRequest) -> Result<(String, String), ApiError> {
    collect(
        validate_username(&req.username),
        validate_login_password(&req.password),
    )
}

pub fn validate_forgot_password(req: &ForgotPasswordRequest) -> Result<String, ApiError> {
    validate_email(&req.email).map_err(|e| ApiError::InvalidFields(vec![e]))
}

pub fn validate_reset_password(
    req: &ResetPasswordRequest,
    otp_length: usize,
) -> Result<(String, Otp, String), ApiError> {
    let email = validate_email(&req.email);
    let otp = validate_otp(&req.otp, otp_length);
    let password = validate_new_password(&req.new_password);

    match (email, otp, password) {
        (Ok(email), Ok(otp), Ok(password)) => Ok((email, otp, password)),
        (email, otp, password) => Err(ApiError::InvalidFields(
            [email.err(), otp.err(), password.err()]
                .into_iter()
                .flatten()
                .collect(),
        )),
    }
}
