pub mod limits {

    pub const MIN_PASSWORD_LENGTH: usize = 6;

    pub const MAX_PASSWORD_LENGTH: usize = 128;

    pub const MAX_USERNAME_LENGTH: usize = 50;

    pub const MAX_EMAIL_LENGTH: usize = 254;
}

pub mod messages {

    pub const RESET_CODE_SENT: &str = "OTP has been sent to your email address";

    pub const PASSWORD_RESET: &str = "Password has been reset successfully";

    pub const INVALID_OTP: &str = "Invalid or expired OTP";

    pub const UNKNOWN_EMAIL: &str = "No account found with this email address";

    pub const INVALID_LOGIN: &str = "Invalid username or password";
}
