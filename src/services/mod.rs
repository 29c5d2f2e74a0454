pub mod auth_service;
pub mod auth_service_impl;
pub mod notifications;
pub mod otp;
pub mod session;
pub mod smtp;

pub use auth_service::{AuthError, AuthService, LoginResult, UserInfo};
pub use auth_service_impl::SeaOrmAuthService;
pub use notifications::{LogNotifier, Notification, Notifier, NotifyError};
pub use otp::OtpIssuer;
pub use session::{Claims, SessionError, SessionIssuer, SessionToken};
pub use smtp::SmtpNotifier;
