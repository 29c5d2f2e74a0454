//! One-time reset code generation.

use rand::Rng;

use crate::config::OtpConfig;
use crate::domain::Otp;

/// Generates fixed-length numeric codes. Each digit is drawn independently,
/// so leading zeros are as likely as any other digit.
#[derive(Debug, Clone, Copy)]
pub struct OtpIssuer {
    length: usize,
}

impl OtpIssuer {
    #[must_use]
    pub const fn new(length: usize) -> Self {
        Self { length }
    }

    #[must_use]
    pub const fn from_config(config: &OtpConfig) -> Self {
        Self::new(config.length)
    }

    #[must_use]
    pub fn generate(&self) -> Otp {
        let mut rng = rand::rng();
        let code: String = (0..self.length)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect();

        Otp::new(code)
    }
}

impl Default for OtpIssuer {
    fn default() -> Self {
        Self::from_config(&OtpConfig::default())
    }
}
