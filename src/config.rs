use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Signing secret shipped as the default. Rejected in production.
pub const DEFAULT_SESSION_SECRET: &str = "your-super-secret-jwt-key-change-this-in-production";

/// Bootstrap admin password shipped as the default. Rejected in production.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub session: SessionConfig,

    pub otp: OtpConfig,

    pub email: EmailConfig,

    pub security: SecurityConfig,

    pub admin: AdminConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// "pretty" or "json"
    pub log_format: String,

    /// "development" or "production". Production refuses insecure defaults.
    pub environment: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/s2admin.db".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            environment: "development".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

impl GeneralConfig {
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Maximum accepted request body, in bytes (default: 10 MiB)
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            cors_allowed_origins: vec!["*".to_string()],
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// HMAC secret for session tokens. Rotating it invalidates every issued token.
    pub secret: String,

    pub expires_in_hours: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: DEFAULT_SESSION_SECRET.to_string(),
            expires_in_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    /// Digits in a generated code
    pub length: usize,

    /// Validity window of an issued code
    pub expires_in_minutes: u32,

    /// When true, forgot-password tells the caller that no account uses the
    /// address. When false, unknown addresses get the same response as known ones.
    pub disclose_unknown_email: bool,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            length: 6,
            expires_in_minutes: 10,
            disclose_unknown_email: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// When disabled, messages are recorded in the log instead of being sent.
    pub enabled: bool,

    pub host: String,

    pub port: u16,

    pub username: String,

    pub password: String,

    pub from: String,

    pub brand_name: String,

    pub timeout_seconds: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "smtp.gmail.com".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from: "S2 Design Interior <noreply@s2design.com>".to_string(),
            brand_name: "S2 Design Interior".to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost used when hashing the bootstrap admin password.
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    /// Argon2 time cost for rotated credentials (password resets).
    /// Must not be lower than `argon2_time_cost`.
    pub rotated_time_cost: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 2,
            argon2_parallelism: 1,
            rotated_time_cost: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub username: String,

    pub password: String,

    pub email: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: DEFAULT_ADMIN_PASSWORD.to_string(),
            email: Some("admin@s2design.com".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Config {
    /// Loads `.env`, the first config file found, then environment overrides.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from: {}", path.display());
        }

        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Overrides file values with environment variables. `lookup` abstracts
    /// the environment so tests don't have to mutate the process env.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
        where
            T::Err: std::fmt::Display,
        {
            value
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid value for {key}: {e}"))
        }

        if let Some(v) = lookup("PORT") {
            self.server.port = parsed("PORT", &v)?;
        }
        if let Some(v) = lookup("DATABASE_PATH") {
            self.general.database_path = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.general.log_level = v;
        }
        if let Some(v) = lookup("APP_ENV") {
            self.general.environment = v;
        }
        if let Some(v) = lookup("JWT_SECRET") {
            self.session.secret = v;
        }
        if let Some(v) = lookup("JWT_EXPIRES_IN_HOURS") {
            self.session.expires_in_hours = parsed("JWT_EXPIRES_IN_HOURS", &v)?;
        }
        if let Some(v) = lookup("OTP_LENGTH") {
            self.otp.length = parsed("OTP_LENGTH", &v)?;
        }
        if let Some(v) = lookup("OTP_EXPIRES_IN_MINUTES") {
            self.otp.expires_in_minutes = parsed("OTP_EXPIRES_IN_MINUTES", &v)?;
        }
        if let Some(v) = lookup("EMAIL_ENABLED") {
            self.email.enabled = parsed("EMAIL_ENABLED", &v)?;
        }
        if let Some(v) = lookup("EMAIL_HOST") {
            self.email.host = v;
        }
        if let Some(v) = lookup("EMAIL_PORT") {
            self.email.port = parsed("EMAIL_PORT", &v)?;
        }
        if let Some(v) = lookup("EMAIL_USER") {
            self.email.username = v;
        }
        if let Some(v) = lookup("EMAIL_PASSWORD") {
            self.email.password = v;
        }
        if let Some(v) = lookup("EMAIL_FROM") {
            self.email.from = v;
        }
        if let Some(v) = lookup("ADMIN_USERNAME") {
            self.admin.username = v;
        }
        if let Some(v) = lookup("ADMIN_PASSWORD") {
            self.admin.password = v;
        }
        if let Some(v) = lookup("ADMIN_EMAIL") {
            self.admin.email = Some(v).filter(|e| !e.trim().is_empty());
        }

        Ok(())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("s2admin").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".s2admin").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(4..=10).contains(&self.otp.length) {
            anyhow::bail!("OTP length must be between 4 and 10 digits");
        }

        if self.otp.expires_in_minutes == 0 {
            anyhow::bail!("OTP expiry window must be at least one minute");
        }

        if self.session.expires_in_hours == 0 {
            anyhow::bail!("Session lifetime must be at least one hour");
        }

        if self.session.secret.is_empty() {
            anyhow::bail!("Session signing secret cannot be empty");
        }

        if self.security.rotated_time_cost < self.security.argon2_time_cost {
            anyhow::bail!(
                "Rotated credential cost ({}) cannot be lower than bootstrap cost ({})",
                self.security.rotated_time_cost,
                self.security.argon2_time_cost
            );
        }

        if self.email.enabled && (self.email.host.is_empty() || self.email.from.is_empty()) {
            anyhow::bail!("Email host and sender address are required when email is enabled");
        }

        for problem in self.insecure_defaults() {
            if self.general.is_production() {
                anyhow::bail!("Refusing to start in production: {problem}");
            }
            warn!("Insecure configuration: {problem}");
        }

        Ok(())
    }

    /// Settings that are acceptable for local development only.
    #[must_use]
    pub fn insecure_defaults(&self) -> Vec<&'static str> {
        let mut problems = Vec::new();

        if self.session.secret == DEFAULT_SESSION_SECRET {
            problems.push("session secret is the shipped default (set JWT_SECRET)");
        } else if self.session.secret.len() < 32 {
            problems.push("session secret must be at least 32 characters");
        }

        if self.admin.password == DEFAULT_ADMIN_PASSWORD {
            problems.push("admin password is the shipped default (set ADMIN_PASSWORD)");
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.otp.length, 6);
        assert_eq!(config.otp.expires_in_minutes, 10);
        assert_eq!(config.session.expires_in_hours, 24);
        assert_eq!(config.admin.username, "admin");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[session]"));
        assert!(toml_str.contains("[otp]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [otp]
            expires_in_minutes = 15
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.otp.expires_in_minutes, 15);

        assert_eq!(config.otp.length, 6);
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PORT", "8080"),
            ("JWT_SECRET", "0123456789abcdef0123456789abcdef"),
            ("OTP_LENGTH", "8"),
            ("ADMIN_EMAIL", "owner@example.com"),
        ]);

        let mut config = Config::default();
        config
            .apply_env(|key| env.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.otp.length, 8);
        assert_eq!(config.admin.email.as_deref(), Some("owner@example.com"));
        assert!(config.insecure_defaults().iter().all(|p| !p.contains("secret")));
    }

    #[test]
    fn env_override_with_bad_number_fails() {
        let mut config = Config::default();
        let result = config.apply_env(|key| (key == "PORT").then(|| "not-a-port".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn production_rejects_shipped_defaults() {
        let mut config = Config::default();
        config.general.environment = "production".to_string();
        assert!(config.validate().is_err());

        config.session.secret = "s".repeat(48);
        config.admin.password = "a-much-better-password".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rotated_cost_cannot_be_weaker_than_bootstrap() {
        let mut config = Config::default();
        config.security.rotated_time_cost = 1;
        config.security.argon2_time_cost = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn otp_length_bounds() {
        let mut config = Config::default();
        config.otp.length = 3;
        assert!(config.validate().is_err());
        config.otp.length = 11;
        assert!(config.validate().is_err());
    }
}
