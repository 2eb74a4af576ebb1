use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// SMTP relay settings. When `host` is `None` outgoing mail is only logged.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    pub timeout_secs: u64,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub ttl_secs: u64,
    pub verified_ttl_secs: u64,
    /// Wrong codes accepted before the pending code is revoked.
    pub max_attempts: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            verified_ttl_secs: 300,
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub storage: StorageConfig,
    pub otp: OtpConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "linkhub".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "linkhub-users".into()),
            ttl_minutes: parse_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: parse_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let smtp = SmtpConfig {
            host: optional("SMTP_HOST"),
            port: parse_or("SMTP_PORT", 587),
            username: optional("SMTP_USERNAME"),
            password: optional("SMTP_PASSWORD"),
            tls: parse_or("SMTP_TLS", true),
            timeout_secs: parse_or("SMTP_TIMEOUT_SECS", 10),
            from: std::env::var("EMAIL_FROM").unwrap_or_else(|_| "no-reply@linkhub.local".into()),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("MINIO_ENDPOINT").context("MINIO_ENDPOINT is not set")?,
            bucket: std::env::var("MINIO_BUCKET").context("MINIO_BUCKET is not set")?,
            access_key: std::env::var("MINIO_ACCESS_KEY").context("MINIO_ACCESS_KEY is not set")?,
            secret_key: std::env::var("MINIO_SECRET_KEY").context("MINIO_SECRET_KEY is not set")?,
            region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };
        let otp = OtpConfig {
            ttl_secs: parse_or("OTP_TTL_SECS", 600),
            verified_ttl_secs: parse_or("OTP_VERIFIED_TTL_SECS", 300),
            max_attempts: parse_or("OTP_MAX_ATTEMPTS", 5u64).max(1),
        };
        Ok(Self {
            database_url,
            redis_url: optional("REDIS_URL"),
            jwt,
            smtp,
            storage,
            otp,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_on_missing_or_garbage() {
        std::env::set_var("LINKHUB_TEST_PORT", "not-a-number");
        assert_eq!(parse_or::<u16>("LINKHUB_TEST_PORT", 587), 587);
        assert_eq!(parse_or::<u16>("LINKHUB_TEST_UNSET_PORT", 25), 25);
        std::env::set_var("LINKHUB_TEST_PORT", "2525");
        assert_eq!(parse_or::<u16>("LINKHUB_TEST_PORT", 587), 2525);
    }

    #[test]
    fn blank_optional_values_are_treated_as_unset() {
        std::env::set_var("LINKHUB_TEST_BLANK", "   ");
        assert_eq!(optional("LINKHUB_TEST_BLANK"), None);
        std::env::set_var("LINKHUB_TEST_SET", "smtp.example.com");
        assert_eq!(optional("LINKHUB_TEST_SET").as_deref(), Some("smtp.example.com"));
    }

    #[test]
    fn otp_defaults_match_reset_windows() {
        let otp = OtpConfig::default();
        assert_eq!(otp.ttl_secs, 600);
        assert_eq!(otp.verified_ttl_secs, 300);
        assert_eq!(otp.max_attempts, 5);
    }
}
