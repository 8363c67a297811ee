use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Argon2id cost parameters for stored password hashes.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    /// Iterations (`t` in the PHC string).
    pub cost: u32,
    pub memory_kib: u32,
}

/// Outbound mail. Absent when `FROM_MAIL` is not set.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from_address: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub reset_code_ttl_secs: i64,
    pub email: Option<EmailConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL")?,
            max_connections: parse_env("DB_MAX_CONNECTIONS").unwrap_or(10),
            timeout_secs: parse_env("DB_TIMEOUT_SECS").unwrap_or(10),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "stockkeep".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "stockkeep-users".into()),
            ttl_minutes: parse_env("JWT_TTL_MINUTES").unwrap_or(30),
            refresh_ttl_minutes: parse_env("JWT_REFRESH_TTL_MINUTES").unwrap_or(120),
        };
        let hashing = PasswordConfig {
            cost: parse_env("PASSWORD_HASH_COST").unwrap_or(2),
            memory_kib: parse_env("PASSWORD_HASH_MEMORY_KIB").unwrap_or(19 * 1024),
        };
        let email = match (std::env::var("FROM_MAIL"), std::env::var("FROM_MAIL_PASSWORD")) {
            (Ok(from_address), Ok(password)) => Some(EmailConfig {
                smtp_host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".into()),
                smtp_port: parse_env("SMTP_PORT").unwrap_or(587),
                from_address,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_env("APP_PORT").unwrap_or(8080),
            database,
            jwt,
            password: hashing,
            reset_code_ttl_secs: parse_env("RESET_CODE_TTL_SECS").unwrap_or(60),
            email,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
