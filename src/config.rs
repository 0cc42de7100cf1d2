use std::env;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use chrono::NaiveTime;
use dotenvy::dotenv;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Uploads
    pub upload_dir: String,
    pub max_upload_bytes: usize,

    /// Check-ins after this local time are recorded as late
    pub late_after: NaiveTime,

    pub cookie_secure: bool,
    pub run_migrations: bool,
    pub log_dir: String,

    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Clone, Debug)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        let bootstrap_admin = match (
            env::var("BOOTSTRAP_ADMIN_EMAIL").ok(),
            env::var("BOOTSTRAP_ADMIN_PASSWORD").ok(),
        ) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin { email, password })
            }
            _ => None,
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: var_or("ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: var_or("REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: var_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: var_or("RATE_REGISTER_PER_MIN", 30)?,
            rate_refresh_per_min: var_or("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: var_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),

            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            max_upload_bytes: var_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,

            late_after: parse_value(
                "LATE_AFTER",
                &env::var("LATE_AFTER").unwrap_or_else(|_| "09:30:00".to_string()),
            )?,

            cookie_secure: var_or("COOKIE_SECURE", false)?,
            run_migrations: var_or("RUN_MIGRATIONS", true)?,
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),

            bootstrap_admin,
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn var_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("{key} has invalid value {raw:?}: {e}"))
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "mysql://localhost/test".into(),
        jwt_secret: "test-secret-key-at-least-32-bytes".into(),
        server_addr: "127.0.0.1:0".into(),
        access_token_ttl: 900,
        refresh_token_ttl: 3600,
        rate_login_per_min: 60,
        rate_register_per_min: 30,
        rate_refresh_per_min: 30,
        rate_protected_per_min: 1000,
        api_prefix: "/api/v1".into(),
        upload_dir: std::env::temp_dir()
            .join("workforce-test-uploads")
            .to_string_lossy()
            .into_owned(),
        max_upload_bytes: 10 * 1024 * 1024,
        late_after: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        cookie_secure: false,
        run_migrations: false,
        log_dir: "logs".into(),
        bootstrap_admin: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers_and_flags() {
        assert_eq!(parse_value::<usize>("TTL", " 900 ").unwrap(), 900);
        assert!(parse_value::<bool>("COOKIE_SECURE", "true").unwrap());
        assert_eq!(
            parse_value::<NaiveTime>("LATE_AFTER", "10:15:00").unwrap(),
            NaiveTime::from_hms_opt(10, 15, 0).unwrap()
        );
    }

    #[test]
    fn invalid_value_names_the_variable() {
        let err = parse_value::<u32>("RATE_LOGIN_PER_MIN", "lots").unwrap_err();
        assert!(err.to_string().contains("RATE_LOGIN_PER_MIN"));
    }
}
