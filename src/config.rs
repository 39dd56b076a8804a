use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub public_rps: u32,
    pub notification_webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub certificate_validity_days: i64,
    pub default_passing_marks: f64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let notification_webhook_url = get_env_opt("NOTIFICATION_WEBHOOK_URL");
        if let Some(raw) = &notification_webhook_url {
            Url::parse(raw).map_err(|e| {
                Error::Config(format!("Invalid value for NOTIFICATION_WEBHOOK_URL: {}", e))
            })?;
        }

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            database_max_connections: get_env_parse_or("DATABASE_MAX_CONNECTIONS", 20)?,
            jwt_secret: get_env("JWT_SECRET")?,
            public_rps: get_env_parse("PUBLIC_RPS")?,
            notification_webhook_url,
            webhook_secret: get_env_opt("WEBHOOK_SECRET"),
            certificate_validity_days: validity_days(get_env_parse_or(
                "CERTIFICATE_VALIDITY_DAYS",
                365,
            )?)?,
            default_passing_marks: get_env_parse_or("DEFAULT_PASSING_MARKS", 50.0)?,
        })
    }
}

/// Certificates last between one day and a century.
fn validity_days(days: i64) -> Result<i64> {
    if (1..=36_500).contains(&days) {
        Ok(days)
    } else {
        Err(Error::Config(format!(
            "CERTIFICATE_VALIDITY_DAYS must be between 1 and 36500, got {}",
            days
        )))
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_opt(name) {
        Some(_) => get_env_parse(name),
        None => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
