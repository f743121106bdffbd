use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
    #[error("{0} must be set when DATABASE_URL is configured")]
    Missing(&'static str),
}

const DEV_JWT_SECRET: &str = "reviewboost-dev-secret";

/// Runtime settings read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub cookie_secure: bool,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_timeout: Duration,
    pub feedback_cache_ttl: Duration,
    pub templates_per_generation: usize,
    pub scraper_timeout: Duration,
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = optional("DATABASE_URL");
        let jwt_secret = match optional("JWT_SECRET") {
            Some(secret) => secret,
            // A persistent deployment must not run on the shared development secret.
            None if database_url.is_some() => return Err(ConfigError::Missing("JWT_SECRET")),
            None => {
                log::warn!("JWT_SECRET not set; using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        Ok(Self {
            host: optional("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parsed("PORT", 8082)?,
            database_url,
            jwt_secret,
            session_ttl: Duration::from_secs(parsed::<u64>("SESSION_TTL_HOURS", 24)? * 3600),
            cookie_secure: parsed("COOKIE_SECURE", false)?,
            openai_api_key: optional("OPENAI_API_KEY"),
            openai_base_url: optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            openai_model: optional("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            openai_timeout: Duration::from_secs(parsed("OPENAI_TIMEOUT_SECS", 60)?),
            feedback_cache_ttl: Duration::from_secs(parsed("FEEDBACK_CACHE_TTL_SECS", 300)?),
            templates_per_generation: parsed("TEMPLATES_PER_GENERATION", 5)?,
            scraper_timeout: Duration::from_secs(parsed("SCRAPER_TIMEOUT_SECS", 10)?),
            bootstrap_admin_email: optional("BOOTSTRAP_ADMIN_EMAIL"),
            bootstrap_admin_password: optional("BOOTSTRAP_ADMIN_PASSWORD"),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
