// Runtime settings: CLI flags with environment fallback (.env is loaded first)

use anyhow::{bail, Context, Result};
use clap::Parser;
use jsonwebtoken::Algorithm;

#[derive(Parser, Debug, Clone)]
#[command(name = "household-server", about = "Household finance, garage and kitchen API")]
pub struct Settings {
    #[arg(long, env = "APP_NAME", default_value = "household-api")]
    pub app_name: String,

    /// Permissive CORS and verbose logs
    #[arg(long, env = "DEBUG", default_value_t = false)]
    pub debug: bool,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "household.db")]
    pub database_path: String,

    #[arg(long, env = "SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(short, long, env = "SERVER_PORT", default_value_t = 8000)]
    pub port: u16,

    #[arg(long, env = "JWT_SECRET_KEY", hide_env_values = true)]
    pub jwt_secret_key: String,

    #[arg(long, env = "JWT_ALGORITHM", default_value = "HS256")]
    pub jwt_algorithm: String,

    #[arg(long, env = "ACCESS_TOKEN_EXPIRE_MINUTES", default_value_t = 30)]
    pub access_token_expire_minutes: i64,

    #[arg(long, env = "REFRESH_TOKEN_EXPIRE_DAYS", default_value_t = 7)]
    pub refresh_token_expire_days: i64,

    /// Comma separated list or JSON array of allowed origins
    #[arg(long, env = "CORS_ORIGINS", default_value = "")]
    pub cors_origins: String,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,

    #[arg(long, env = "TOKEN_CLEANUP_INTERVAL_SECS", default_value_t = 3600)]
    pub token_cleanup_interval_secs: u64,

    /// Refresh tokens a user may hold at once
    #[arg(long, env = "MAX_ACTIVE_SESSIONS", default_value_t = 5)]
    pub max_active_sessions: usize,
}

impl Settings {
    /// Load `.env` (if present) and parse process arguments
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        let settings = Settings::try_parse().context("Failed to parse settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret_key.trim().is_empty() {
            bail!("JWT_SECRET_KEY must not be empty");
        }
        self.algorithm()?;
        if self.access_token_expire_minutes <= 0 || self.refresh_token_expire_days <= 0 {
            bail!("Token lifetimes must be positive");
        }
        if self.max_active_sessions == 0 {
            bail!("MAX_ACTIVE_SESSIONS must be at least 1");
        }
        Ok(())
    }

    /// Signing algorithm; only the HMAC family is accepted
    pub fn algorithm(&self) -> Result<Algorithm> {
        match self.jwt_algorithm.trim().to_uppercase().as_str() {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            other => bail!("Unsupported JWT algorithm: {}", other),
        }
    }

    /// Allowed CORS origins parsed from the raw setting
    pub fn cors_origins(&self) -> Result<Vec<String>> {
        parse_origins(&self.cors_origins)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_origins(raw: &str) -> Result<Vec<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    if raw.starts_with('[') {
        let origins: Vec<String> =
            serde_json::from_str(raw).context("CORS_ORIGINS is not a valid JSON array")?;
        return Ok(origins
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect());
    }

    Ok(raw
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect())
}
