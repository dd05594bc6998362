use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Include internal error details in 500 responses (development only).
    pub expose_errors: bool,
    pub run_migrations: bool,
    pub outbox: OutboxConfig,
}

#[derive(Debug, Clone)]
pub struct OutboxConfig {
    pub poll_secs: u64,
    pub batch_size: i64,
    pub max_attempts: i32,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_secs: 5,
            batch_size: 50,
            max_attempts: 5,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("APP_PORT").unwrap_or(3000);
        let defaults = OutboxConfig::default();
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            expose_errors: flag("APP_EXPOSE_ERRORS", false),
            run_migrations: flag("RUN_MIGRATIONS", true),
            outbox: OutboxConfig {
                poll_secs: parse_var("OUTBOX_POLL_SECS").unwrap_or(defaults.poll_secs),
                batch_size: parse_var("OUTBOX_BATCH_SIZE").unwrap_or(defaults.batch_size),
                max_attempts: parse_var("OUTBOX_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts),
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}
