use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }
}

/// Deployment configuration, read once at startup. A missing mandatory
/// variable is a hard startup failure rendered before anything else runs;
/// there is no half-initialized global to limp along with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    /// Deployment-specific scope for the case collection and the
    /// configuration documents.
    pub app_id: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Redis
    pub redis_url: String,
    pub redis_cache_ttl_seconds: u64,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Identity provider
    pub auth_base_url: String,
    pub auth_api_key: String,
    pub auth_jwks_url: String,
    pub auth_issuer: String,
    pub auth_audience: String,
    pub jwks_cache_ttl_seconds: u64,

    /// Batch size for bulk case uploads.
    pub import_batch_size: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let app_id = env::var("APP_ID").unwrap_or_else(|_| "mrt-jdm-repair-default".to_string());

        // Database
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        // Redis
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://redis:6379/0".to_string());
        let redis_cache_ttl_seconds = env::var("REDIS_CACHE_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600); // 1 hour default

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Identity provider
        let auth_base_url = env::var("AUTH_BASE_URL").context("AUTH_BASE_URL must be set")?;
        let auth_api_key = env::var("AUTH_API_KEY").context("AUTH_API_KEY must be set")?;
        let auth_jwks_url = env::var("AUTH_JWKS_URL").context("AUTH_JWKS_URL must be set")?;
        let auth_issuer = env::var("AUTH_ISSUER").context("AUTH_ISSUER must be set")?;
        let auth_audience =
            env::var("AUTH_AUDIENCE").unwrap_or_else(|_| "authenticated".to_string());
        let jwks_cache_ttl_seconds = env::var("JWKS_CACHE_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1800); // 30 minutes default

        let import_batch_size = env::var("IMPORT_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        Ok(Settings {
            env,
            server_addr,
            app_id,
            database_url,
            database_max_connections,
            redis_url,
            redis_cache_ttl_seconds,
            cors_allow_origins,
            auth_base_url,
            auth_api_key,
            auth_jwks_url,
            auth_issuer,
            auth_audience,
            jwks_cache_ttl_seconds,
            import_batch_size,
        })
    }
}
