use secrecy::Secret;
use service_core::config::{self as core_config, get_env, parse_env};
use service_core::error::AppError;
use std::env;

const DEV_SESSION_SECRET: &str = "dev-only-session-secret-change-me";

#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub common: core_config::Config,
    pub environment: String,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreBackend,
    pub mongodb: Option<MongoConfig>,
    pub session: SessionConfig,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: Secret<String>,
    pub ttl_days: i64,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

impl BoardConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common = core_config::Config::load()?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let is_prod = environment == "prod";

        let store: StoreBackend = get_env("STORE_BACKEND", Some("mongo"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let mongodb = match store {
            StoreBackend::Mongo => Some(MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("board_db"), false)?,
            }),
            StoreBackend::Memory => None,
        };

        let ttl_raw = get_env("SESSION_TTL_DAYS", Some("7"), false)?;
        let ttl_days: i64 = parse_env("SESSION_TTL_DAYS", &ttl_raw)?;
        if ttl_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_TTL_DAYS must be positive"
            )));
        }

        let cookie_raw = get_env("COOKIE_SECURE", Some("false"), false)?;
        let retries_raw = get_env("STORE_MAX_RETRIES", Some("3"), false)?;

        Ok(BoardConfig {
            common,
            service_name: get_env("SERVICE_NAME", Some("board-service"), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
            store,
            mongodb,
            session: SessionConfig {
                secret: Secret::new(get_env(
                    "SESSION_SECRET",
                    Some(DEV_SESSION_SECRET),
                    is_prod,
                )?),
                ttl_days,
                cookie_secure: parse_env("COOKIE_SECURE", &cookie_raw)?,
            },
            max_retries: parse_env("STORE_MAX_RETRIES", &retries_raw)?,
            environment,
        })
    }

    /// In-memory configuration for tests and local runs.
    pub fn for_memory(secret: &str) -> Self {
        BoardConfig {
            common: core_config::Config { port: 0 },
            environment: "test".to_string(),
            service_name: "board-service".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            store: StoreBackend::Memory,
            mongodb: None,
            session: SessionConfig {
                secret: Secret::new(secret.to_string()),
                ttl_days: 7,
                cookie_secure: false,
            },
            max_retries: 3,
        }
    }
}
