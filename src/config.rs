//! Configuration management for Annex.
//!
//! Loads configuration from environment variables (optionally via a `.env`
//! file) once, on first access.

use std::env;
use std::sync::OnceLock;
use std::time::Duration;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Initialize configuration (call once at startup)
pub fn init() -> &'static Config {
    config()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub links: LinkConfig,
    pub records: RecordStoreConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public_url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub attachments_path: String,
    pub max_attachment_size: usize,
    /// Accepted upload media types; `type/*` entries match a whole family.
    pub allowed_media_types: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Base URL for links when running behind a reverse proxy.
    pub proxy_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecordStoreConfig {
    /// Upper bound on one record store round trip.
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port: env_or("PORT", "8080").parse().unwrap_or(8080),
                public_url: env_or("PUBLIC_URL", "http://localhost:8080"),
            },
            database: DatabaseConfig {
                path: env_or("DATABASE_PATH", "./data/annex.db"),
            },
            storage: StorageConfig {
                attachments_path: env_or("ATTACHMENTS_PATH", "./data/attachments"),
                max_attachment_size: env_or("MAX_ATTACHMENT_SIZE", "10485760")
                    .parse()
                    .unwrap_or(10 * 1024 * 1024), // 10MB
                allowed_media_types: parse_list(&env_or("ALLOWED_MEDIA_TYPES", "image/*")),
            },
            links: LinkConfig {
                proxy_base_url: env::var("PROXY_BASE_URL")
                    .ok()
                    .filter(|v| !v.trim().is_empty()),
            },
            records: RecordStoreConfig {
                timeout: Duration::from_millis(
                    env_or("RECORD_STORE_TIMEOUT_MS", "5000")
                        .parse()
                        .unwrap_or(5000),
                ),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
