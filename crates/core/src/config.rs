use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub postgres: PostgresConfig,
    pub scheduler: SchedulerConfig,
    pub notify: NotifyConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            postgres: PostgresConfig::from_env(),
            scheduler: SchedulerConfig::from_env(),
            notify: NotifyConfig::from_env(),
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  server:    host={}, port={}", self.server.host, self.server.port);
        tracing::info!(
            "  postgres:  host={}, db={}, configured={}",
            self.postgres.host,
            self.postgres.database,
            self.postgres.is_configured()
        );
        tracing::info!(
            "  scheduler: tick={}s, batch={}",
            self.scheduler.tick_interval_secs,
            self.scheduler.batch_size
        );
        tracing::info!(
            "  notify:    webhook={}",
            self.notify.webhook_url.as_deref().unwrap_or("(log only)")
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_u16("PORT", 3400),
            cors_origin: env_or("CORS_ORIGIN", "*"),
        }
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("PG_HOST", "localhost"),
            port: env_u16("PG_PORT", 5432),
            database: env_or("PG_DATABASE", "casewatch"),
            username: env_opt("PG_USERNAME"),
            password: env_opt("PG_PASSWORD"),
            max_connections: env_u32("PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn connection_string(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}",
            user, pass, self.host, self.port, self.database
        )
    }

    /// When not configured, the server falls back to the in-memory store.
    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub tick_interval_secs: u64,
    pub batch_size: u32,
}

impl SchedulerConfig {
    fn from_env() -> Self {
        Self {
            tick_interval_secs: env_u64("SLA_TICK_INTERVAL_SECS", 5),
            batch_size: env_u32("SLA_TICK_BATCH_SIZE", 200),
        }
    }
}

// ── Notifications ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Breach webhook endpoint. When unset, breaches go to the log channel.
    pub webhook_url: Option<String>,
    /// Optional minijinja template for the webhook request body.
    pub webhook_template: Option<String>,
}

impl NotifyConfig {
    fn from_env() -> Self {
        Self {
            webhook_url: env_opt("SLA_BREACH_WEBHOOK_URL"),
            webhook_template: env_opt("SLA_BREACH_WEBHOOK_TEMPLATE"),
        }
    }
}
