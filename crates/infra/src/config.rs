//! Application configuration.
//!
//! Loaded from an optional TOML file (`config/stockline.toml` by default) and
//! overridden by `STOCKLINE__<SECTION>__<KEY>` environment variables, e.g.
//! `STOCKLINE__DATABASE__URL` or `STOCKLINE__HTTP__BIND`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use stockline_observability::LogSettings;
use stockline_workforce::OvertimePolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/stockline.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub notifications: NotificationConfig,
    pub overtime: OvertimePolicy,
    pub jobs: JobsConfig,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret".to_string(),
        }
    }
}

/// Postgres settings. Without a `url` the in-memory adapters are used.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Duplicate-suppression window for low-stock warnings.
    pub low_stock_window_minutes: i64,
    /// Roles notified about low stock.
    pub low_stock_roles: Vec<String>,
    /// Roles receiving overtime summaries.
    pub workforce_roles: Vec<String>,
    /// Expiry applied to system notifications; `None` keeps them forever.
    pub default_ttl_hours: Option<i64>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            low_stock_window_minutes: stockline_inventory::DEFAULT_DEDUP_WINDOW_MINUTES,
            low_stock_roles: vec!["admin".to_string(), "warehouse".to_string()],
            workforce_roles: vec!["admin".to_string(), "supervisor".to_string()],
            default_ttl_hours: None,
        }
    }
}

/// Cron expressions (`sec min hour day-of-month month day-of-week`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub enabled: bool,
    pub absence_sweep: String,
    pub overtime_sweep: String,
    pub low_stock_scan: String,
    pub purge_expired: String,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            absence_sweep: "0 5 0 * * *".to_string(),
            overtime_sweep: "0 30 0 * * Mon".to_string(),
            low_stock_scan: "0 */15 * * * *".to_string(),
            purge_expired: "0 0 * * * *".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("STOCKLINE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("notifications.low_stock_roles")
                    .with_list_parse_key("notifications.workforce_roles")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: AppConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message("auth.jwt_secret cannot be empty".to_string()));
        }
        if self.notifications.low_stock_window_minutes < 0 {
            return Err(ConfigError::Message(
                "notifications.low_stock_window_minutes cannot be negative".to_string(),
            ));
        }
        if self.overtime.standard_shift_hours <= 0.0 || self.overtime.alert_hours_per_day < 0.0 {
            return Err(ConfigError::Message("overtime policy hours must be positive".to_string()));
        }
        Ok(())
    }
}
