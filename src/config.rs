use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub spawn: SpawnConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Bot identities served by this process
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Path to the JSON catalog file
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Seconds between automatic spawns in each enabled chat
    pub interval_secs: u64,
    /// How long a published spawn stays claimable
    pub claim_window_secs: u64,
    /// How often expired spawns are swept
    pub sweep_interval_secs: u64,
    /// Relative draw weights for tiers 1..=6
    pub tier_weights: [u32; 6],
    /// Independent chance (0..1) of rolling an S-tier spawn
    pub s_tier_chance: f64,
    /// Command prefix shown in spawn captions
    pub claim_command: String,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            claim_window_secs: 300,
            sweep_interval_secs: 30,
            tier_weights: [40, 28, 17, 9, 4, 2],
            s_tier_chance: 0.005,
            claim_command: "!claim".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Trade prices kept per collectible
    pub max_recent_trades: usize,
    /// Auction length when the caller does not pick one
    pub default_auction_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            max_recent_trades: 5,
            default_auction_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Which document store to use
    #[serde(default)]
    pub backend: StoreBackend,
    /// PostgreSQL connection URL (postgres backend only)
    #[serde(default)]
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily rolling log files
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TenantConfig {
    /// Bot identity
    pub id: String,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default)]
    pub moderators: Vec<String>,
    /// Chats with spawning enabled at startup
    #[serde(default)]
    pub chats: Vec<String>,
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("catalog.path", "data/catalog.json")?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                File::from(config_dir.join(
                    std::env::var("CARDSPAWN_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // CARDSPAWN_SPAWN__INTERVAL_SECS, CARDSPAWN_DATABASE__URL, ...
            .add_source(
                Environment::with_prefix("CARDSPAWN")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.spawn.interval_secs == 0 {
            errors.push("spawn.interval_secs must be positive".to_string());
        }
        if self.spawn.claim_window_secs == 0 {
            errors.push("spawn.claim_window_secs must be positive".to_string());
        }
        if self.spawn.sweep_interval_secs == 0 {
            errors.push("spawn.sweep_interval_secs must be positive".to_string());
        }
        if self.spawn.tier_weights.iter().all(|w| *w == 0) {
            errors.push("spawn.tier_weights must contain a non-zero weight".to_string());
        }
        if !(0.0..=1.0).contains(&self.spawn.s_tier_chance) {
            errors.push("spawn.s_tier_chance must be between 0 and 1".to_string());
        }
        if self.market.max_recent_trades == 0 {
            errors.push("market.max_recent_trades must be positive".to_string());
        }
        if self.database.backend == StoreBackend::Postgres && self.database.url.is_empty() {
            errors.push("database.url is required for the postgres backend".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for tenant in &self.tenants {
            if tenant.id.trim().is_empty() {
                errors.push("tenant id must not be empty".to_string());
            } else if !seen.insert(tenant.id.as_str()) {
                errors.push(format!("duplicate tenant id: {}", tenant.id));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            catalog: CatalogConfig {
                path: PathBuf::from("data/catalog.json"),
            },
            spawn: SpawnConfig::default(),
            market: MarketConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            tenants: vec![TenantConfig {
                id: "bot-a".into(),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_defaults_validate() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_logging_default_level_is_info() {
        let logging = LoggingConfig::default();
        assert_eq!(logging.level, "info");
        assert!(!logging.json);
        assert!(logging.dir.is_none());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut cfg = base_config();
        cfg.spawn.tier_weights = [0; 6];
        cfg.spawn.s_tier_chance = 1.5;
        cfg.database.backend = StoreBackend::Postgres;
        cfg.tenants.push(TenantConfig {
            id: "bot-a".into(),
            ..Default::default()
        });

        let errors = cfg.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("duplicate tenant id")));
    }
}
