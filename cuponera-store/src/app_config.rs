use cuponera_catalog::{SaleWindowPolicy, DEFAULT_MAX_UNCAPPED_QUANTITY};
use cuponera_core::IssuanceRules;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default)]
    pub sale_window: SaleWindowPolicy,
    #[serde(default = "default_max_uncapped_quantity")]
    pub max_uncapped_quantity: u32,
    #[serde(default = "default_code_attempts")]
    pub code_attempts: u32,
    /// Requests per client IP per minute, across every route. 0 disables the limiter.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_max_uncapped_quantity() -> u32 { DEFAULT_MAX_UNCAPPED_QUANTITY }
fn default_code_attempts() -> u32 { 5 }
fn default_rate_limit() -> i64 { 30 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            sale_window: SaleWindowPolicy::default(),
            max_uncapped_quantity: default_max_uncapped_quantity(),
            code_attempts: default_code_attempts(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

impl BusinessRules {
    pub fn issuance_rules(&self) -> IssuanceRules {
        IssuanceRules {
            sale_window: self.sale_window,
            code_attempts: self.code_attempts.max(1),
            max_uncapped_quantity: self.max_uncapped_quantity.max(1),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_topic() -> String { "cuponera.coupons".to_string() }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `CUPONERA__BUSINESS_RULES__SALE_WINDOW=relaxed`
            .add_source(config::Environment::with_prefix("CUPONERA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
