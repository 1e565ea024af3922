use hostel_core::fees::FeeSchedule;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
    pub paystack: PaystackConfig,
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub outbox: OutboxConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    pub platform_fee: Decimal,
    pub gateway_rate: Decimal,
    pub gateway_fixed_fee: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_pending_ttl")]
    pub pending_payment_ttl_minutes: i64,
}

fn default_currency() -> String {
    "GHS".to_string()
}

fn default_pending_ttl() -> i64 {
    30
}

impl BusinessRules {
    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            platform_fee: self.platform_fee,
            gateway_rate: self.gateway_rate,
            gateway_fixed_fee: self.gateway_fixed_fee,
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

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaystackConfig {
    pub secret_key: String,
    #[serde(default = "default_paystack_url")]
    pub base_url: String,
    pub callback_url: Option<String>,
}

fn default_paystack_url() -> String {
    "https://api.paystack.co".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutboxConfig {
    pub poll_interval_seconds: u64,
    pub batch_size: i64,
    pub max_attempts: i32,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 10,
            batch_size: 20,
            max_attempts: 8,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests: i64,
    pub window_seconds: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 120,
            window_seconds: 60,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `HOSTEL__PAYSTACK__SECRET_KEY=sk_live_...`
            .add_source(config::Environment::with_prefix("HOSTEL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
