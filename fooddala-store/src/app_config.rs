use fooddala_catalog::BillingConfig;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub geo: GeoConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub orders: OrdersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,
}

fn default_api_url() -> String { "http://localhost:5000/api".into() }
fn default_request_timeout() -> u64 { 15 }

impl Default for ApiConfig {
    fn default() -> Self {
        Self { url: default_api_url(), timeout_seconds: default_request_timeout() }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// JSON file holding every persisted key
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

fn default_storage_path() -> PathBuf { PathBuf::from(".fooddala/local_storage.json") }

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: default_storage_path() }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMode {
    /// Confirm after a fixed delay; no backend involved
    #[default]
    Simulated,
    /// Ask the backend's verify-payment endpoint
    Backend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    #[serde(default = "default_upi_id")]
    pub upi_id: String,
    #[serde(default = "default_merchant_name")]
    pub merchant_name: String,
    #[serde(default = "default_qr_validity")]
    pub qr_validity_seconds: u32,
    #[serde(default)]
    pub verification: VerificationMode,
    #[serde(default = "default_simulated_delay")]
    pub simulated_delay_ms: u64,
}

fn default_upi_id() -> String { "7760554350@axl".into() }
fn default_merchant_name() -> String { "Fooddala".into() }
fn default_qr_validity() -> u32 { 300 }
fn default_simulated_delay() -> u64 { 2000 }

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            upi_id: default_upi_id(),
            merchant_name: default_merchant_name(),
            qr_validity_seconds: default_qr_validity(),
            verification: VerificationMode::default(),
            simulated_delay_ms: default_simulated_delay(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeoConfig {
    #[serde(default = "default_nominatim_url")]
    pub nominatim_url: String,
    /// Upper bound on a location lookup so the UI never waits forever
    #[serde(default = "default_geo_timeout")]
    pub timeout_seconds: u64,
}

fn default_nominatim_url() -> String { "https://nominatim.openstreetmap.org".into() }
fn default_geo_timeout() -> u64 { 10 }

impl Default for GeoConfig {
    fn default() -> Self {
        Self { nominatim_url: default_nominatim_url(), timeout_seconds: default_geo_timeout() }
    }
}

impl GeoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_session_ttl")]
    pub ttl_days: i64,
}

fn default_session_ttl() -> i64 { 7 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_days: default_session_ttl() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrdersConfig {
    /// How often portals re-fetch their order lists
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

fn default_poll_interval() -> u64 { 10 }

impl Default for OrdersConfig {
    fn default() -> Self {
        Self { poll_interval_seconds: default_poll_interval() }
    }
}

impl OrdersConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(1))
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Every key has a default, so even the base file is optional
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `FOODDALA_API__URL=https://api.fooddala.in/api`
            .add_source(config::Environment::with_prefix("FOODDALA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
