use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub telegram: TelegramConfig,
    pub marketplace: MarketplaceConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_url: String,
    /// Long-poll timeout passed to getUpdates
    pub poll_timeout_secs: u64,
    /// Back-off after a failed poll
    pub poll_retry_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketplaceConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub activity_page_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    pub recent_activity_limit: usize,
    /// Wallets checked per message; the rest are reported as skipped
    pub max_batch: usize,
    pub batch_delay_ms: u64,
    /// Upper bound on one wallet's fan-out
    pub report_timeout_ms: u64,
}

/// The unprefixed variables deployments already set
#[derive(Debug, Default, Clone)]
pub struct BareEnv {
    pub telegram_bot_token: Option<String>,
    pub magic_eden_api_key: Option<String>,
    pub port: Option<String>,
}

impl BareEnv {
    pub fn from_process() -> Self {
        Self {
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            magic_eden_api_key: std::env::var("MAGIC_EDEN_API_KEY").ok(),
            port: std::env::var("PORT").ok(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(BareEnv::from_process())
    }

    pub fn load_with(bare: BareEnv) -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("telegram.bot_token", "")?
            .set_default("telegram.api_url", "https://api.telegram.org")?
            .set_default("telegram.poll_timeout_secs", 30)?
            .set_default("telegram.poll_retry_secs", 5)?
            .set_default("marketplace.api_key", "")?
            .set_default("marketplace.base_url", "https://api-mainnet.magiceden.dev/v2")?
            .set_default("marketplace.request_timeout_secs", 15)?
            .set_default("marketplace.activity_page_size", 20)?
            .set_default("report.recent_activity_limit", 5)?
            .set_default("report.max_batch", 5)?
            .set_default("report.batch_delay_ms", 500)?
            .set_default("report.report_timeout_ms", 60_000)?
            // Load from config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // SCOUT__MARKETPLACE__API_KEY etc.
            .add_source(
                Environment::with_prefix("SCOUT")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("telegram.bot_token", bare.telegram_bot_token)?
            .set_override_option("marketplace.api_key", bare.magic_eden_api_key)?
            .set_override_option("server.port", bare.port)?
            .build()?;

        config.try_deserialize()
    }

    /// Both secrets are required; the process must not start without them.
    pub fn validate(&self) -> AppResult<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(AppError::Config(
                "TELEGRAM_BOT_TOKEN (or SCOUT__TELEGRAM__BOT_TOKEN) is not set".to_string(),
            ));
        }
        if self.marketplace.api_key.trim().is_empty() {
            return Err(AppError::Config(
                "MAGIC_EDEN_API_KEY (or SCOUT__MARKETPLACE__API_KEY) is not set".to_string(),
            ));
        }
        if self.report.max_batch == 0 {
            return Err(AppError::Config("report.max_batch must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// `abcd...wxyz` preview of a secret for startup logs
pub fn preview_secret(secret: &str) -> String {
    if secret.is_empty() {
        "EMPTY".to_string()
    } else if secret.len() > 8 && secret.is_ascii() {
        format!("{}...{}", &secret[..4], &secret[secret.len() - 4..])
    } else {
        "***".to_string()
    }
}
