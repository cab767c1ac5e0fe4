use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;

use trustquests_analytics::AnalyticsConfig;
use trustquests_chain::{ChainConfig, DEFAULT_GAS_LIMIT};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// `None` when `RPC_URL` is unset.
    pub chain: Option<ChainConfig>,
    pub analytics: AnalyticsConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Unset and blank are the same thing
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = var("TQ_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("TQ_JWT_SECRET is unset or still a placeholder");
        }

        let host = var("TQ_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("TQ_PORT")
            .unwrap_or_else(|| "3001".into())
            .parse()
            .context("TQ_PORT must be a port number")?;
        let db_path: PathBuf = var("TQ_DB_PATH")
            .unwrap_or_else(|| "trustquests.db".into())
            .into();

        let chain = match var("RPC_URL") {
            Some(rpc_url) => Some(ChainConfig {
                chain_id: var("CHAIN_ID")
                    .map(|v| v.parse())
                    .transpose()
                    .context("CHAIN_ID must be an integer")?,
                token_address: var("TRUST_TOKEN_ADDRESS"),
                escrow_address: var("ESCROW_ADDRESS"),
                revenue_wallet: var("REVENUE_WALLET_ADDRESS"),
                private_key: var("PRIVATE_KEY"),
                gas_limit: var("TQ_GAS_LIMIT")
                    .map(|v| v.parse())
                    .transpose()
                    .context("TQ_GAS_LIMIT must be an integer")?
                    .unwrap_or(DEFAULT_GAS_LIMIT),
                request_timeout: Duration::from_secs(15),
                rpc_url,
            }),
            None => None,
        };

        let mut analytics = AnalyticsConfig::default();
        if let Some(cutoff) = var("TQ_ANALYTICS_CUTOFF") {
            analytics.cutoff = NaiveDate::parse_from_str(&cutoff, "%Y-%m-%d")
                .context("TQ_ANALYTICS_CUTOFF must be YYYY-MM-DD")?;
        }
        if let Some(cap) = var("TQ_ANALYTICS_CONCURRENCY") {
            analytics.concurrency = cap
                .parse()
                .context("TQ_ANALYTICS_CONCURRENCY must be an integer")?;
        }

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
            chain,
            analytics,
        })
    }
}
