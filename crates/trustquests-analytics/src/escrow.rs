use async_trait::async_trait;

use trustquests_chain::abi::format_units;
use trustquests_chain::{TOKEN_DECIMALS, TrustChain};

use crate::error::AnalyticsError;

/// On-chain escrow balance per quest, in whole tokens.
#[async_trait]
pub trait EscrowReader: Send + Sync {
    async fn quest_deposit(&self, escrow_id: u64) -> Result<f64, AnalyticsError>;
}

#[async_trait]
impl EscrowReader for TrustChain {
    async fn quest_deposit(&self, escrow_id: u64) -> Result<f64, AnalyticsError> {
        let raw = TrustChain::quest_deposit(self, escrow_id).await?;
        Ok(format_units(raw, TOKEN_DECIMALS))
    }
}
