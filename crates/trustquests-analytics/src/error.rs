use trustquests_chain::ChainError;

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("quest source request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("quest source error: {0}")]
    Source(String),

    #[error("escrow read failed: {0}")]
    Escrow(#[from] ChainError),
}
