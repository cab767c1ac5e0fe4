use trustquests_types::AddressError;

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid private key")]
    InvalidKey,

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        ChainError::Network(e.to_string())
    }
}
