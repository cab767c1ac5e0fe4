use std::sync::Arc;

use tracing::error;

use trustquests_analytics::Aggregator;
use trustquests_chain::TrustChain;
use trustquests_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    /// `None` when no RPC endpoint is configured.
    pub chain: Option<Arc<TrustChain>>,
    pub analytics: Aggregator,
}

impl AppStateInner {
    pub fn chain(&self) -> Result<&TrustChain, ApiError> {
        self.chain.as_deref().ok_or(ApiError::ChainUnavailable)
    }
}

/// Run a database call on the blocking pool.
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
}
