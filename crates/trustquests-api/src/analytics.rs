use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;

use trustquests_analytics::{AnalyticsError, AnalyticsSnapshot, QuestSource};
use trustquests_db::{Database, QuestFilter};
use trustquests_types::api::Claims;
use trustquests_types::models::{Quest, QuestCompletion};
use trustquests_types::normalize_address;

use crate::error::ApiError;
use crate::state::AppState;

/// Serves the aggregator straight from the local database.
pub struct DbQuestSource {
    db: Arc<Database>,
}

impl DbQuestSource {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn run<F, T>(&self, f: F) -> Result<T, AnalyticsError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| AnalyticsError::Source(e.to_string()))?
            .map_err(|e| AnalyticsError::Source(format!("{:#}", e)))
    }
}

#[async_trait]
impl QuestSource for DbQuestSource {
    async fn quests_by_creator(&self, creator: &str) -> Result<Vec<Quest>, AnalyticsError> {
        let filter = QuestFilter {
            creator: Some(creator.to_string()),
            ..QuestFilter::default()
        };
        self.run(move |db| db.list_quests(&filter)).await
    }

    async fn completions(
        &self,
        quest_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<QuestCompletion>, AnalyticsError> {
        let quest_id = quest_id.to_string();
        self.run(move |db| db.list_completions(&quest_id, limit, offset))
            .await
    }
}

pub async fn creator_snapshot(
    State(state): State<AppState>,
    Path(creator): Path<String>,
) -> Result<Json<AnalyticsSnapshot>, ApiError> {
    let creator = normalize_address(&creator)?;
    Ok(Json(state.analytics.snapshot(&creator, Utc::now()).await))
}

/// Dashboard for the authenticated wallet.
pub async fn my_snapshot(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Json<AnalyticsSnapshot> {
    Json(state.analytics.snapshot(&claims.sub, Utc::now()).await)
}
