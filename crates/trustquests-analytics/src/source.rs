use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use trustquests_types::models::{Quest, QuestCompletion};

use crate::error::AnalyticsError;

/// Where quest listings and completion records come from.
#[async_trait]
pub trait QuestSource: Send + Sync {
    async fn quests_by_creator(&self, creator: &str) -> Result<Vec<Quest>, AnalyticsError>;

    /// One page of completion records for a quest, oldest first.
    async fn completions(
        &self,
        quest_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<QuestCompletion>, AnalyticsError>;
}

/// Reads quests and completions from a TrustQuests REST API.
pub struct RestQuestSource {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RestQuestSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("trustquests-analytics/0.3")
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, AnalyticsError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let mut request = self.http.get(&url).query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AnalyticsError::Source(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl QuestSource for RestQuestSource {
    async fn quests_by_creator(&self, creator: &str) -> Result<Vec<Quest>, AnalyticsError> {
        self.get_json("/api/quests", &[("creator", creator.to_string())])
            .await
    }

    async fn completions(
        &self,
        quest_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<QuestCompletion>, AnalyticsError> {
        self.get_json(
            &format!("/api/quests/{}/completions", quest_id),
            &[("limit", limit.to_string()), ("offset", offset.to_string())],
        )
        .await
    }
}
