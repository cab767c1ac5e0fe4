//! Builder analytics: merges quest listings, completion records and on-chain
//! escrow balances into a dashboard snapshot for one creator.
//!
//! Aggregation is best-effort. A quest whose completions or deposit cannot
//! be fetched is still counted with what is available, and a failed listing
//! falls back to the last one seen for that creator.

pub mod cache;
pub mod error;
pub mod escrow;
pub mod snapshot;
pub mod source;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures_util::{StreamExt, stream};
use tracing::{info, warn};

use trustquests_types::models::Quest;
use trustquests_types::time::start_of_day;

pub use cache::QuestCache;
pub use error::AnalyticsError;
pub use escrow::EscrowReader;
pub use snapshot::{AnalyticsSnapshot, Deposit, DepositSource, QuestData};
pub use source::{QuestSource, RestQuestSource};

#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Quests created, and records completed (or started, if not yet
    /// completed), before this day are ignored.
    pub cutoff: NaiveDate,
    pub window_days: u32,
    /// Completion records fetched per quest.
    pub page_size: u32,
    /// Quests loaded concurrently.
    pub concurrency: usize,
    pub top_n: usize,
    /// Creators whose last quest listing is kept.
    pub cache_capacity: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            cutoff: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            window_days: 14,
            page_size: 1000,
            concurrency: 8,
            top_n: 10,
            cache_capacity: cache::DEFAULT_CACHE_CAPACITY,
        }
    }
}

pub struct Aggregator {
    source: Arc<dyn QuestSource>,
    escrow: Option<Arc<dyn EscrowReader>>,
    cache: QuestCache,
    config: AnalyticsConfig,
}

impl Aggregator {
    pub fn new(source: Arc<dyn QuestSource>, config: AnalyticsConfig) -> Self {
        Self {
            source,
            escrow: None,
            cache: QuestCache::with_capacity(config.cache_capacity),
            config,
        }
    }

    pub fn with_escrow(mut self, escrow: Arc<dyn EscrowReader>) -> Self {
        self.escrow = Some(escrow);
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Recompute the dashboard for `creator` as of `now`.
    pub async fn snapshot(&self, creator: &str, now: DateTime<Utc>) -> AnalyticsSnapshot {
        let creator = creator.trim().to_lowercase();
        let cutoff = start_of_day(self.config.cutoff);

        let quests: Vec<Quest> = self
            .load_quests(&creator)
            .await
            .into_iter()
            .filter(|q| q.created_at >= cutoff)
            .collect();
        let quest_count = quests.len();

        let data: Vec<QuestData> = stream::iter(quests)
            .map(|quest| self.load_quest(quest))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let snapshot = snapshot::build_snapshot(&creator, &self.config, now, data);
        info!(
            "Analytics for {}: {} quests, {} started, {} completed",
            creator, quest_count, snapshot.totals.started, snapshot.totals.completed
        );
        snapshot
    }

    async fn load_quests(&self, creator: &str) -> Vec<Quest> {
        let cached = self.cache.get(creator).await;
        match self.source.quests_by_creator(creator).await {
            Ok(fresh) => {
                self.cache.store(creator, &fresh).await;
                cache::merge_quests(fresh, cached)
            }
            Err(e) => {
                warn!(
                    "Quest listing for {} failed, using {} cached quests: {}",
                    creator,
                    cached.len(),
                    e
                );
                cached
            }
        }
    }

    async fn load_quest(&self, quest: Quest) -> QuestData {
        let completions = match self
            .source
            .completions(&quest.id, self.config.page_size, 0)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!("Completions for quest {} unavailable: {}", quest.id, e);
                Vec::new()
            }
        };
        let deposit = self.deposit_for(&quest).await;

        QuestData {
            quest,
            completions,
            deposit,
        }
    }

    async fn deposit_for(&self, quest: &Quest) -> Deposit {
        let (Some(escrow), Some(escrow_id)) = (&self.escrow, quest.escrow_id) else {
            return Deposit::estimate(quest);
        };
        match escrow.quest_deposit(escrow_id).await {
            Ok(amount) => Deposit {
                amount,
                source: DepositSource::Escrow,
            },
            Err(e) => {
                warn!("Escrow read for quest {} failed, estimating: {}", quest.id, e);
                Deposit::estimate(quest)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use trustquests_types::models::{CompletionStatus, QuestCompletion, QuestStatus};

    const CREATOR: &str = "0xc0ffee0000000000000000000000000000000001";

    struct FakeSource {
        quests: Vec<Quest>,
        completions: HashMap<String, Vec<QuestCompletion>>,
        listing_down: AtomicBool,
        completion_calls: AtomicUsize,
    }

    #[async_trait]
    impl QuestSource for FakeSource {
        async fn quests_by_creator(&self, creator: &str) -> Result<Vec<Quest>, AnalyticsError> {
            if self.listing_down.load(Ordering::SeqCst) {
                return Err(AnalyticsError::Source("down".into()));
            }
            Ok(self
                .quests
                .iter()
                .filter(|q| q.creator_address == creator)
                .cloned()
                .collect())
        }

        async fn completions(
            &self,
            quest_id: &str,
            limit: u32,
            _offset: u32,
        ) -> Result<Vec<QuestCompletion>, AnalyticsError> {
            assert_eq!(limit, 1000);
            self.completion_calls.fetch_add(1, Ordering::SeqCst);
            match self.completions.get(quest_id) {
                Some(records) => Ok(records.clone()),
                None => Err(AnalyticsError::Source(format!("no quest {}", quest_id))),
            }
        }
    }

    struct FakeEscrow;

    #[async_trait]
    impl EscrowReader for FakeEscrow {
        async fn quest_deposit(&self, escrow_id: u64) -> Result<f64, AnalyticsError> {
            match escrow_id {
                1 => Ok(500.0),
                _ => Err(AnalyticsError::Source("execution reverted".into())),
            }
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn quest(id: &str, created: DateTime<Utc>, escrow_id: Option<u64>) -> Quest {
        Quest {
            id: id.to_string(),
            space_id: None,
            creator_address: CREATOR.to_string(),
            title: id.to_string(),
            description: None,
            reward_amount: 2.0,
            max_completions: 50,
            status: QuestStatus::Active,
            escrow_id,
            created_at: created,
            updated_at: created,
        }
    }

    fn completion(quest_id: &str, user: &str, when: DateTime<Utc>) -> QuestCompletion {
        QuestCompletion {
            id: format!("{}:{}", quest_id, user),
            quest_id: quest_id.to_string(),
            user_address: user.to_string(),
            status: CompletionStatus::Completed,
            reward_amount: 2.0,
            started_at: when,
            completed_at: Some(when),
        }
    }

    fn source() -> FakeSource {
        let quests = vec![
            quest("funded", at(2025, 2, 1), Some(1)),
            quest("reverted", at(2025, 2, 2), Some(2)),
            quest("offchain", at(2025, 2, 3), None),
            quest("ancient", at(2024, 6, 1), None),
        ];
        let mut completions = HashMap::new();
        completions.insert(
            "funded".to_string(),
            vec![completion("funded", "0xa1", at(2025, 3, 1))],
        );
        completions.insert(
            "reverted".to_string(),
            vec![completion("reverted", "0xa2", at(2025, 3, 2))],
        );
        // "offchain" has no completions endpoint; its fetch fails
        FakeSource {
            quests,
            completions,
            listing_down: AtomicBool::new(false),
            completion_calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn aggregates_with_fallbacks() {
        let source = Arc::new(source());
        let aggregator = Aggregator::new(source.clone(), AnalyticsConfig::default())
            .with_escrow(Arc::new(FakeEscrow));

        let snapshot = aggregator.snapshot(&CREATOR.to_uppercase().replace("0X", "0x"), at(2025, 3, 5)).await;

        assert_eq!(snapshot.creator, CREATOR);
        // "ancient" predates the cutoff and is never fetched
        assert_eq!(snapshot.status.total, 3);
        assert_eq!(source.completion_calls.load(Ordering::SeqCst), 3);
        assert_eq!(snapshot.totals.completed, 2);

        let deposit = |id: &str| snapshot.quests.iter().find(|q| q.id == id).unwrap().deposit;
        assert_eq!(deposit("funded").source, DepositSource::Escrow);
        assert_eq!(deposit("funded").amount, 500.0);
        assert_eq!(deposit("reverted").source, DepositSource::Estimate);
        assert_eq!(deposit("reverted").amount, 100.0);
        assert_eq!(deposit("offchain").source, DepositSource::Estimate);
        assert_eq!(snapshot.totals.total_deposited, 700.0);
    }

    #[tokio::test]
    async fn listing_outage_uses_cached_quests() {
        let source = Arc::new(source());
        let aggregator = Aggregator::new(source.clone(), AnalyticsConfig::default());

        let first = aggregator.snapshot(CREATOR, at(2025, 3, 5)).await;
        source.listing_down.store(true, Ordering::SeqCst);
        let second = aggregator.snapshot(CREATOR, at(2025, 3, 5)).await;

        assert_eq!(first.status.total, 3);
        assert_eq!(second.status.total, 3);
        assert_eq!(second.totals.completed, first.totals.completed);
    }

    #[tokio::test]
    async fn unknown_creator_yields_empty_snapshot() {
        let aggregator = Aggregator::new(Arc::new(source()), AnalyticsConfig::default());
        let snapshot = aggregator
            .snapshot("0x0000000000000000000000000000000000000000", at(2025, 3, 5))
            .await;

        assert_eq!(snapshot.status.total, 0);
        assert_eq!(snapshot.totals.completion_rate, 0.0);
        assert_eq!(snapshot.time_series.len(), 14);
        assert!(snapshot.top_participants.is_empty());
    }

    #[tokio::test]
    async fn unknown_creators_do_not_grow_the_cache() {
        let config = AnalyticsConfig {
            cache_capacity: 4,
            ..AnalyticsConfig::default()
        };
        let aggregator = Aggregator::new(Arc::new(source()), config);

        for i in 0..200u32 {
            let creator = format!("0x{:040x}", i + 1);
            aggregator.snapshot(&creator, at(2025, 3, 5)).await;
        }
        assert!(aggregator.cache.is_empty().await);

        aggregator.snapshot(CREATOR, at(2025, 3, 5)).await;
        assert_eq!(aggregator.cache.len().await, 1);
    }
}
