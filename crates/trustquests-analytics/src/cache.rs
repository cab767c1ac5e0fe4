use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use trustquests_types::models::Quest;

/// Creators kept when no capacity is given.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Last successful non-empty quest listing per creator. Used when the quest
/// source is unreachable, and merged into fresh listings so quests that
/// briefly drop out of the source are still counted.
///
/// Holds at most `capacity` creators; storing a new creator into a full
/// cache evicts the one stored longest ago.
pub struct QuestCache {
    capacity: usize,
    inner: RwLock<Listings>,
}

#[derive(Default)]
struct Listings {
    entries: HashMap<String, Entry>,
    tick: u64,
}

struct Entry {
    quests: Vec<Quest>,
    stored: u64,
}

impl Default for QuestCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl QuestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(Listings::default()),
        }
    }

    pub async fn get(&self, creator: &str) -> Vec<Quest> {
        self.inner
            .read()
            .await
            .entries
            .get(creator)
            .map(|e| e.quests.clone())
            .unwrap_or_default()
    }

    /// Empty listings are not stored.
    pub async fn store(&self, creator: &str, quests: &[Quest]) {
        if quests.is_empty() {
            return;
        }

        let mut inner = self.inner.write().await;
        inner.tick += 1;
        let stored = inner.tick;

        if !inner.entries.contains_key(creator) && inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.stored)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
            }
        }

        inner.entries.insert(
            creator.to_string(),
            Entry {
                quests: quests.to_vec(),
                stored,
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Union of `fresh` and `cached` keyed by quest id. Fresh records win and
/// keep their order; cached-only records follow.
pub fn merge_quests(fresh: Vec<Quest>, cached: Vec<Quest>) -> Vec<Quest> {
    let mut seen = HashSet::new();
    fresh
        .into_iter()
        .chain(cached)
        .filter(|q| seen.insert(q.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use trustquests_types::models::QuestStatus;

    fn quest(id: &str, title: &str) -> Quest {
        Quest {
            id: id.to_string(),
            space_id: None,
            creator_address: "0xc0ffee0000000000000000000000000000000001".to_string(),
            title: title.to_string(),
            description: None,
            reward_amount: 1.0,
            max_completions: 10,
            status: QuestStatus::Active,
            escrow_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn merge_prefers_fresh_records() {
        let merged = merge_quests(
            vec![quest("a", "fresh a"), quest("b", "fresh b")],
            vec![quest("b", "stale b"), quest("c", "stale c")],
        );
        let titles: Vec<_> = merged.iter().map(|q| q.title.as_str()).collect();
        assert_eq!(titles, vec!["fresh a", "fresh b", "stale c"]);
    }

    #[tokio::test]
    async fn cache_is_per_creator() {
        let cache = QuestCache::new();
        cache.store("0xaa", &[quest("a", "a")]).await;

        assert_eq!(cache.get("0xaa").await.len(), 1);
        assert!(cache.get("0xbb").await.is_empty());
    }

    #[tokio::test]
    async fn empty_listings_are_not_cached() {
        let cache = QuestCache::new();
        for i in 0..50 {
            cache.store(&format!("0x{:02x}", i), &[]).await;
        }
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn full_cache_evicts_oldest_creator() {
        let cache = QuestCache::with_capacity(2);
        cache.store("0xaa", &[quest("a", "a")]).await;
        cache.store("0xbb", &[quest("b", "b")]).await;
        // Refreshing a known creator never evicts
        cache.store("0xaa", &[quest("a", "a2")]).await;
        assert_eq!(cache.len().await, 2);

        cache.store("0xcc", &[quest("c", "c")]).await;
        assert_eq!(cache.len().await, 2);
        assert!(cache.get("0xbb").await.is_empty());
        assert_eq!(cache.get("0xaa").await[0].title, "a2");
        assert_eq!(cache.get("0xcc").await.len(), 1);
    }
}
