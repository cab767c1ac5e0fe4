use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use trustquests_types::models::{
    CompletionStatus, QuestCompletion, QuestStatus, TransactionKind, TrustTransaction,
};

use super::quests::query_quest;
use super::{OptionalExt, lower, new_id, now};
use crate::error::StoreError;
use crate::models::{
    COMPLETION_COLUMNS, TRANSACTION_COLUMNS, completion_from_row, transaction_from_row,
};
use crate::Database;

/// Upper bound for a single page of completions.
pub const MAX_COMPLETIONS_PAGE: u32 = 1000;

impl Database {
    /// Record that `user` started `quest_id`. Starting twice returns the
    /// existing record.
    pub fn start_quest(&self, quest_id: &str, user: &str) -> Result<QuestCompletion> {
        let user = lower(user);
        self.with_conn(|conn| {
            let quest = query_quest(conn, quest_id)?.ok_or(StoreError::NotFound("quest"))?;
            if let Some(existing) = query_completion(conn, quest_id, &user)? {
                return Ok(existing);
            }
            if quest.status != QuestStatus::Active {
                return Err(StoreError::QuestNotActive.into());
            }

            conn.execute(
                "INSERT INTO quest_completions (id, quest_id, user_address, status, started_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![new_id(), quest_id, &user, CompletionStatus::Started.as_str(), now()],
            )?;

            query_completion(conn, quest_id, &user)?
                .ok_or_else(|| StoreError::NotFound("completion").into())
        })
    }

    /// Mark a started quest completed, credit the quest reward and append a
    /// reward ledger entry. Completing twice returns the existing record
    /// without paying again.
    pub fn complete_quest(&self, quest_id: &str, user: &str) -> Result<QuestCompletion> {
        let user = lower(user);
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let quest = query_quest(&tx, quest_id)?.ok_or(StoreError::NotFound("quest"))?;
            let record = query_completion(&tx, quest_id, &user)?.ok_or(StoreError::NotStarted)?;
            if record.is_completed() {
                return Ok(record);
            }
            if quest.status != QuestStatus::Active {
                return Err(StoreError::QuestNotActive.into());
            }

            if quest.max_completions > 0 {
                let completed: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM quest_completions WHERE quest_id = ?1 AND status = ?2",
                    (quest_id, CompletionStatus::Completed.as_str()),
                    |r| r.get(0),
                )?;
                if completed >= i64::from(quest.max_completions) {
                    return Err(StoreError::QuestFull.into());
                }
            }

            let ts = now();
            tx.execute(
                "UPDATE quest_completions
                 SET status = ?2, reward_amount = ?3, completed_at = ?4
                 WHERE id = ?1",
                rusqlite::params![
                    &record.id,
                    CompletionStatus::Completed.as_str(),
                    quest.reward_amount,
                    &ts,
                ],
            )?;

            if quest.reward_amount > 0.0 {
                insert_transaction(
                    &tx,
                    &user,
                    quest.reward_amount,
                    TransactionKind::Reward,
                    Some(quest_id),
                    None,
                )?;
            }

            let completed = query_completion(&tx, quest_id, &user)?
                .ok_or(StoreError::NotFound("completion"))?;
            tx.commit()?;

            info!(
                "Quest {} completed by {} (reward {})",
                quest_id, user, quest.reward_amount
            );
            Ok(completed)
        })
    }

    /// Oldest first. `limit` is capped at [`MAX_COMPLETIONS_PAGE`].
    pub fn list_completions(
        &self,
        quest_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<QuestCompletion>> {
        let limit = limit.min(MAX_COMPLETIONS_PAGE);
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {COMPLETION_COLUMNS} FROM quest_completions
                 WHERE quest_id = ?1
                 ORDER BY started_at ASC, id ASC
                 LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![quest_id, limit, offset], completion_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Completed participants of a quest, in completion order.
    pub fn completed_participants(&self, quest_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_address FROM quest_completions
                 WHERE quest_id = ?1 AND status = ?2
                 ORDER BY completed_at ASC",
            )?;
            let rows = stmt
                .query_map((quest_id, CompletionStatus::Completed.as_str()), |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn record_transaction(
        &self,
        user: &str,
        amount: f64,
        kind: TransactionKind,
        quest_id: Option<&str>,
        tx_hash: Option<&str>,
    ) -> Result<TrustTransaction> {
        let user = lower(user);
        self.with_conn(|conn| insert_transaction(conn, &user, amount, kind, quest_id, tx_hash))
    }

    /// Newest first.
    pub fn list_transactions(&self, user: &str) -> Result<Vec<TrustTransaction>> {
        let user = lower(user);
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {TRANSACTION_COLUMNS} FROM trust_transactions
                 WHERE user_address = ?1
                 ORDER BY created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([&user], transaction_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_completion(conn: &Connection, quest_id: &str, user: &str) -> Result<Option<QuestCompletion>> {
    let sql = format!(
        "SELECT {COMPLETION_COLUMNS} FROM quest_completions WHERE quest_id = ?1 AND user_address = ?2"
    );
    conn.query_row(&sql, (quest_id, user), completion_from_row).optional()
}

fn insert_transaction(
    conn: &Connection,
    user: &str,
    amount: f64,
    kind: TransactionKind,
    quest_id: Option<&str>,
    tx_hash: Option<&str>,
) -> Result<TrustTransaction> {
    let id = new_id();
    conn.execute(
        "INSERT INTO trust_transactions (id, user_address, amount, kind, quest_id, tx_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![&id, user, amount, kind.as_str(), quest_id, tx_hash, now()],
    )?;

    let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM trust_transactions WHERE id = ?1");
    Ok(conn.query_row(&sql, [&id], transaction_from_row)?)
}
