//! Row mappers from SQLite rows to the shared domain models.
//! Each `*_COLUMNS` list matches the column order its mapper reads.
use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

use trustquests_types::models::{
    CompletionStatus, Quest, QuestCompletion, QuestDraft, Space, TransactionKind, TrustTransaction,
    User,
};
use trustquests_types::time::parse_timestamp;

pub const USER_COLUMNS: &str =
    "address, username, display_name, bio, avatar_url, created_at, updated_at";

pub const SPACE_COLUMNS: &str =
    "id, slug, name, description, owner_address, identity_token_id, created_at, updated_at";

pub const QUEST_COLUMNS: &str = "id, space_id, creator_address, title, description, reward_amount, \
     max_completions, status, escrow_id, created_at, updated_at";

pub const DRAFT_COLUMNS: &str = "id, owner_address, space_id, title, description, reward_amount, \
     max_completions, current_step, data, created_at, updated_at";

pub const COMPLETION_COLUMNS: &str =
    "id, quest_id, user_address, status, reward_amount, started_at, completed_at";

pub const TRANSACTION_COLUMNS: &str =
    "id, user_address, amount, kind, quest_id, tx_hash, created_at";

pub fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        address: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        bio: row.get(3)?,
        avatar_url: row.get(4)?,
        created_at: timestamp(row, 5)?,
        updated_at: timestamp(row, 6)?,
    })
}

pub fn space_from_row(row: &Row<'_>) -> rusqlite::Result<Space> {
    Ok(Space {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        owner_address: row.get(4)?,
        identity_token_id: row.get(5)?,
        created_at: timestamp(row, 6)?,
        updated_at: timestamp(row, 7)?,
    })
}

pub fn quest_from_row(row: &Row<'_>) -> rusqlite::Result<Quest> {
    Ok(Quest {
        id: row.get(0)?,
        space_id: row.get(1)?,
        creator_address: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        reward_amount: row.get(5)?,
        max_completions: row.get::<_, i64>(6)? as u32,
        status: parsed(row, 7)?,
        escrow_id: row.get::<_, Option<i64>>(8)?.map(|v| v as u64),
        created_at: timestamp(row, 9)?,
        updated_at: timestamp(row, 10)?,
    })
}

pub fn draft_from_row(row: &Row<'_>) -> rusqlite::Result<QuestDraft> {
    let data: String = row.get(8)?;
    let data = serde_json::from_str(&data)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;

    Ok(QuestDraft {
        id: row.get(0)?,
        owner_address: row.get(1)?,
        space_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        reward_amount: row.get(5)?,
        max_completions: row.get::<_, Option<i64>>(6)?.map(|v| v as u32),
        current_step: row.get::<_, i64>(7)? as u32,
        data,
        created_at: timestamp(row, 9)?,
        updated_at: timestamp(row, 10)?,
    })
}

pub fn completion_from_row(row: &Row<'_>) -> rusqlite::Result<QuestCompletion> {
    let status: CompletionStatus = parsed(row, 3)?;
    Ok(QuestCompletion {
        id: row.get(0)?,
        quest_id: row.get(1)?,
        user_address: row.get(2)?,
        status,
        reward_amount: row.get(4)?,
        started_at: timestamp(row, 5)?,
        completed_at: optional_timestamp(row, 6)?,
    })
}

pub fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<TrustTransaction> {
    let kind: TransactionKind = parsed(row, 3)?;
    Ok(TrustTransaction {
        id: row.get(0)?,
        user_address: row.get(1)?,
        amount: row.get(2)?,
        kind,
        quest_id: row.get(4)?,
        tx_hash: row.get(5)?,
        created_at: timestamp(row, 6)?,
    })
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            anyhow::anyhow!("corrupt timestamp '{}'", raw).into(),
        )
    })
}

fn optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => timestamp(row, idx).map(Some),
        None => Ok(None),
    }
}

fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

