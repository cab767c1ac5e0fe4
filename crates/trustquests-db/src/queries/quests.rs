use anyhow::Result;
use rusqlite::Connection;
use rusqlite::types::Value;
use tracing::info;

use trustquests_types::models::{Quest, QuestStatus};

use super::{OptionalExt, lower, new_id, now};
use crate::error::StoreError;
use crate::models::{QUEST_COLUMNS, quest_from_row};
use crate::Database;

#[derive(Debug, Clone)]
pub struct NewQuest {
    pub space_id: Option<String>,
    pub creator_address: String,
    pub title: String,
    pub description: Option<String>,
    pub reward_amount: f64,
    pub max_completions: u32,
    pub escrow_id: Option<u64>,
}

/// Optional filters for quest listings; unset fields match everything.
#[derive(Debug, Default, Clone)]
pub struct QuestFilter {
    pub creator: Option<String>,
    pub space_id: Option<String>,
    pub status: Option<QuestStatus>,
}

impl Database {
    pub fn create_quest(&self, quest: &NewQuest) -> Result<Quest> {
        self.with_conn(|conn| insert_quest(conn, quest))
    }

    pub fn get_quest(&self, id: &str) -> Result<Option<Quest>> {
        self.with_conn(|conn| query_quest(conn, id))
    }

    /// Newest first.
    pub fn list_quests(&self, filter: &QuestFilter) -> Result<Vec<Quest>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(creator) = &filter.creator {
            params.push(Value::Text(lower(creator)));
            clauses.push("creator_address = ?");
        }
        if let Some(space_id) = &filter.space_id {
            params.push(Value::Text(space_id.clone()));
            clauses.push("space_id = ?");
        }
        if let Some(status) = filter.status {
            params.push(Value::Text(status.as_str().to_string()));
            clauses.push("status = ?");
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {QUEST_COLUMNS} FROM quests {where_clause} ORDER BY created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), quest_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_quest_status(&self, id: &str, status: QuestStatus) -> Result<Quest> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE quests SET status = ?2, updated_at = ?3 WHERE id = ?1",
                (id, status.as_str(), now()),
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("quest").into());
            }
            query_quest(conn, id)?.ok_or_else(|| StoreError::NotFound("quest").into())
        })
    }

    pub fn set_quest_escrow_id(&self, id: &str, escrow_id: u64) -> Result<Quest> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE quests SET escrow_id = ?2, updated_at = ?3 WHERE id = ?1",
                (id, escrow_id as i64, now()),
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("quest").into());
            }
            query_quest(conn, id)?.ok_or_else(|| StoreError::NotFound("quest").into())
        })
    }
}

pub(crate) fn insert_quest(conn: &Connection, quest: &NewQuest) -> Result<Quest> {
    let id = new_id();
    let creator = lower(&quest.creator_address);
    let ts = now();
    conn.execute(
        "INSERT INTO quests
            (id, space_id, creator_address, title, description, reward_amount,
             max_completions, status, escrow_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        rusqlite::params![
            &id,
            quest.space_id,
            &creator,
            quest.title,
            quest.description,
            quest.reward_amount,
            i64::from(quest.max_completions),
            QuestStatus::Active.as_str(),
            quest.escrow_id.map(|v| v as i64),
            &ts,
        ],
    )?;
    info!("Quest {} created by {}", id, creator);

    query_quest(conn, &id)?.ok_or_else(|| StoreError::NotFound("quest").into())
}

pub(crate) fn query_quest(conn: &Connection, id: &str) -> Result<Option<Quest>> {
    let sql = format!("SELECT {QUEST_COLUMNS} FROM quests WHERE id = ?1");
    conn.query_row(&sql, [id], quest_from_row).optional()
}
