use anyhow::Result;
use rusqlite::Connection;

use trustquests_types::models::{Quest, QuestDraft};

use super::quests::{NewQuest, insert_quest};
use super::{OptionalExt, lower, now};
use crate::error::StoreError;
use crate::models::{DRAFT_COLUMNS, draft_from_row};
use crate::Database;

/// Draft fields as submitted by the builder wizard.
#[derive(Debug, Default, Clone)]
pub struct DraftInput {
    pub space_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub reward_amount: Option<f64>,
    pub max_completions: Option<u32>,
    pub current_step: u32,
    pub data: serde_json::Value,
}

impl Database {
    /// Insert or overwrite the draft `id` owned by `owner`.
    pub fn save_draft(&self, id: &str, owner: &str, input: &DraftInput) -> Result<QuestDraft> {
        let owner = lower(owner);
        let data = serde_json::to_string(&input.data)?;

        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO quest_drafts
                    (id, owner_address, space_id, title, description, reward_amount,
                     max_completions, current_step, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                 ON CONFLICT (id, owner_address) DO UPDATE SET
                    space_id = excluded.space_id,
                    title = excluded.title,
                    description = excluded.description,
                    reward_amount = excluded.reward_amount,
                    max_completions = excluded.max_completions,
                    current_step = excluded.current_step,
                    data = excluded.data,
                    updated_at = excluded.updated_at",
                rusqlite::params![
                    id,
                    &owner,
                    input.space_id,
                    input.title,
                    input.description,
                    input.reward_amount,
                    input.max_completions.map(i64::from),
                    i64::from(input.current_step),
                    &data,
                    &ts,
                ],
            )?;

            query_draft(conn, id, &owner)?.ok_or_else(|| StoreError::NotFound("draft").into())
        })
    }

    pub fn get_draft(&self, id: &str, owner: &str) -> Result<Option<QuestDraft>> {
        let owner = lower(owner);
        self.with_conn(|conn| query_draft(conn, id, &owner))
    }

    pub fn list_drafts(&self, owner: &str) -> Result<Vec<QuestDraft>> {
        let owner = lower(owner);
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {DRAFT_COLUMNS} FROM quest_drafts
                 WHERE owner_address = ?1
                 ORDER BY updated_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([&owner], draft_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false when the owner has no draft with that id.
    pub fn delete_draft(&self, id: &str, owner: &str) -> Result<bool> {
        let owner = lower(owner);
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM quest_drafts WHERE id = ?1 AND owner_address = ?2",
                (id, &owner),
            )?;
            Ok(deleted > 0)
        })
    }

    /// Turn a finished draft into a live quest and drop the draft. The
    /// read, insert and delete share one transaction, so a draft publishes
    /// at most once.
    pub fn publish_draft(&self, id: &str, owner: &str) -> Result<Quest> {
        let owner = lower(owner);
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let draft = query_draft(&tx, id, &owner)?.ok_or(StoreError::NotFound("draft"))?;
            let title = draft
                .title
                .filter(|t| !t.trim().is_empty())
                .ok_or(StoreError::IncompleteDraft("title"))?;
            let reward_amount = draft
                .reward_amount
                .ok_or(StoreError::IncompleteDraft("reward_amount"))?;

            let quest = insert_quest(
                &tx,
                &NewQuest {
                    space_id: draft.space_id,
                    creator_address: draft.owner_address,
                    title,
                    description: draft.description,
                    reward_amount,
                    max_completions: draft.max_completions.unwrap_or(0),
                    escrow_id: None,
                },
            )?;
            tx.execute(
                "DELETE FROM quest_drafts WHERE id = ?1 AND owner_address = ?2",
                (id, &owner),
            )?;
            tx.commit()?;

            Ok(quest)
        })
    }
}

fn query_draft(conn: &Connection, id: &str, owner: &str) -> Result<Option<QuestDraft>> {
    let sql = format!("SELECT {DRAFT_COLUMNS} FROM quest_drafts WHERE id = ?1 AND owner_address = ?2");
    conn.query_row(&sql, (id, owner), draft_from_row).optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const OWNER: &str = "0xAbCdEf0000000000000000000000000000000001";
    const OTHER: &str = "0x0000000000000000000000000000000000000002";

    fn input() -> DraftInput {
        DraftInput {
            space_id: None,
            title: Some("Join the Discord".into()),
            description: Some("Say hi in #general".into()),
            reward_amount: Some(25.5),
            max_completions: Some(100),
            current_step: 2,
            data: json!({ "tasks": [{ "kind": "discord", "invite": "abc" }] }),
        }
    }

    #[test]
    fn save_then_get_returns_same_fields() {
        let db = Database::open_in_memory().unwrap();
        let saved = db.save_draft("draft-1", OWNER, &input()).unwrap();
        let fetched = db.get_draft("draft-1", &OWNER.to_lowercase()).unwrap().unwrap();

        assert_eq!(saved, fetched);
        assert_eq!(fetched.owner_address, OWNER.to_lowercase());
        assert_eq!(fetched.title.as_deref(), Some("Join the Discord"));
        assert_eq!(fetched.reward_amount, Some(25.5));
        assert_eq!(fetched.max_completions, Some(100));
        assert_eq!(fetched.current_step, 2);
        assert_eq!(fetched.data["tasks"][0]["invite"], "abc");
    }

    #[test]
    fn resave_overwrites_and_other_owner_sees_nothing() {
        let db = Database::open_in_memory().unwrap();
        db.save_draft("draft-1", OWNER, &input()).unwrap();

        let mut next = input();
        next.current_step = 3;
        next.title = Some("Join the Discord server".into());
        let saved = db.save_draft("draft-1", OWNER, &next).unwrap();

        assert_eq!(saved.current_step, 3);
        assert_eq!(db.list_drafts(OWNER).unwrap().len(), 1);
        assert!(db.get_draft("draft-1", OTHER).unwrap().is_none());
    }

    #[test]
    fn delete_makes_draft_not_found() {
        let db = Database::open_in_memory().unwrap();
        db.save_draft("draft-1", OWNER, &input()).unwrap();

        assert!(!db.delete_draft("draft-1", OTHER).unwrap());
        assert!(db.delete_draft("draft-1", OWNER).unwrap());
        assert!(db.get_draft("draft-1", OWNER).unwrap().is_none());
    }

    #[test]
    fn publish_requires_title_and_reward() {
        let db = Database::open_in_memory().unwrap();
        let mut incomplete = input();
        incomplete.reward_amount = None;
        db.save_draft("draft-2", OWNER, &incomplete).unwrap();

        let err = db.publish_draft("draft-2", OWNER).unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::IncompleteDraft("reward_amount"))
        );

        db.save_draft("draft-3", OWNER, &input()).unwrap();
        let quest = db.publish_draft("draft-3", OWNER).unwrap();
        assert_eq!(quest.title, "Join the Discord");
        assert_eq!(quest.creator_address, OWNER.to_lowercase());
        assert_eq!(quest.max_completions, 100);
        assert!(db.get_draft("draft-3", OWNER).unwrap().is_none());
    }

    #[test]
    fn draft_publishes_only_once() {
        let db = std::sync::Arc::new(Database::open_in_memory().unwrap());
        db.save_draft("draft-4", OWNER, &input()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                std::thread::spawn(move || db.publish_draft("draft-4", OWNER))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(
                err.downcast_ref::<StoreError>(),
                Some(&StoreError::NotFound("draft"))
            );
        }

        let filter = crate::QuestFilter {
            creator: Some(OWNER.to_lowercase()),
            ..Default::default()
        };
        assert_eq!(db.list_quests(&filter).unwrap().len(), 1);
    }
}
