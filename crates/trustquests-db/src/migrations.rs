use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("DB: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                address       TEXT PRIMARY KEY,
                username      TEXT UNIQUE COLLATE NOCASE,
                display_name  TEXT,
                bio           TEXT,
                avatar_url    TEXT,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );

            CREATE TABLE spaces (
                id                 TEXT PRIMARY KEY,
                slug               TEXT NOT NULL UNIQUE,
                name               TEXT NOT NULL,
                description        TEXT,
                owner_address      TEXT NOT NULL,
                identity_token_id  TEXT,
                created_at         TEXT NOT NULL,
                updated_at         TEXT NOT NULL
            );

            CREATE INDEX idx_spaces_owner ON spaces(owner_address);

            CREATE TABLE quests (
                id               TEXT PRIMARY KEY,
                space_id         TEXT REFERENCES spaces(id) ON DELETE SET NULL,
                creator_address  TEXT NOT NULL,
                title            TEXT NOT NULL,
                description      TEXT,
                reward_amount    REAL NOT NULL DEFAULT 0,
                max_completions  INTEGER NOT NULL DEFAULT 0,
                status           TEXT NOT NULL DEFAULT 'active',
                escrow_id        INTEGER,
                created_at       TEXT NOT NULL,
                updated_at       TEXT NOT NULL
            );

            CREATE INDEX idx_quests_creator ON quests(creator_address, created_at);
            CREATE INDEX idx_quests_space ON quests(space_id);

            CREATE TABLE quest_drafts (
                id               TEXT NOT NULL,
                owner_address    TEXT NOT NULL,
                space_id         TEXT,
                title            TEXT,
                description      TEXT,
                reward_amount    REAL,
                max_completions  INTEGER,
                current_step     INTEGER NOT NULL DEFAULT 0,
                data             TEXT NOT NULL DEFAULT 'null',
                created_at       TEXT NOT NULL,
                updated_at       TEXT NOT NULL,
                PRIMARY KEY (id, owner_address)
            );

            CREATE TABLE quest_completions (
                id             TEXT PRIMARY KEY,
                quest_id       TEXT NOT NULL REFERENCES quests(id) ON DELETE CASCADE,
                user_address   TEXT NOT NULL,
                status         TEXT NOT NULL DEFAULT 'started',
                reward_amount  REAL NOT NULL DEFAULT 0,
                started_at     TEXT NOT NULL,
                completed_at   TEXT,
                UNIQUE(quest_id, user_address)
            );

            CREATE INDEX idx_completions_quest ON quest_completions(quest_id, started_at);

            CREATE TABLE trust_transactions (
                id            TEXT PRIMARY KEY,
                user_address  TEXT NOT NULL,
                amount        REAL NOT NULL,
                kind          TEXT NOT NULL,
                quest_id      TEXT,
                tx_hash       TEXT,
                created_at    TEXT NOT NULL
            );

            CREATE INDEX idx_transactions_user ON trust_transactions(user_address, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
