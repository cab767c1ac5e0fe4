use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use trustquests_types::models::User;

use super::{OptionalExt, lower, now};
use crate::error::StoreError;
use crate::models::{USER_COLUMNS, user_from_row};
use crate::Database;

/// Profile fields to change; `None` leaves the stored value untouched.
#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl Database {
    /// Return the user for `address`, inserting a bare record on first sight.
    pub fn get_or_create_user(&self, address: &str) -> Result<User> {
        let address = lower(address);
        self.with_conn(|conn| {
            if let Some(user) = query_user(conn, &address)? {
                return Ok(user);
            }

            let ts = now();
            conn.execute(
                "INSERT OR IGNORE INTO users (address, created_at, updated_at) VALUES (?1, ?2, ?2)",
                (&address, &ts),
            )?;
            info!("Created user {}", address);

            query_user(conn, &address)?.ok_or_else(|| StoreError::NotFound("user").into())
        })
    }

    pub fn get_user(&self, address: &str) -> Result<Option<User>> {
        let address = lower(address);
        self.with_conn(|conn| query_user(conn, &address))
    }

    pub fn update_user_profile(&self, address: &str, update: &ProfileUpdate) -> Result<User> {
        let address = lower(address);
        self.with_conn(|conn| {
            if query_user(conn, &address)?.is_none() {
                return Err(StoreError::NotFound("user").into());
            }

            if let Some(username) = &update.username {
                if username_held_by_other(conn, username, &address)? {
                    return Err(StoreError::UsernameTaken(username.clone()).into());
                }
            }

            conn.execute(
                "UPDATE users SET
                    username = COALESCE(?2, username),
                    display_name = COALESCE(?3, display_name),
                    bio = COALESCE(?4, bio),
                    avatar_url = COALESCE(?5, avatar_url),
                    updated_at = ?6
                 WHERE address = ?1",
                rusqlite::params![
                    &address,
                    update.username,
                    update.display_name,
                    update.bio,
                    update.avatar_url,
                    now(),
                ],
            )?;

            query_user(conn, &address)?.ok_or_else(|| StoreError::NotFound("user").into())
        })
    }

    /// True only when a user other than `address` already holds `username`.
    pub fn is_username_taken(&self, username: &str, address: &str) -> Result<bool> {
        let address = lower(address);
        self.with_conn(|conn| username_held_by_other(conn, username, &address))
    }

    /// Case-insensitive substring match on username or display name.
    pub fn search_users(&self, pattern: &str, limit: u32) -> Result<Vec<User>> {
        let like = format!("%{}%", escape_like(pattern));
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE username LIKE ?1 ESCAPE '\\' OR display_name LIKE ?1 ESCAPE '\\'
                 ORDER BY username
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![like, limit], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, address: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE address = ?1");
    conn.query_row(&sql, [address], user_from_row).optional()
}

fn username_held_by_other(conn: &Connection, username: &str, address: &str) -> Result<bool> {
    let holder: Option<String> = conn
        .query_row(
            "SELECT address FROM users WHERE username = ?1 COLLATE NOCASE",
            [username],
            |row| row.get(0),
        )
        .optional()?;

    Ok(matches!(holder, Some(holder) if holder != address))
}

fn escape_like(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
