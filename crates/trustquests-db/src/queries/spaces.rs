use std::collections::HashSet;

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use trustquests_types::models::Space;

use super::{OptionalExt, lower, new_id, now};
use crate::error::StoreError;
use crate::models::{SPACE_COLUMNS, space_from_row};
use crate::Database;

#[derive(Debug, Default, Clone)]
pub struct SpaceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub identity_token_id: Option<String>,
}

impl Database {
    /// Create a space with a slug derived from `name`. Collisions are
    /// resolved by suffixing `-1`, `-2`, ... in order.
    pub fn create_space(
        &self,
        owner: &str,
        name: &str,
        description: Option<&str>,
        identity_token_id: Option<&str>,
    ) -> Result<Space> {
        let owner = lower(owner);
        let base = slugify(name);
        let id = new_id();

        self.with_conn(|conn| {
            let slug = unique_slug(conn, &base)?;
            let ts = now();
            conn.execute(
                "INSERT INTO spaces (id, slug, name, description, owner_address, identity_token_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![&id, &slug, name, description, &owner, identity_token_id, &ts],
            )?;
            info!("Space {} created by {} with slug {}", id, owner, slug);

            query_space(conn, "id", &id)?.ok_or_else(|| StoreError::NotFound("space").into())
        })
    }

    pub fn get_space(&self, id: &str) -> Result<Option<Space>> {
        self.with_conn(|conn| query_space(conn, "id", id))
    }

    pub fn get_space_by_slug(&self, slug: &str) -> Result<Option<Space>> {
        self.with_conn(|conn| query_space(conn, "slug", slug))
    }

    pub fn list_spaces_by_owner(&self, owner: &str) -> Result<Vec<Space>> {
        let owner = lower(owner);
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SPACE_COLUMNS} FROM spaces WHERE owner_address = ?1 ORDER BY created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([&owner], space_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Renaming keeps the slug so existing links stay valid.
    pub fn update_space(&self, id: &str, update: &SpaceUpdate) -> Result<Space> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE spaces SET
                    name = COALESCE(?2, name),
                    description = COALESCE(?3, description),
                    identity_token_id = COALESCE(?4, identity_token_id),
                    updated_at = ?5
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    update.name,
                    update.description,
                    update.identity_token_id,
                    now(),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("space").into());
            }

            query_space(conn, "id", id)?.ok_or_else(|| StoreError::NotFound("space").into())
        })
    }

    pub fn delete_space(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM spaces WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }
}

fn query_space(conn: &Connection, column: &str, value: &str) -> Result<Option<Space>> {
    let sql = format!("SELECT {SPACE_COLUMNS} FROM spaces WHERE {column} = ?1");
    conn.query_row(&sql, [value], space_from_row).optional()
}

fn unique_slug(conn: &Connection, base: &str) -> Result<String> {
    let mut stmt = conn.prepare("SELECT slug FROM spaces WHERE slug = ?1 OR slug LIKE ?1 || '-%'")?;
    let taken = stmt
        .query_map([base], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;

    if !taken.contains(base) {
        return Ok(base.to_string());
    }

    let mut n = 1u32;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Lowercase ASCII alphanumerics; every other run of characters becomes one `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "space".to_string()
    } else {
        slug
    }
}
