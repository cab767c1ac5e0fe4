pub mod completions;
pub mod drafts;
pub mod quests;
pub mod spaces;
pub mod users;

use anyhow::Result;

/// Current time in the RFC 3339 form every table stores.
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Address-typed columns are always written and matched lowercase.
pub(crate) fn lower(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}
