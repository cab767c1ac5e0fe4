use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use trustquests_db::ProfileUpdate;
use trustquests_types::api::{Claims, UpdateProfileRequest, UsernameCheckResponse};
use trustquests_types::models::{TrustTransaction, User};
use trustquests_types::normalize_address;

use crate::error::ApiError;
use crate::state::{AppState, blocking};

const MAX_SEARCH_RESULTS: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
}

fn default_search_limit() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: String,
    pub address: Option<String>,
}

/// Usernames are 3-32 characters of ASCII letters, digits and underscores.
pub fn validate_username(username: &str) -> Result<(), ApiError> {
    let len = username.chars().count();
    if !(3..=32).contains(&len) {
        return Err(ApiError::BadRequest("username must be 3-32 characters".into()));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ApiError::BadRequest(
            "username may only contain letters, digits and underscores".into(),
        ));
    }
    Ok(())
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    let user = blocking(&state, move |db| Ok(db.get_or_create_user(&claims.sub)?)).await?;
    Ok(Json(user))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>, ApiError> {
    let username = req.username.map(|u| u.trim().to_string());
    if let Some(username) = &username {
        validate_username(username)?;
    }

    let update = ProfileUpdate {
        username,
        display_name: req.display_name,
        bio: req.bio,
        avatar_url: req.avatar_url,
    };

    let user = blocking(&state, move |db| {
        db.get_or_create_user(&claims.sub)?;
        Ok(db.update_user_profile(&claims.sub, &update)?)
    })
    .await?;
    Ok(Json(user))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<User>, ApiError> {
    let address = normalize_address(&address)?;
    let user = blocking(&state, move |db| db.get_user(&address)?.ok_or(ApiError::NotFound("user")))
        .await?;
    Ok(Json(user))
}

pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let pattern = query.q.trim().to_string();
    if pattern.is_empty() {
        return Err(ApiError::BadRequest("search query is empty".into()));
    }
    let limit = query.limit.clamp(1, MAX_SEARCH_RESULTS);

    let users = blocking(&state, move |db| Ok(db.search_users(&pattern, limit)?)).await?;
    Ok(Json(users))
}

/// `taken` is true only when a different wallet holds the username.
pub async fn check_username(
    State(state): State<AppState>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<UsernameCheckResponse>, ApiError> {
    let username = query.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::BadRequest("username is empty".into()));
    }
    let address = match query.address.as_deref() {
        Some(raw) => normalize_address(raw)?,
        None => String::new(),
    };

    let name = username.clone();
    let taken = blocking(&state, move |db| Ok(db.is_username_taken(&name, &address)?)).await?;
    Ok(Json(UsernameCheckResponse { username, taken }))
}

/// A wallet may only read its own ledger.
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<TrustTransaction>>, ApiError> {
    let address = normalize_address(&address)?;
    if address != claims.sub {
        return Err(ApiError::Forbidden("cannot read another wallet's transactions"));
    }

    let txs = blocking(&state, move |db| Ok(db.list_transactions(&address)?)).await?;
    Ok(Json(txs))
}
