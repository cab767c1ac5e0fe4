use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use trustquests_db::{Database, SpaceUpdate};
use trustquests_types::api::{Claims, CreateSpaceRequest, UpdateSpaceRequest};
use trustquests_types::models::Space;
use trustquests_types::normalize_address;

use crate::error::ApiError;
use crate::state::{AppState, blocking};

const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Deserialize)]
pub struct SpaceQuery {
    pub owner: Option<String>,
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "space name must be 1-{} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

/// Load a space and check that `caller` owns it.
fn owned_space(db: &Database, id: &str, caller: &str) -> Result<Space, ApiError> {
    let space = db.get_space(id)?.ok_or(ApiError::NotFound("space"))?;
    if space.owner_address != caller {
        return Err(ApiError::Forbidden("only the space owner can change it"));
    }
    Ok(space)
}

pub async fn list_spaces(
    State(state): State<AppState>,
    Query(query): Query<SpaceQuery>,
) -> Result<Json<Vec<Space>>, ApiError> {
    let owner = query
        .owner
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("owner is required".into()))?;
    let owner = normalize_address(owner)?;

    let spaces = blocking(&state, move |db| Ok(db.list_spaces_by_owner(&owner)?)).await?;
    Ok(Json(spaces))
}

/// Look up by id, then by slug.
pub async fn get_space(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Space>, ApiError> {
    let space = blocking(&state, move |db| {
        match db.get_space(&id)? {
            Some(space) => Ok(space),
            None => db.get_space_by_slug(&id)?.ok_or(ApiError::NotFound("space")),
        }
    })
    .await?;
    Ok(Json(space))
}

pub async fn create_space(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateSpaceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    validate_name(&name)?;

    let space = blocking(&state, move |db| {
        Ok(db.create_space(
            &claims.sub,
            &name,
            req.description.as_deref(),
            req.identity_token_id.as_deref(),
        )?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(space)))
}

pub async fn update_space(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateSpaceRequest>,
) -> Result<Json<Space>, ApiError> {
    let name = req.name.map(|n| n.trim().to_string());
    if let Some(name) = &name {
        validate_name(name)?;
    }
    let update = SpaceUpdate {
        name,
        description: req.description,
        identity_token_id: req.identity_token_id,
    };

    let space = blocking(&state, move |db| {
        owned_space(db, &id, &claims.sub)?;
        Ok(db.update_space(&id, &update)?)
    })
    .await?;
    Ok(Json(space))
}

pub async fn delete_space(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |db| {
        owned_space(db, &id, &claims.sub)?;
        db.delete_space(&id)?;
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
