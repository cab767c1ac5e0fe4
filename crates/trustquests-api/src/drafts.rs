use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use trustquests_db::DraftInput;
use trustquests_types::api::{Claims, SaveDraftRequest};
use trustquests_types::models::QuestDraft;

use crate::error::ApiError;
use crate::state::{AppState, blocking};

const MAX_DRAFT_ID_LEN: usize = 128;

fn validate_draft_id(id: &str) -> Result<(), ApiError> {
    if id.is_empty() || id.len() > MAX_DRAFT_ID_LEN {
        return Err(ApiError::BadRequest("invalid draft id".into()));
    }
    Ok(())
}

pub async fn list_drafts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<QuestDraft>>, ApiError> {
    let drafts = blocking(&state, move |db| Ok(db.list_drafts(&claims.sub)?)).await?;
    Ok(Json(drafts))
}

pub async fn get_draft(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<QuestDraft>, ApiError> {
    let draft = blocking(&state, move |db| {
        db.get_draft(&id, &claims.sub)?.ok_or(ApiError::NotFound("draft"))
    })
    .await?;
    Ok(Json(draft))
}

/// Create or overwrite the caller's draft with this id.
pub async fn save_draft(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SaveDraftRequest>,
) -> Result<Json<QuestDraft>, ApiError> {
    validate_draft_id(&id)?;
    if req.reward_amount.is_some_and(|r| !r.is_finite() || r < 0.0) {
        return Err(ApiError::BadRequest("reward_amount must be a non-negative number".into()));
    }

    let input = DraftInput {
        space_id: req.space_id,
        title: req.title,
        description: req.description,
        reward_amount: req.reward_amount,
        max_completions: req.max_completions,
        current_step: req.current_step,
        data: req.data,
    };

    let draft = blocking(&state, move |db| Ok(db.save_draft(&id, &claims.sub, &input)?)).await?;
    Ok(Json(draft))
}

pub async fn delete_draft(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let deleted = blocking(&state, move |db| Ok(db.delete_draft(&id, &claims.sub)?)).await?;
    if !deleted {
        return Err(ApiError::NotFound("draft"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn publish_draft(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let quest = blocking(&state, move |db| Ok(db.publish_draft(&id, &claims.sub)?)).await?;
    Ok((StatusCode::CREATED, Json(quest)))
}
