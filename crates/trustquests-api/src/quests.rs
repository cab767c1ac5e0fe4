use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use trustquests_chain::{TOKEN_DECIMALS, abi::parse_units};
use trustquests_db::{Database, NewQuest, QuestFilter};
use trustquests_types::api::{
    Claims, CreateQuestRequest, DistributeResponse, FundResponse, SetEscrowRequest,
    UpdateQuestStatusRequest,
};
use trustquests_types::models::{Quest, QuestCompletion, QuestStatus, TransactionKind};
use trustquests_types::normalize_address;

use crate::error::ApiError;
use crate::state::{AppState, blocking};

#[derive(Debug, Deserialize)]
pub struct QuestQuery {
    pub creator: Option<String>,
    pub space: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_page_limit() -> u32 {
    100
}

/// Load a quest and check that `caller` created it.
fn created_quest(db: &Database, id: &str, caller: &str) -> Result<Quest, ApiError> {
    let quest = db.get_quest(id)?.ok_or(ApiError::NotFound("quest"))?;
    if quest.creator_address != caller {
        return Err(ApiError::Forbidden("only the quest creator can do this"));
    }
    Ok(quest)
}

pub async fn list_quests(
    State(state): State<AppState>,
    Query(query): Query<QuestQuery>,
) -> Result<Json<Vec<Quest>>, ApiError> {
    let filter = QuestFilter {
        creator: query.creator.as_deref().map(normalize_address).transpose()?,
        space_id: query.space,
        status: query
            .status
            .as_deref()
            .map(str::parse::<QuestStatus>)
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
    };

    let quests = blocking(&state, move |db| Ok(db.list_quests(&filter)?)).await?;
    Ok(Json(quests))
}

pub async fn get_quest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Quest>, ApiError> {
    let quest = blocking(&state, move |db| db.get_quest(&id)?.ok_or(ApiError::NotFound("quest")))
        .await?;
    Ok(Json(quest))
}

pub async fn list_completions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<QuestCompletion>>, ApiError> {
    let records = blocking(&state, move |db| {
        db.get_quest(&id)?.ok_or(ApiError::NotFound("quest"))?;
        Ok(db.list_completions(&id, page.limit, page.offset)?)
    })
    .await?;
    Ok(Json(records))
}

pub async fn create_quest(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateQuestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title is required".into()));
    }
    if !req.reward_amount.is_finite() || req.reward_amount < 0.0 {
        return Err(ApiError::BadRequest("reward_amount must be a non-negative number".into()));
    }

    let new_quest = NewQuest {
        space_id: req.space_id,
        creator_address: claims.sub,
        title,
        description: req.description,
        reward_amount: req.reward_amount,
        max_completions: req.max_completions,
        escrow_id: req.escrow_id,
    };

    let quest = blocking(&state, move |db| {
        if let Some(space_id) = &new_quest.space_id {
            let space = db.get_space(space_id)?.ok_or(ApiError::NotFound("space"))?;
            if space.owner_address != new_quest.creator_address {
                return Err(ApiError::Forbidden("quests can only be added to your own spaces"));
            }
        }
        Ok(db.create_quest(&new_quest)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(quest)))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateQuestStatusRequest>,
) -> Result<Json<Quest>, ApiError> {
    let quest = blocking(&state, move |db| {
        created_quest(db, &id, &claims.sub)?;
        Ok(db.update_quest_status(&id, req.status)?)
    })
    .await?;
    info!("Quest {} is now {}", quest.id, quest.status);
    Ok(Json(quest))
}

pub async fn set_escrow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetEscrowRequest>,
) -> Result<Json<Quest>, ApiError> {
    let quest = blocking(&state, move |db| {
        created_quest(db, &id, &claims.sub)?;
        Ok(db.set_quest_escrow_id(&id, req.escrow_id)?)
    })
    .await?;
    Ok(Json(quest))
}

pub async fn start_quest(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<QuestCompletion>, ApiError> {
    let record = blocking(&state, move |db| {
        db.get_or_create_user(&claims.sub)?;
        Ok(db.start_quest(&id, &claims.sub)?)
    })
    .await?;
    Ok(Json(record))
}

pub async fn complete_quest(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<QuestCompletion>, ApiError> {
    let record = blocking(&state, move |db| Ok(db.complete_quest(&id, &claims.sub)?)).await?;
    Ok(Json(record))
}

/// Escrow `reward × max_completions` from the service wallet.
pub async fn fund_quest(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<FundResponse>, ApiError> {
    let chain = state.chain()?;
    let escrow = chain.escrow_address().ok_or(ApiError::ChainUnavailable)?.to_string();

    let quest = blocking(&state, move |db| created_quest(db, &id, &claims.sub)).await?;
    let escrow_id = quest
        .escrow_id
        .ok_or_else(|| ApiError::BadRequest("quest has no escrow id".into()))?;

    let amount = quest.reward_amount * f64::from(quest.max_completions);
    let raw = parse_units(amount, TOKEN_DECIMALS);
    if raw == 0 {
        return Err(ApiError::BadRequest("quest has nothing to escrow".into()));
    }

    let approve_tx = chain.approve(&escrow, raw).await?;
    let deposit_tx = chain.deposit(escrow_id, raw).await?;
    info!("Funded quest {} (escrow {}) with {} tokens", quest.id, escrow_id, amount);

    Ok(Json(FundResponse {
        amount,
        approve_tx,
        deposit_tx,
    }))
}

/// Set the escrow winners to everyone who completed the quest, release the
/// rewards, and log one ledger entry per winner.
pub async fn distribute(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<DistributeResponse>, ApiError> {
    let chain = state.chain()?;

    let (quest, winners) = blocking(&state, move |db| {
        let quest = created_quest(db, &id, &claims.sub)?;
        let winners = db.completed_participants(&quest.id)?;
        Ok((quest, winners))
    })
    .await?;

    let escrow_id = quest
        .escrow_id
        .ok_or_else(|| ApiError::BadRequest("quest has no escrow id".into()))?;
    if winners.is_empty() {
        return Err(ApiError::Conflict("quest has no completed participants".into()));
    }

    let set_winners_tx = chain.set_winners(escrow_id, &winners).await?;
    let distribute_tx = chain.distribute_rewards(escrow_id).await?;
    info!(
        "Distributed quest {} (escrow {}) to {} winners",
        quest.id,
        escrow_id,
        winners.len()
    );

    let ledger_winners = winners.clone();
    let tx_hash = distribute_tx.clone();
    blocking(&state, move |db| {
        for winner in &ledger_winners {
            db.record_transaction(
                winner,
                quest.reward_amount,
                TransactionKind::Transfer,
                Some(&quest.id),
                Some(&tx_hash),
            )?;
        }
        Ok(())
    })
    .await?;

    Ok(Json(DistributeResponse {
        winners,
        set_winners_tx,
        distribute_tx,
    }))
}
