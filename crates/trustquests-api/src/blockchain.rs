use axum::{
    Json,
    extract::{Path, State},
};

use trustquests_chain::TOKEN_DECIMALS;
use trustquests_chain::abi::format_units;
use trustquests_types::api::{BalanceResponse, ChainConfigResponse, DepositResponse, OwnerResponse};
use trustquests_types::normalize_address;

use crate::error::ApiError;
use crate::state::AppState;

/// Trust token balance of `address`.
pub async fn balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let address = normalize_address(&address)?;
    let raw = state.chain()?.token_balance(&address).await?;

    Ok(Json(BalanceResponse {
        address,
        balance_wei: raw.to_string(),
        balance: format_units(raw, TOKEN_DECIMALS),
    }))
}

pub async fn owner(
    State(state): State<AppState>,
    Path((contract, token_id)): Path<(String, String)>,
) -> Result<Json<OwnerResponse>, ApiError> {
    let contract = normalize_address(&contract)?;
    let id: u128 = token_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid token id '{}'", token_id)))?;

    let owner = state.chain()?.owner_of(&contract, id).await?;
    Ok(Json(OwnerResponse {
        contract,
        token_id,
        owner,
    }))
}

pub async fn quest_deposit(
    State(state): State<AppState>,
    Path(escrow_id): Path<u64>,
) -> Result<Json<DepositResponse>, ApiError> {
    let raw = state.chain()?.quest_deposit(escrow_id).await?;

    Ok(Json(DepositResponse {
        escrow_id,
        deposit_wei: raw.to_string(),
        deposit: format_units(raw, TOKEN_DECIMALS),
    }))
}

/// Public contract addresses, so clients need not hardcode them.
pub async fn config(State(state): State<AppState>) -> Json<ChainConfigResponse> {
    let response = match state.chain.as_deref() {
        Some(chain) => ChainConfigResponse {
            chain_id: chain.configured_chain_id(),
            token_address: chain.token_address().map(str::to_string),
            escrow_address: chain.escrow_address().map(str::to_string),
            revenue_wallet: chain.revenue_wallet().map(str::to_string),
            writes_enabled: chain.writes_enabled(),
        },
        None => ChainConfigResponse {
            chain_id: None,
            token_address: None,
            escrow_address: None,
            revenue_wallet: None,
            writes_enabled: false,
        },
    };
    Json(response)
}
