use serde::{Deserialize, Serialize};

use crate::models::QuestStatus;

// -- Bearer token claims --

/// JWT claims issued after a wallet login. `sub` is the lowercase address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// -- Auth --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WalletLoginRequest {
    pub address: String,
    /// Unix seconds embedded in the signed message.
    pub timestamp: i64,
    /// 65-byte `personal_sign` signature, hex encoded.
    pub signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WalletLoginResponse {
    pub address: String,
    pub token: String,
}

// -- Users --

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsernameCheckResponse {
    pub username: String,
    pub taken: bool,
}

// -- Spaces --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSpaceRequest {
    pub name: String,
    pub description: Option<String>,
    pub identity_token_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSpaceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub identity_token_id: Option<String>,
}

// -- Quest drafts --

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SaveDraftRequest {
    pub space_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub reward_amount: Option<f64>,
    pub max_completions: Option<u32>,
    #[serde(default)]
    pub current_step: u32,
    #[serde(default)]
    pub data: serde_json::Value,
}

// -- Quests --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreateQuestRequest {
    pub space_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub reward_amount: f64,
    pub max_completions: u32,
    pub escrow_id: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateQuestStatusRequest {
    pub status: QuestStatus,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SetEscrowRequest {
    pub escrow_id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FundResponse {
    /// Whole tokens escrowed: `reward_amount × max_completions`.
    pub amount: f64,
    pub approve_tx: String,
    pub deposit_tx: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DistributeResponse {
    pub winners: Vec<String>,
    pub set_winners_tx: String,
    pub distribute_tx: String,
}

// -- Blockchain --

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: String,
    /// Raw token units as a decimal string; may exceed f64 precision.
    pub balance_wei: String,
    pub balance: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OwnerResponse {
    pub contract: String,
    pub token_id: String,
    pub owner: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DepositResponse {
    pub escrow_id: u64,
    pub deposit_wei: String,
    pub deposit: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChainConfigResponse {
    pub chain_id: Option<u64>,
    pub token_address: Option<String>,
    pub escrow_address: Option<String>,
    pub revenue_wallet: Option<String>,
    pub writes_enabled: bool,
}
