use axum::{Json, extract::State};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};

use trustquests_chain::wallet::recover_personal;
use trustquests_types::api::{Claims, WalletLoginRequest, WalletLoginResponse};
use trustquests_types::normalize_address;

use crate::error::ApiError;
use crate::state::{AppState, blocking};

/// How far the signed timestamp may drift from the server clock.
pub const LOGIN_WINDOW_SECS: i64 = 5 * 60;

/// The exact text a wallet signs with `personal_sign` to log in.
pub fn login_message(address: &str, timestamp: i64) -> String {
    format!("TrustQuests login\nAddress: {}\nTimestamp: {}", address, timestamp)
}

/// Check a login signature and return the normalized signer address.
pub fn verify_login(req: &WalletLoginRequest, now: i64) -> Result<String, ApiError> {
    let address = normalize_address(&req.address)?;

    if (now - req.timestamp).abs() > LOGIN_WINDOW_SECS {
        return Err(ApiError::Unauthorized);
    }

    let message = login_message(&address, req.timestamp);
    let signer = recover_personal(message.as_bytes(), &req.signature).map_err(|e| {
        warn!("Rejected login signature for {}: {}", address, e);
        ApiError::Unauthorized
    })?;

    if signer != address {
        warn!("Login signature for {} was signed by {}", address, signer);
        return Err(ApiError::Unauthorized);
    }
    Ok(address)
}

pub async fn wallet_login(
    State(state): State<AppState>,
    Json(req): Json<WalletLoginRequest>,
) -> Result<Json<WalletLoginResponse>, ApiError> {
    let address = verify_login(&req, Utc::now().timestamp())?;

    let addr = address.clone();
    blocking(&state, move |db| Ok(db.get_or_create_user(&addr)?)).await?;

    let token = create_token(&state.jwt_secret, &address).map_err(ApiError::Internal)?;
    info!("Wallet {} logged in", address);

    Ok(Json(WalletLoginResponse { address, token }))
}

pub fn create_token(secret: &str, address: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: address.to_string(),
        exp: (Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
