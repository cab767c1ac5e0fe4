//! Client for the TrustQuests contracts: the ERC-20 trust token, ERC-721
//! identity NFTs and the quest escrow.
//!
//! Reads go through `eth_call`. Writes are signed locally with the
//! configured key as EIP-155 legacy transactions and submitted with
//! `eth_sendRawTransaction`. There is no retry; a failed call surfaces as a
//! [`ChainError`].

pub mod abi;
pub mod error;
pub mod rpc;
pub mod tx;
pub mod wallet;

use std::time::Duration;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use abi::{Token, decode_address, decode_uint, encode_call, parse_address};
pub use error::ChainError;
use rpc::RpcClient;
use tx::LegacyTransaction;
use wallet::Wallet;

/// The trust token uses the usual 18 decimals.
pub const TOKEN_DECIMALS: u32 = 18;

pub const DEFAULT_GAS_LIMIT: u64 = 300_000;

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    /// Queried from the node on first use when unset.
    pub chain_id: Option<u64>,
    pub token_address: Option<String>,
    pub escrow_address: Option<String>,
    pub revenue_wallet: Option<String>,
    pub private_key: Option<String>,
    pub gas_limit: u64,
    pub request_timeout: Duration,
}

impl ChainConfig {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            chain_id: None,
            token_address: None,
            escrow_address: None,
            revenue_wallet: None,
            private_key: None,
            gas_limit: DEFAULT_GAS_LIMIT,
            request_timeout: Duration::from_secs(15),
        }
    }
}

pub struct TrustChain {
    rpc: RpcClient,
    chain_id: OnceCell<u64>,
    token_address: Option<String>,
    escrow_address: Option<String>,
    revenue_wallet: Option<String>,
    gas_limit: u64,
    signer: Option<Wallet>,
    // Serializes nonce lookup and submission
    send_lock: Mutex<()>,
}

impl TrustChain {
    pub fn new(config: ChainConfig) -> Result<Self, ChainError> {
        let signer = config.private_key.as_deref().map(Wallet::from_hex).transpose()?;
        let chain_id = match config.chain_id {
            Some(id) => OnceCell::new_with(Some(id)),
            None => OnceCell::new(),
        };

        let chain = Self {
            rpc: RpcClient::new(config.rpc_url, config.request_timeout),
            chain_id,
            token_address: normalize_opt(config.token_address)?,
            escrow_address: normalize_opt(config.escrow_address)?,
            revenue_wallet: normalize_opt(config.revenue_wallet)?,
            gas_limit: config.gas_limit,
            signer,
            send_lock: Mutex::new(()),
        };

        match chain.signer_address() {
            Some(addr) => info!("Chain client ready, signing as {}", addr),
            None => info!("Chain client ready (read-only)"),
        }
        Ok(chain)
    }

    pub fn token_address(&self) -> Option<&str> {
        self.token_address.as_deref()
    }

    pub fn escrow_address(&self) -> Option<&str> {
        self.escrow_address.as_deref()
    }

    pub fn revenue_wallet(&self) -> Option<&str> {
        self.revenue_wallet.as_deref()
    }

    /// The configured chain id, without querying the node.
    pub fn configured_chain_id(&self) -> Option<u64> {
        self.chain_id.get().copied()
    }

    pub fn signer_address(&self) -> Option<&str> {
        self.signer.as_ref().map(Wallet::address)
    }

    pub fn writes_enabled(&self) -> bool {
        self.signer.is_some()
    }

    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        self.chain_id
            .get_or_try_init(|| self.rpc.chain_id())
            .await
            .copied()
    }

    // -- Trust token (ERC-20) --

    pub async fn token_balance(&self, owner: &str) -> Result<u128, ChainError> {
        let token = self.require_token()?;
        let data = encode_call("balanceOf(address)", &[Token::Address(parse_address(owner)?)]);
        decode_uint(&self.rpc.eth_call(token, &data).await?)
    }

    pub async fn transfer(&self, to: &str, amount: u128) -> Result<String, ChainError> {
        let token = parse_address(self.require_token()?)?;
        let data = encode_call(
            "transfer(address,uint256)",
            &[Token::Address(parse_address(to)?), Token::Uint(amount)],
        );
        self.send_transaction(token, data).await
    }

    pub async fn approve(&self, spender: &str, amount: u128) -> Result<String, ChainError> {
        let token = parse_address(self.require_token()?)?;
        let data = encode_call(
            "approve(address,uint256)",
            &[Token::Address(parse_address(spender)?), Token::Uint(amount)],
        );
        self.send_transaction(token, data).await
    }

    // -- NFTs (ERC-721) --

    pub async fn owner_of(&self, contract: &str, token_id: u128) -> Result<String, ChainError> {
        parse_address(contract)?;
        let data = encode_call("ownerOf(uint256)", &[Token::Uint(token_id)]);
        decode_address(&self.rpc.eth_call(contract, &data).await?)
    }

    pub async fn is_owner_of(
        &self,
        contract: &str,
        token_id: u128,
        address: &str,
    ) -> Result<bool, ChainError> {
        let expected = trustquests_types::normalize_address(address)?;
        Ok(self.owner_of(contract, token_id).await? == expected)
    }

    // -- Quest escrow --

    /// Amount currently escrowed for `escrow_id`, in raw token units.
    pub async fn quest_deposit(&self, escrow_id: u64) -> Result<u128, ChainError> {
        let escrow = self.require_escrow()?;
        let data = encode_call("getQuestDeposit(uint256)", &[Token::Uint(u128::from(escrow_id))]);
        decode_uint(&self.rpc.eth_call(escrow, &data).await?)
    }

    /// Requires a prior `approve` of the escrow for `amount`.
    pub async fn deposit(&self, escrow_id: u64, amount: u128) -> Result<String, ChainError> {
        let escrow = parse_address(self.require_escrow()?)?;
        let data = encode_call(
            "deposit(uint256,uint256)",
            &[Token::Uint(u128::from(escrow_id)), Token::Uint(amount)],
        );
        self.send_transaction(escrow, data).await
    }

    pub async fn set_winners(&self, escrow_id: u64, winners: &[String]) -> Result<String, ChainError> {
        let escrow = parse_address(self.require_escrow()?)?;
        let winners = winners
            .iter()
            .map(|w| parse_address(w))
            .collect::<Result<Vec<_>, _>>()?;
        let data = encode_call(
            "setWinners(uint256,address[])",
            &[Token::Uint(u128::from(escrow_id)), Token::AddressArray(winners)],
        );
        self.send_transaction(escrow, data).await
    }

    pub async fn distribute_rewards(&self, escrow_id: u64) -> Result<String, ChainError> {
        let escrow = parse_address(self.require_escrow()?)?;
        let data = encode_call("distributeRewards(uint256)", &[Token::Uint(u128::from(escrow_id))]);
        self.send_transaction(escrow, data).await
    }

    async fn send_transaction(&self, to: abi::Address, data: Vec<u8>) -> Result<String, ChainError> {
        let signer = self.signer.as_ref().ok_or(ChainError::NotConfigured("PRIVATE_KEY"))?;
        let chain_id = self.chain_id().await?;

        let _guard = self.send_lock.lock().await;
        let nonce = self.rpc.transaction_count(signer.address()).await?;
        let gas_price = self.rpc.gas_price().await?;

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit: self.gas_limit,
            to,
            value: 0,
            data,
            chain_id,
        };
        let raw = tx.sign(signer)?;
        debug!(nonce, gas_price = %gas_price, "submitting transaction to {}", abi::format_address(&to));

        let hash = self.rpc.send_raw_transaction(&raw).await?;
        info!("Submitted transaction {}", hash);
        Ok(hash)
    }

    fn require_token(&self) -> Result<&str, ChainError> {
        self.token_address().ok_or(ChainError::NotConfigured("TRUST_TOKEN_ADDRESS"))
    }

    fn require_escrow(&self) -> Result<&str, ChainError> {
        self.escrow_address().ok_or(ChainError::NotConfigured("ESCROW_ADDRESS"))
    }
}

fn normalize_opt(raw: Option<String>) -> Result<Option<String>, ChainError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(addr) => Ok(Some(trustquests_types::normalize_address(addr)?)),
    }
}
