//! Ports to the external ledgers
//!
//! The orchestrator reads state through [`LedgerReader`] and submits
//! batches through [`Transport`]. Signing, RPC and confirmation policy all
//! live behind these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use thiserror::Error;

use crate::batch::SettlementBatch;

/// Lending reserve fields the flows depend on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveSnapshot {
  pub available_liquidity: u64,
  pub liquidity_mint: Pubkey,
  pub liquidity_supply: Pubkey,
  pub fee_receiver: Pubkey,
  pub collateral_mint: Pubkey,
  pub collateral_supply: Pubkey,
  pub lending_market: Pubkey,
  pub staking_pool: Pubkey,
  pub oracle: Option<Pubkey>,
}

/// Reserves an obligation is registered against, in refresh order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationSnapshot {
  pub deposit_reserves: Vec<Pubkey>,
  pub borrow_reserves: Vec<Pubkey>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
  pub request_queue: Pubkey,
  pub event_queue: Pubkey,
  pub bids: Pubkey,
  pub asks: Pubkey,
  pub coin_vault: Pubkey,
  pub pc_vault: Pubkey,
  pub vault_signer_nonce: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
  #[error("account {0} not found")]
  AccountNotFound(Pubkey),

  #[error("account {address} is not a {expected}")]
  WrongAccountType { address: Pubkey, expected: &'static str },

  #[error("{0}")]
  Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
  #[error("rejected at step {step:?}: {reason}")]
  Rejected { step: Option<usize>, reason: String },

  #[error("timed out waiting for confirmation")]
  TimedOut,

  #[error("transport unavailable: {0}")]
  Unavailable(String),
}

/// A landed batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Confirmation {
  pub signature: Signature,
  pub logs: Vec<String>,
}

#[async_trait]
pub trait LedgerReader: Send + Sync {
  /// Raw account data
  async fn account_data(&self, address: &Pubkey) -> Result<Vec<u8>, LedgerError>;

  /// Token account balance in base units
  async fn token_balance(&self, address: &Pubkey) -> Result<u64, LedgerError>;

  async fn reserve(&self, address: &Pubkey) -> Result<ReserveSnapshot, LedgerError>;

  async fn obligation(&self, address: &Pubkey) -> Result<ObligationSnapshot, LedgerError>;

  async fn market(&self, address: &Pubkey) -> Result<MarketSnapshot, LedgerError>;

  /// Slot the ledger has most recently processed
  async fn current_slot(&self) -> Result<u64, LedgerError>;
}

#[async_trait]
pub trait Transport: Send + Sync {
  /// Sign as `payer`, submit atomically and wait for a definite outcome.
  async fn submit(&self, batch: &SettlementBatch, payer: &Pubkey) -> Result<Confirmation, TransportError>;
}
