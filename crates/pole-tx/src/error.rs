use pole_chain::ChainError;
use pole_core::AccountingError;
use solana_pubkey::Pubkey;
use thiserror::Error;

use crate::transport::{LedgerError, TransportError};

#[derive(Debug, Error)]
pub enum SettlementError {
  #[error(transparent)]
  Accounting(#[from] AccountingError),

  #[error(transparent)]
  Chain(#[from] ChainError),

  #[error("{field} read back as {actual}, expected {expected}")]
  StateMismatch {
    field: &'static str,
    expected: String,
    actual: String,
  },

  /// Nothing in the batch applied. `step` indexes the flat step sequence.
  #[error("batch rejected at step {step:?}: {reason}")]
  BatchRejected { step: Option<usize>, reason: String },

  #[error("pool {pool} has a settlement in progress at leverage step {leverage}")]
  SettlementInProgress { pool: Pubkey, leverage: u64 },

  #[error("withdraw of {requested} LP exceeds balance {available}")]
  InsufficientBalance { requested: u64, available: u64 },

  #[error("ledger read failed: {0}")]
  Ledger(#[from] LedgerError),
}

impl From<TransportError> for SettlementError {
  fn from(err: TransportError) -> Self {
    match err {
      TransportError::Rejected { step, reason } => SettlementError::BatchRejected { step, reason },
      TransportError::TimedOut => SettlementError::BatchRejected {
        step: None,
        reason: "no confirmation before the transport deadline; final state unknown".to_string(),
      },
      TransportError::Unavailable(reason) => SettlementError::BatchRejected { step: None, reason },
    }
  }
}

pub type Result<T> = std::result::Result<T, SettlementError>;
