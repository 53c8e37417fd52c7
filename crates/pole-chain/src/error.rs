use solana_pubkey::{Pubkey, PubkeyError};
use thiserror::Error;

use crate::address::SearchDirection;

#[derive(Debug, Error)]
pub enum ChainError {
  #[error("no valid {direction:?} derivation under program {program} within {attempts} attempts")]
  DerivationExhausted {
    program: Pubkey,
    direction: SearchDirection,
    attempts: u16,
  },

  #[error("invalid derivation seeds: {0}")]
  InvalidSeeds(#[from] PubkeyError),

  #[error("invalid address for {name}: {value:?}")]
  InvalidAddress { name: &'static str, value: String },

  #[error(transparent)]
  Layout(#[from] LayoutError),

  #[error("failed to encode {what}: {reason}")]
  Encode { what: &'static str, reason: String },

  #[error("unknown instruction discriminator {0:?}")]
  UnknownInstruction([u8; 8]),
}

/// Failures decoding a persisted account.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
  #[error("{account} account too short: need {expected} bytes, got {actual}")]
  TooShort {
    account: &'static str,
    expected: usize,
    actual: usize,
  },

  #[error("{account} discriminator mismatch: got {actual:?}")]
  DiscriminatorMismatch { account: &'static str, actual: [u8; 8] },

  #[error("{account} account is malformed: {reason}")]
  Malformed { account: &'static str, reason: String },
}
