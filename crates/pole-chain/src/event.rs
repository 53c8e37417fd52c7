//! Pool program events recovered from transaction logs
//!
//! An event is logged as `Program data: <base64>` where the payload is
//! `sha256("event:<Name>")[..8]` followed by the Borsh-encoded fields.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use borsh::BorshDeserialize;

use crate::instruction::sighash;

pub const PROGRAM_DATA_PREFIX: &str = "Program data: ";

#[derive(BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DidDeposit {
  pub liquidity_amount_deposited: u64,
  pub lp_amount_minted: u64,
}

#[derive(BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DidRedeem {
  pub liquidity_amount_redeemed: u64,
  pub lp_amount_burned: u64,
}

#[derive(BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DidSell {
  pub base_amount: u64,
  pub slot: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoleEvent {
  Deposit(DidDeposit),
  Redeem(DidRedeem),
  Sell(DidSell),
}

impl PoleEvent {
  /// Decode one log line. Lines that are not pool events yield `None`.
  pub fn from_log(line: &str) -> Option<Self> {
    let payload = line.strip_prefix(PROGRAM_DATA_PREFIX)?;
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    if bytes.len() < 8 {
      return None;
    }
    let (disc, mut body) = bytes.split_at(8);

    if disc == sighash("event", "DidDeposit") {
      DidDeposit::deserialize(&mut body).ok().map(PoleEvent::Deposit)
    } else if disc == sighash("event", "DidRedeem") {
      DidRedeem::deserialize(&mut body).ok().map(PoleEvent::Redeem)
    } else if disc == sighash("event", "DidSell") {
      DidSell::deserialize(&mut body).ok().map(PoleEvent::Sell)
    } else {
      None
    }
  }
}

/// All pool events in log order.
pub fn parse_events<S: AsRef<str>>(logs: &[S]) -> Vec<PoleEvent> {
  logs.iter().filter_map(|l| PoleEvent::from_log(l.as_ref())).collect()
}
