//! Lending program refresh instructions
//!
//! Single-byte tagged, no arguments. A refresh recomputes the reserve
//! exchange rate, or the obligation's deposited and borrowed value.

use solana_instruction::{AccountMeta, Instruction};
use solana_pubkey::Pubkey;

use crate::programs::sysvar;

pub const REFRESH_RESERVE_TAG: u8 = 3;
pub const REFRESH_OBLIGATION_TAG: u8 = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LendingInstruction {
  RefreshReserve,
  RefreshObligation,
}

impl LendingInstruction {
  pub fn decode(data: &[u8]) -> Option<Self> {
    match data {
      [REFRESH_RESERVE_TAG] => Some(LendingInstruction::RefreshReserve),
      [REFRESH_OBLIGATION_TAG] => Some(LendingInstruction::RefreshObligation),
      _ => None,
    }
  }
}

/// Accounts: `[reserve w, clock, oracle?]`
pub fn refresh_reserve(program_id: &Pubkey, reserve: &Pubkey, oracle: Option<&Pubkey>) -> Instruction {
  let mut accounts = vec![
    AccountMeta::new(*reserve, false),
    AccountMeta::new_readonly(sysvar::CLOCK, false),
  ];
  if let Some(oracle) = oracle {
    accounts.push(AccountMeta::new_readonly(*oracle, false));
  }
  Instruction::new_with_bytes(*program_id, &[REFRESH_RESERVE_TAG], accounts)
}

/// Accounts: `[obligation w, clock, deposit reserves.., borrow reserves..]`
///
/// Empty reserve sets are valid; the refresh then only stamps the slot.
pub fn refresh_obligation(
  program_id: &Pubkey,
  obligation: &Pubkey,
  deposit_reserves: &[Pubkey],
  borrow_reserves: &[Pubkey],
) -> Instruction {
  let accounts = [
    AccountMeta::new(*obligation, false),
    AccountMeta::new_readonly(sysvar::CLOCK, false),
  ]
  .into_iter()
  .chain(
    deposit_reserves
      .iter()
      .chain(borrow_reserves)
      .map(|r| AccountMeta::new_readonly(*r, false)),
  )
  .collect();
  Instruction::new_with_bytes(*program_id, &[REFRESH_OBLIGATION_TAG], accounts)
}
