use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountingError {
  #[error("division by zero - pool has no LP supply yet")]
  DivisionByZero,

  #[error("math overflow - values exceeded u64 bounds")]
  MathOverflow,

  #[error("amount must be greater than zero")]
  ZeroAmount,

  #[error("reconciliation failed on {check}: expected {expected}, observed {actual}")]
  ReconciliationFailure {
    check: &'static str,
    expected: u64,
    actual: u64,
  },

  #[error(
    "withdraw fee not collected: {amount_withdrawn} withdrawn at {fee_bips} bips, \
     fee receiver balance {balance_before} -> {balance_after}"
  )]
  FeeNotCollected {
    amount_withdrawn: u64,
    fee_bips: u64,
    balance_before: u64,
    balance_after: u64,
  },

  #[error("cannot burn {burn} LP out of a total supply of {supply}")]
  BurnExceedsSupply { burn: u64, supply: u64 },

  #[error("deposit of {amount} is below the pool minimum of {min_deposit}")]
  DepositBelowMinimum { amount: u64, min_deposit: u64 },

  #[error("deposit of {amount} on top of {pooled} pooled liquidity reaches the cap of {cap}")]
  LiquidityCapExceeded { amount: u64, pooled: u64, cap: u64 },

  #[error("burning {lp_amount} LP pays out nothing (gross redeem {redeem})")]
  DustWithdraw { lp_amount: u64, redeem: u64 },

  #[error("rewards last sold at slot {last_sold_slot}, ledger is at slot {current_slot}; claim and sell first")]
  HarvestStale { last_sold_slot: u64, current_slot: u64 },

  #[error("invalid pool configuration: {0}")]
  InvalidPoolConfig(&'static str),
}
