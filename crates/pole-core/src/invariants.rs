//! Invariant assertions for Pole pools
//! Checked before a batch is built and again after it settles

use serde::{Deserialize, Serialize};

use crate::constants::{
  MAX_ITERATION_COUNT, MAX_RESERVE_PERCENTAGE, MAX_WITHDRAW_FEE_BIPS, MIN_DEPOSIT_FLOOR,
  MIN_LIQUIDITY_CAP, STALE_SLOT,
};
use crate::error::AccountingError;

type Result<T> = std::result::Result<T, AccountingError>;

/// Pool parameters that bound settlement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParams {
  pub iteration_count: u64,
  pub reserve_percentage: u64,
  pub min_deposit: u64,
  pub withdraw_fee_bips: u64,
  pub liquidity_cap: u64,
}

/// Assert every pool parameter is inside the range the pool program accepts.
pub fn assert_pool_params_valid(params: &PoolParams) -> Result<()> {
  if params.iteration_count == 0 || params.iteration_count >= MAX_ITERATION_COUNT {
    return Err(AccountingError::InvalidPoolConfig("iteration count must be in [1, 10)"));
  }
  if params.reserve_percentage >= MAX_RESERVE_PERCENTAGE {
    return Err(AccountingError::InvalidPoolConfig("reserve percentage must be below 10"));
  }
  assert_min_deposit_valid(params.min_deposit)?;
  if params.withdraw_fee_bips > MAX_WITHDRAW_FEE_BIPS {
    return Err(AccountingError::InvalidPoolConfig("withdraw fee above 10000 bips"));
  }
  assert_liquidity_cap_valid(params.liquidity_cap)
}

/// A pool whose minimum deposit is at or below the floor fails
/// [`assert_pool_params_valid`] and can no longer be settled against.
pub fn assert_min_deposit_valid(min_deposit: u64) -> Result<()> {
  if min_deposit <= MIN_DEPOSIT_FLOOR {
    return Err(AccountingError::InvalidPoolConfig("min deposit must be greater than 10"));
  }
  Ok(())
}

pub fn assert_liquidity_cap_valid(cap: u64) -> Result<()> {
  if cap < MIN_LIQUIDITY_CAP {
    return Err(AccountingError::InvalidPoolConfig("liquidity cap below 1000000"));
  }
  Ok(())
}

/// Assert a deposit can enter the pool.
///
/// # Arguments
/// * `amount` - Requested deposit
/// * `pooled` - Liquidity already pooled (idle supply plus reserve share)
/// * `cap` - Pool liquidity cap; reaching it is rejected
/// * `min_deposit` - Pool minimum deposit
pub fn assert_deposit_admissible(amount: u64, pooled: u64, cap: u64, min_deposit: u64) -> Result<()> {
  if amount == 0 {
    return Err(AccountingError::ZeroAmount);
  }
  if amount < min_deposit {
    return Err(AccountingError::DepositBelowMinimum { amount, min_deposit });
  }
  let total = pooled.checked_add(amount).ok_or(AccountingError::MathOverflow)?;
  if total >= cap {
    return Err(AccountingError::LiquidityCapExceeded { amount, pooled, cap });
  }
  Ok(())
}

/// Assert the pool sold its rewards recently enough to settle.
///
/// A pool that has never sold (`last_sold_slot == 0`) passes only when
/// `never_sold_ok`, which deposits set and withdraws do not. A ledger slot
/// behind the last sale counts as fresh.
pub fn assert_harvest_fresh(last_sold_slot: u64, current_slot: u64, never_sold_ok: bool) -> Result<()> {
  if last_sold_slot == 0 && never_sold_ok {
    return Ok(());
  }
  if current_slot.saturating_sub(last_sold_slot) > STALE_SLOT {
    return Err(AccountingError::HarvestStale {
      last_sold_slot,
      current_slot,
    });
  }
  Ok(())
}

/// Assert the pool LP supply grew by exactly what the participant received.
pub fn assert_mint_matches_supply(supply_before: u64, supply_after: u64, lp_minted: u64) -> Result<()> {
  let delta = supply_after.checked_sub(supply_before).ok_or(AccountingError::ReconciliationFailure {
    check: "LP supply shrank during deposit",
    expected: supply_before,
    actual: supply_after,
  })?;
  if delta != lp_minted {
    return Err(AccountingError::ReconciliationFailure {
      check: "LP supply delta differs from LP minted",
      expected: lp_minted,
      actual: delta,
    });
  }
  Ok(())
}

/// Assert the pool LP supply shrank by exactly what the participant burned.
pub fn assert_burn_matches_supply(supply_before: u64, supply_after: u64, lp_burned: u64) -> Result<()> {
  let delta = supply_before.checked_sub(supply_after).ok_or(AccountingError::ReconciliationFailure {
    check: "LP supply grew during withdraw",
    expected: supply_before,
    actual: supply_after,
  })?;
  if delta != lp_burned {
    return Err(AccountingError::ReconciliationFailure {
      check: "LP supply delta differs from LP burned",
      expected: lp_burned,
      actual: delta,
    });
  }
  Ok(())
}

/// Assert participant LP balances add up to the pool LP supply.
pub fn assert_lp_balances_sum(balances: &[u64], lp_supply: u64) -> Result<()> {
  let sum = balances
    .iter()
    .try_fold(0u64, |acc, b| acc.checked_add(*b))
    .ok_or(AccountingError::MathOverflow)?;
  if sum != lp_supply {
    return Err(AccountingError::ReconciliationFailure {
      check: "participant LP balances differ from LP supply",
      expected: lp_supply,
      actual: sum,
    });
  }
  Ok(())
}
