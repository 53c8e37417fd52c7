//! Proportional accounting for pooled liquidity
//!
//! Every function here is pure. Callers sample ledger balances, pass them
//! in, and get back either the amount a participant is entitled to or a
//! typed verdict on what the ledger actually did.

use serde::{Deserialize, Serialize};

use crate::constants::{
  BPS_PRECISION, DEPOSIT_LOWER_BAND_BPS, DEPOSIT_STRICT_BAND_BPS, DEPOSIT_STRICT_BAND_THRESHOLD,
  MAX_WITHDRAW_FEE_BIPS, WITHDRAW_LOWER_BAND_BPS,
};
use crate::error::AccountingError;
use crate::math::{mul_bps_down, mul_bps_up, mul_div_down, Wad};

type Result<T> = std::result::Result<T, AccountingError>;

/// Share of the LP supply represented by `amount`.
///
/// # Errors
/// `DivisionByZero` when the pool has not minted any LP yet
pub fn lp_share_percentage(amount: u64, total_lp_supply: u64) -> Result<Wad> {
  if total_lp_supply == 0 {
    return Err(AccountingError::DivisionByZero);
  }
  Wad::from_ratio(amount, total_lp_supply).ok_or(AccountingError::MathOverflow)
}

/// Liquidity the pool controls: its own idle supply plus what it has parked
/// in the reserve. Both inputs must come from the same refreshed snapshot.
pub fn pooled_liquidity(pool_supply_balance: u64, reserve_available: u64) -> Result<u64> {
  pool_supply_balance
    .checked_add(reserve_available)
    .ok_or(AccountingError::MathOverflow)
}

/// LP units minted per unit of pooled liquidity.
///
/// A pool with no LP or no liquidity trades 1:1.
pub fn exchange_rate(lp_supply: u64, pooled: u64) -> Result<Wad> {
  if lp_supply == 0 || pooled == 0 {
    return Ok(Wad::ONE);
  }
  Wad::from_ratio(lp_supply, pooled).ok_or(AccountingError::MathOverflow)
}

pub fn liquidity_to_lp(rate: Wad, liquidity: u64) -> Result<u64> {
  rate.mul_floor(liquidity).ok_or(AccountingError::MathOverflow)
}

pub fn lp_to_liquidity(rate: Wad, lp: u64) -> Result<u64> {
  if rate.is_zero() {
    return Err(AccountingError::DivisionByZero);
  }
  rate.div_floor(lp).ok_or(AccountingError::MathOverflow)
}

/// Gross liquidity released by burning `lp_burned`, before fees.
///
/// `floor(lp_burned * pooled / lp_supply)`
pub fn redeem_amount_for_lp(lp_burned: u64, lp_supply: u64, pooled: u64) -> Result<u64> {
  if lp_supply == 0 {
    return Err(AccountingError::DivisionByZero);
  }
  if lp_burned > lp_supply {
    return Err(AccountingError::BurnExceedsSupply {
      burn: lp_burned,
      supply: lp_supply,
    });
  }
  mul_div_down(lp_burned, pooled, lp_supply).ok_or(AccountingError::MathOverflow)
}

/// Split a gross redemption into (net to participant, fee to receiver).
///
/// The fee rounds up, so any non-zero redemption at a non-zero rate pays a
/// fee of at least one unit.
pub fn split_withdraw_fee(redeem: u64, fee_bips: u64) -> Result<(u64, u64)> {
  if fee_bips > MAX_WITHDRAW_FEE_BIPS {
    return Err(AccountingError::InvalidPoolConfig("withdraw fee above 10000 bips"));
  }
  let fee = mul_bps_up(redeem, fee_bips).ok_or(AccountingError::MathOverflow)?;
  let net = redeem.checked_sub(fee).ok_or(AccountingError::MathOverflow)?;
  Ok((net, fee))
}

/// Ledger balances sampled around a settled deposit batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositObservation {
  /// Amount the participant asked to deposit
  pub requested: u64,
  /// Reserve available liquidity before the batch
  pub reserve_before: u64,
  /// Reserve available liquidity after the batch
  pub reserve_after: u64,
  /// LP units the participant gained
  pub lp_minted: u64,
  /// Pool LP supply after the batch
  pub lp_supply_after: u64,
}

/// What a deposit should have produced, derived from a [`DepositObservation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositExpectation {
  /// Liquidity backing the minted LP at the post-batch rate
  pub liquidity_should_have: u64,
  /// LP the marginal reserve gain is worth at the pre-batch rate
  pub expected_lp_gain: u64,
  /// Reserve liquidity the batch actually added
  pub reserve_gain: u64,
}

/// Derive the deposit expectation from observed balances.
///
/// LP minted must be proportional to the liquidity the reserve actually
/// gained, not to the requested amount, since the reserve applies its own
/// exchange rate.
pub fn expected_liquidity_for_deposit(obs: &DepositObservation) -> Result<DepositExpectation> {
  if obs.lp_supply_after == 0 {
    return Err(AccountingError::DivisionByZero);
  }
  let reserve_gain = obs.reserve_after.checked_sub(obs.reserve_before).ok_or(
    AccountingError::ReconciliationFailure {
      check: "reserve liquidity decreased during deposit",
      expected: obs.reserve_before,
      actual: obs.reserve_after,
    },
  )?;
  let lp_supply_before = obs.lp_supply_after.checked_sub(obs.lp_minted).ok_or(
    AccountingError::BurnExceedsSupply {
      burn: obs.lp_minted,
      supply: obs.lp_supply_after,
    },
  )?;

  let liquidity_should_have = mul_div_down(obs.reserve_after, obs.lp_minted, obs.lp_supply_after)
    .ok_or(AccountingError::MathOverflow)?;

  let expected_lp_gain = if obs.reserve_before == 0 || lp_supply_before == 0 {
    reserve_gain
  } else {
    mul_div_down(reserve_gain, lp_supply_before, obs.reserve_before)
      .ok_or(AccountingError::MathOverflow)?
  };

  Ok(DepositExpectation {
    liquidity_should_have,
    expected_lp_gain,
    reserve_gain,
  })
}

/// Check a settled deposit against its tolerance bands.
///
/// * never more than requested
/// * at least 95% of requested
/// * at least 99.99% of requested once the amount is large enough that
///   rounding no longer dominates
/// * on a reserve that held nothing, reserve gain equals LP minted exactly
/// * otherwise LP minted never exceeds what the whole reserve gain is worth
///   at the pre-batch rate
pub fn verify_deposit(obs: &DepositObservation) -> Result<DepositExpectation> {
  if obs.requested == 0 {
    return Err(AccountingError::ZeroAmount);
  }
  let expectation = expected_liquidity_for_deposit(obs)?;
  let have = expectation.liquidity_should_have;

  if have > obs.requested {
    return Err(AccountingError::ReconciliationFailure {
      check: "deposit credited more than requested",
      expected: obs.requested,
      actual: have,
    });
  }

  let floor = mul_bps_up(obs.requested, DEPOSIT_LOWER_BAND_BPS).ok_or(AccountingError::MathOverflow)?;
  if have < floor {
    return Err(AccountingError::ReconciliationFailure {
      check: "deposit credited below 95% of requested",
      expected: floor,
      actual: have,
    });
  }

  if obs.requested >= DEPOSIT_STRICT_BAND_THRESHOLD {
    let strict = mul_bps_up(obs.requested, DEPOSIT_STRICT_BAND_BPS).ok_or(AccountingError::MathOverflow)?;
    if have < strict {
      return Err(AccountingError::ReconciliationFailure {
        check: "deposit credited below 99.99% of requested",
        expected: strict,
        actual: have,
      });
    }
  }

  if obs.reserve_before == 0 && expectation.reserve_gain != obs.lp_minted {
    return Err(AccountingError::ReconciliationFailure {
      check: "first deposit must mint LP equal to reserve gain",
      expected: expectation.reserve_gain,
      actual: obs.lp_minted,
    });
  }

  // Idle liquidity swept in with the deposit inflates the reserve gain, so
  // only the upper side is checked.
  if obs.lp_minted > expectation.expected_lp_gain {
    return Err(AccountingError::ReconciliationFailure {
      check: "deposit minted more LP than the reserve gain is worth",
      expected: expectation.expected_lp_gain,
      actual: obs.lp_minted,
    });
  }

  Ok(expectation)
}

/// Net liquidity a participant receives for burning `lp_burned`.
///
/// `floor(pooled * lp_burned / lp_supply * (10000 - fee_bips) / 10000)`,
/// evaluated exactly with a single final floor.
pub fn expected_liquidity_for_withdraw(
  lp_burned: u64,
  lp_supply_before: u64,
  pooled_before: u64,
  fee_bips: u64,
) -> Result<u64> {
  if lp_supply_before == 0 {
    return Err(AccountingError::DivisionByZero);
  }
  if lp_burned > lp_supply_before {
    return Err(AccountingError::BurnExceedsSupply {
      burn: lp_burned,
      supply: lp_supply_before,
    });
  }
  if fee_bips > MAX_WITHDRAW_FEE_BIPS {
    return Err(AccountingError::InvalidPoolConfig("withdraw fee above 10000 bips"));
  }

  let supply = lp_supply_before as u128;
  let keep = (BPS_PRECISION - fee_bips) as u128;
  let share = pooled_before as u128 * lp_burned as u128;
  let (q, r) = (share / supply, share % supply);

  // q <= pooled and r < supply, so neither product leaves u128
  let scaled = q
    .checked_mul(keep)
    .and_then(|v| v.checked_add(r * keep / supply))
    .ok_or(AccountingError::MathOverflow)?;

  u64::try_from(scaled / BPS_PRECISION as u128).map_err(|_| AccountingError::MathOverflow)
}

/// Realized payout must not exceed the expectation and must reach 99.9% of it.
///
/// The band floor rounds down: the fee's round-up can cost the participant
/// one unit, which for small payouts is the whole band.
pub fn verify_withdraw_payout(expected_net: u64, realized_net: u64) -> Result<()> {
  if realized_net > expected_net {
    return Err(AccountingError::ReconciliationFailure {
      check: "withdraw paid more than the proportional share",
      expected: expected_net,
      actual: realized_net,
    });
  }
  let floor = mul_bps_down(expected_net, WITHDRAW_LOWER_BAND_BPS).ok_or(AccountingError::MathOverflow)?;
  if realized_net < floor {
    return Err(AccountingError::ReconciliationFailure {
      check: "withdraw paid below 99.9% of the proportional share",
      expected: floor,
      actual: realized_net,
    });
  }
  Ok(())
}

/// A non-zero withdraw at a non-zero fee rate must grow the fee receiver.
pub fn verify_fee_collected(
  balance_before: u64,
  balance_after: u64,
  amount_withdrawn: u64,
  fee_bips: u64,
) -> Result<()> {
  if amount_withdrawn > 0 && fee_bips > 0 && balance_after <= balance_before {
    return Err(AccountingError::FeeNotCollected {
      amount_withdrawn,
      fee_bips,
      balance_before,
      balance_after,
    });
  }
  Ok(())
}
