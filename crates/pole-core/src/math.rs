//! Fixed-point helpers for pool accounting
//! All intermediates are widened to u128 and checked, nothing here touches floats

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{BPS_PRECISION, WAD};

/// Multiply two u64 values and divide by a third, rounding up
/// Used where the pool must never under-charge (withdraw fees)
/// Returns None on overflow or zero divisor
pub fn mul_div_up(a: u64, b: u64, c: u64) -> Option<u64> {
  if c == 0 {
    return None;
  }

  let result = (a as u128)
    .checked_mul(b as u128)?
    .checked_add((c - 1) as u128)? // (c - 1) before division rounds up
    .checked_div(c as u128)?;

  u64::try_from(result).ok()
}

/// Multiply two u64 values and divide by a third, rounding DOWN
/// Used wherever a participant is paid, so payouts never exceed the exact share
/// Returns None on overflow or zero divisor
pub fn mul_div_down(a: u64, b: u64, c: u64) -> Option<u64> {
  if c == 0 {
    return None;
  }

  let result = (a as u128)
    .checked_mul(b as u128)?
    .checked_div(c as u128)?;

  u64::try_from(result).ok()
}

/// Scale `amount` by a basis-point rate, rounding down
pub fn mul_bps_down(amount: u64, bps: u64) -> Option<u64> {
  mul_div_down(amount, bps, BPS_PRECISION)
}

/// Scale `amount` by a basis-point rate, rounding up
pub fn mul_bps_up(amount: u64, bps: u64) -> Option<u64> {
  mul_div_up(amount, bps, BPS_PRECISION)
}

/// Unsigned fixed-point ratio with 18 decimals.
///
/// Holds any `u64 / u64` ratio without loss of the integer part, which is
/// enough for LP share percentages and LP/liquidity exchange rates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Wad(u128);

impl Wad {
  pub const ZERO: Wad = Wad(0);
  pub const ONE: Wad = Wad(WAD);

  pub const fn from_raw(raw: u128) -> Self {
    Wad(raw)
  }

  pub const fn raw(self) -> u128 {
    self.0
  }

  /// `numerator / denominator`, rounded down to 18 decimals
  ///
  /// # Returns
  /// None when `denominator` is zero
  pub fn from_ratio(numerator: u64, denominator: u64) -> Option<Self> {
    if denominator == 0 {
      return None;
    }
    // u64::MAX * 1e18 < u128::MAX
    let scaled = (numerator as u128).checked_mul(WAD)?;
    Some(Wad(scaled / denominator as u128))
  }

  /// `floor(self * amount)`
  ///
  /// Splits the ratio into integer and fractional parts so the product
  /// never needs more than 128 bits for any `u64` amount.
  pub fn mul_floor(self, amount: u64) -> Option<u64> {
    let whole = (self.0 / WAD).checked_mul(amount as u128)?;
    let frac = (self.0 % WAD) * amount as u128 / WAD;
    u64::try_from(whole.checked_add(frac)?).ok()
  }

  /// `floor(amount / self)`
  ///
  /// # Returns
  /// None when the ratio is zero or the quotient does not fit in u64
  pub fn div_floor(self, amount: u64) -> Option<u64> {
    if self.0 == 0 {
      return None;
    }
    let scaled = (amount as u128).checked_mul(WAD)?;
    u64::try_from(scaled / self.0).ok()
  }

  pub fn is_zero(self) -> bool {
    self.0 == 0
  }
}

impl fmt::Display for Wad {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{:018}", self.0 / WAD, self.0 % WAD)
  }
}
