//! Proportional accounting engine for Pole liquidity pools.
//!
//! LP share math, fee deduction and the tolerance checks run against ledger
//! balances sampled around a settlement batch. Nothing in this crate knows
//! about addresses or transactions.

pub mod accounting;
pub mod constants;
pub mod error;
pub mod invariants;
pub mod math;

pub use accounting::{DepositExpectation, DepositObservation};
pub use error::AccountingError;
pub use invariants::PoolParams;
pub use math::Wad;
