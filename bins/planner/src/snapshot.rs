//! Pool state supplied to the planner as a JSON file, since it never
//! reads the ledger itself.

use anyhow::{Context, Result};
use pole_chain::programs::parse_address;
use pole_chain::{PoolAccount, ProgramIds};
use pole_tx::{ObligationSnapshot, ReserveSnapshot};
use serde::Deserialize;
use solana_pubkey::Pubkey;

/// Base58 addresses as they appear on an explorer.
#[derive(Debug, Deserialize)]
pub struct PoolSnapshotFile {
  pub lp_mint: String,
  pub liquidity_supply: String,
  pub fee_receiver: String,
  pub obligation: String,
  pub reserve_address: String,
  pub stake_account: String,
  /// Pool's collateral token account
  pub collateral_wallet: String,
  pub iteration_count: u64,
  pub reserve: ReserveFile,
  #[serde(default)]
  pub obligation_deposit_reserves: Vec<String>,
  #[serde(default)]
  pub obligation_borrow_reserves: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReserveFile {
  pub liquidity_mint: String,
  pub liquidity_supply: String,
  pub fee_receiver: String,
  pub collateral_mint: String,
  pub collateral_supply: String,
  pub lending_market: String,
  pub staking_pool: String,
  pub oracle: Option<String>,
  #[serde(default)]
  pub available_liquidity: u64,
}

pub struct PoolSnapshot {
  pub pool: PoolAccount,
  pub reserve: ReserveSnapshot,
  pub obligation: ObligationSnapshot,
}

fn addresses(name: &'static str, values: &[String]) -> Result<Vec<Pubkey>> {
  values
    .iter()
    .map(|v| parse_address(name, v).map_err(Into::into))
    .collect()
}

impl PoolSnapshotFile {
  pub async fn load(path: &str) -> Result<Self> {
    let raw = tokio::fs::read_to_string(path)
      .await
      .with_context(|| format!("reading pool snapshot {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing pool snapshot {path}"))
  }

  pub fn into_snapshot(self, programs: &ProgramIds) -> Result<PoolSnapshot> {
    let r = &self.reserve;
    let reserve = ReserveSnapshot {
      available_liquidity: r.available_liquidity,
      liquidity_mint: parse_address("reserve.liquidity_mint", &r.liquidity_mint)?,
      liquidity_supply: parse_address("reserve.liquidity_supply", &r.liquidity_supply)?,
      fee_receiver: parse_address("reserve.fee_receiver", &r.fee_receiver)?,
      collateral_mint: parse_address("reserve.collateral_mint", &r.collateral_mint)?,
      collateral_supply: parse_address("reserve.collateral_supply", &r.collateral_supply)?,
      lending_market: parse_address("reserve.lending_market", &r.lending_market)?,
      staking_pool: parse_address("reserve.staking_pool", &r.staking_pool)?,
      oracle: r
        .oracle
        .as_deref()
        .map(|o| parse_address("reserve.oracle", o))
        .transpose()?,
    };

    let mut pool = PoolAccount::default();
    pool.generic_config.fee_receiver = parse_address("fee_receiver", &self.fee_receiver)?;
    pool.generic_config.lp_mint = parse_address("lp_mint", &self.lp_mint)?;
    pool.generic_config.liquidity_supply = parse_address("liquidity_supply", &self.liquidity_supply)?;
    pool.generic_config.token_program = programs.token;
    pool.port_config.obligation = parse_address("obligation", &self.obligation)?;
    pool.port_config.reserve = parse_address("reserve", &self.reserve_address)?;
    pool.port_config.stake_account = parse_address("stake_account", &self.stake_account)?;
    pool.port_config.port_lp_supply = parse_address("collateral_wallet", &self.collateral_wallet)?;
    pool.port_config.port_lending_program = programs.port_lending;
    pool.port_config.port_staking_program = programs.port_staking;
    pool.port_config.port_iterate = self.iteration_count;

    let obligation = ObligationSnapshot {
      deposit_reserves: addresses("obligation_deposit_reserves", &self.obligation_deposit_reserves)?,
      borrow_reserves: addresses("obligation_borrow_reserves", &self.obligation_borrow_reserves)?,
    };

    Ok(PoolSnapshot {
      pool,
      reserve,
      obligation,
    })
  }
}
