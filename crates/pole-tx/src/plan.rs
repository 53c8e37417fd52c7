//! Account resolution and batch assembly for each flow
//!
//! Everything here is synchronous and reads no ledger state; the
//! orchestrator samples snapshots and passes them in.

use pole_chain::address::associated_token_address;
use pole_chain::instruction::{
  self, HarvestAccounts, LiquidityAccounts, MarketAccounts, PortLendingAccounts, StakingAccounts,
};
use pole_chain::{lending, PoleInstruction, PoolAccount, ProgramIds};
use solana_pubkey::Pubkey;

use crate::batch::{BatchBuilder, SettlementBatch, StepKind};
use crate::context::SettlementContext;
use crate::error::{Result, SettlementError};
use crate::transport::{MarketSnapshot, ObligationSnapshot, ReserveSnapshot};

/// Addresses a deposit or withdraw touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettlementAccounts {
  pub liquidity: LiquidityAccounts,
  pub reserve: Pubkey,
  pub oracle: Option<Pubkey>,
  pub obligation: Pubkey,
  pub fee_receiver: Pubkey,
}

fn check_program(field: &'static str, configured: &Pubkey, recorded: &Pubkey) -> Result<()> {
  if configured != recorded {
    return Err(SettlementError::StateMismatch {
      field,
      expected: configured.to_string(),
      actual: recorded.to_string(),
    });
  }
  Ok(())
}

pub fn resolve_settlement_accounts(
  ctx: &SettlementContext,
  pool_address: Pubkey,
  pool: &PoolAccount,
  reserve: &ReserveSnapshot,
) -> Result<SettlementAccounts> {
  check_program(
    "port_lending_program",
    &ctx.programs.port_lending,
    &pool.port_config.port_lending_program,
  )?;

  let resolver = ctx.resolver();
  let generic = &pool.generic_config;
  let port = &pool.port_config;
  let (pool_authority, _) = resolver.pool_authority()?;

  let user_liquidity_wallet = ctx
    .user_liquidity_wallet
    .unwrap_or_else(|| associated_token_address(&ctx.payer, &reserve.liquidity_mint, &generic.token_program));

  let liquidity = LiquidityAccounts {
    pool: pool_address,
    pool_authority,
    user_liquidity_wallet,
    pool_liquidity_supply: generic.liquidity_supply,
    lp_mint: generic.lp_mint,
    user_lp_wallet: resolver.user_lp_wallet(&ctx.payer, &generic.lp_mint),
    port: PortLendingAccounts {
      pool_collateral_wallet: port.port_lp_supply,
      collateral_mint: reserve.collateral_mint,
      collateral_supply: reserve.collateral_supply,
      liquidity_mint: reserve.liquidity_mint,
      liquidity_supply: reserve.liquidity_supply,
      obligation: port.obligation,
      reserve: port.reserve,
      reserve_fee_receiver: reserve.fee_receiver,
      stake_account: port.stake_account,
      staking_pool: reserve.staking_pool,
      lending_market: reserve.lending_market,
      lending_market_authority: resolver.lending_market_authority(&reserve.lending_market)?,
      lending_program: port.port_lending_program,
      staking_program: port.port_staking_program,
    },
    user_transfer_authority: ctx.payer,
    token_program: generic.token_program,
  };

  Ok(SettlementAccounts {
    liquidity,
    reserve: port.reserve,
    oracle: reserve.oracle,
    obligation: port.obligation,
    fee_receiver: generic.fee_receiver,
  })
}

/// Where a harvest sells its rewards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HarvestTarget {
  pub market: Pubkey,
  /// Staking pool's reward token supply
  pub reward_supply: Pubkey,
}

pub fn resolve_harvest_accounts(
  ctx: &SettlementContext,
  pool_address: Pubkey,
  pool: &PoolAccount,
  reserve: &ReserveSnapshot,
  target: &HarvestTarget,
  market: &MarketSnapshot,
) -> Result<HarvestAccounts> {
  check_program("dex_program", &ctx.programs.dex, &pool.serum_config.dex_program)?;

  let resolver = ctx.resolver();
  let (pool_authority, _) = resolver.pool_authority()?;
  let (vault_signer, _) = resolver.vault_signer(&target.market, market.vault_signer_nonce)?;

  Ok(HarvestAccounts {
    pool: pool_address,
    pool_authority,
    liquidity_supply: pool.generic_config.liquidity_supply,
    reward_holding: pool.port_config.port_supply,
    market: MarketAccounts {
      market: target.market,
      open_orders: pool.serum_config.port_open_orders,
      request_queue: market.request_queue,
      event_queue: market.event_queue,
      bids: market.bids,
      asks: market.asks,
      coin_vault: market.coin_vault,
      pc_vault: market.pc_vault,
      vault_signer,
    },
    staking: StakingAccounts {
      staking_program_authority: resolver.staking_program_authority(&reserve.staking_pool)?,
      staking_program: pool.port_config.port_staking_program,
      stake_account: pool.port_config.stake_account,
      staking_pool: reserve.staking_pool,
      reward_supply: target.reward_supply,
    },
    reward_mint: pool.port_config.port_token_mint,
    token_program: pool.generic_config.token_program,
    dex_program: pool.serum_config.dex_program,
    swap_program: pool.serum_config.swap_program,
  })
}

/// `verify, refresh reserve, refresh obligation, deposit(amount)` then
/// `(refresh reserve, deposit(0))` for each remaining iteration.
///
/// The obligation is refreshed against whatever reserves it is registered
/// with; before the first deposit into a pool that set is empty.
pub fn deposit_batch(
  programs: &ProgramIds,
  accounts: &SettlementAccounts,
  obligation: &ObligationSnapshot,
  amount: u64,
  iteration_count: u64,
) -> Result<SettlementBatch> {
  let refresh_reserve = lending::refresh_reserve(&programs.port_lending, &accounts.reserve, accounts.oracle.as_ref());
  let refresh_obligation = lending::refresh_obligation(
    &programs.port_lending,
    &accounts.obligation,
    &obligation.deposit_reserves,
    &obligation.borrow_reserves,
  );

  BatchBuilder::new()
    .then(
      StepKind::VerifyIntegrity,
      instruction::verify_deposit(&programs.pole, &accounts.liquidity.pool)?,
    )
    .then(StepKind::RefreshReserve, refresh_reserve.clone())
    .then(StepKind::RefreshObligation, refresh_obligation)
    .then(
      StepKind::ApplyDeposit { amount },
      instruction::deposit_liquidity(&programs.pole, &accounts.liquidity, amount)?,
    )
    .repeat(StepKind::RefreshReserve, refresh_reserve)
    .repeat(
      StepKind::ApplyDeposit { amount: 0 },
      instruction::deposit_liquidity(&programs.pole, &accounts.liquidity, 0)?,
    )
    .build(iteration_count)
}

/// `verify, refresh reserve, refresh obligation, redeem(lp_amount)` then
/// `(refresh reserve, refresh obligation, redeem(0))` for each remaining
/// iteration. The obligation is refreshed against the pool's reserve on
/// both the deposit and borrow side every time.
pub fn withdraw_batch(
  programs: &ProgramIds,
  accounts: &SettlementAccounts,
  lp_amount: u64,
  iteration_count: u64,
) -> Result<SettlementBatch> {
  let reserves = [accounts.reserve];
  let refresh_reserve = lending::refresh_reserve(&programs.port_lending, &accounts.reserve, accounts.oracle.as_ref());
  let refresh_obligation =
    lending::refresh_obligation(&programs.port_lending, &accounts.obligation, &reserves, &reserves);

  BatchBuilder::new()
    .then(
      StepKind::VerifyIntegrity,
      instruction::verify_redeem(&programs.pole, &accounts.liquidity.pool)?,
    )
    .then(StepKind::RefreshReserve, refresh_reserve.clone())
    .then(StepKind::RefreshObligation, refresh_obligation.clone())
    .then(
      StepKind::ApplyWithdraw { amount: lp_amount },
      instruction::redeem_liquidity(&programs.pole, &accounts.liquidity, &accounts.fee_receiver, lp_amount)?,
    )
    .repeat(StepKind::RefreshReserve, refresh_reserve)
    .repeat(StepKind::RefreshObligation, refresh_obligation)
    .repeat(
      StepKind::ApplyWithdraw { amount: 0 },
      instruction::redeem_liquidity(&programs.pole, &accounts.liquidity, &accounts.fee_receiver, 0)?,
    )
    .build(iteration_count)
}

pub fn harvest_batch(programs: &ProgramIds, accounts: &HarvestAccounts) -> Result<SettlementBatch> {
  Ok(SettlementBatch::single(
    StepKind::ClaimAndSell,
    instruction::claim_and_sell(&programs.pole, accounts)?,
  ))
}

pub fn admin_batch(programs: &ProgramIds, pool: &Pubkey, owner: &Pubkey, ix: PoleInstruction) -> Result<SettlementBatch> {
  Ok(SettlementBatch::single(
    StepKind::Admin(ix.name()),
    instruction::admin(&programs.pole, pool, owner, ix)?,
  ))
}
