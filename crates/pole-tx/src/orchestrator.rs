//! Settlement orchestrator
//!
//! Each flow samples ledger state, runs the pre-flight checks, assembles
//! and submits one atomic batch, then re-reads the ledger and verifies the
//! outcome against the proportional accounting rules. Submissions are
//! never retried: a rejected or timed-out batch is returned to the caller,
//! who must re-query state before acting again.

use pole_chain::event::{parse_events, DidDeposit, DidRedeem, DidSell};
use pole_chain::layout::decode_pool;
use pole_chain::wire::{encoded_len, PACKET_DATA_SIZE};
use pole_chain::{AddressResolver, PoleEvent, PoleInstruction, PoolAccount};
use pole_core::accounting::{
  expected_liquidity_for_withdraw, pooled_liquidity, redeem_amount_for_lp, verify_deposit, verify_fee_collected,
  verify_withdraw_payout,
};
use pole_core::invariants::{
  assert_burn_matches_supply, assert_deposit_admissible, assert_harvest_fresh, assert_liquidity_cap_valid,
  assert_min_deposit_valid, assert_mint_matches_supply, assert_pool_params_valid,
};
use pole_core::{AccountingError, DepositExpectation, DepositObservation};
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use tracing::{debug, info, warn};

use crate::batch::{check_integrity, SettlementBatch};
use crate::context::SettlementContext;
use crate::error::{Result, SettlementError};
use crate::plan::{
  admin_batch, deposit_batch, harvest_batch, resolve_harvest_accounts, resolve_settlement_accounts, withdraw_batch,
  HarvestTarget,
};
use crate::transport::{Confirmation, LedgerReader, Transport};

/// LP amount to withdraw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WithdrawAmount {
  /// The caller's entire LP balance, read before the batch is built
  All,
  Exact(u64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepositReport {
  pub signature: Signature,
  pub lp_minted: u64,
  pub expectation: DepositExpectation,
  pub event: Option<DidDeposit>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WithdrawReport {
  pub signature: Signature,
  pub lp_burned: u64,
  pub expected_net: u64,
  pub realized_net: u64,
  pub fee_collected: u64,
  pub event: Option<DidRedeem>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HarvestReport {
  pub signature: Signature,
  /// Liquidity-supply increase; zero when nothing was sold
  pub gain: u64,
  pub event: Option<DidSell>,
}

pub struct Orchestrator<L, T> {
  ctx: SettlementContext,
  resolver: AddressResolver,
  ledger: L,
  transport: T,
}

impl<L: LedgerReader, T: Transport> Orchestrator<L, T> {
  pub fn new(ctx: SettlementContext, ledger: L, transport: T) -> Self {
    let resolver = ctx.resolver();
    Self {
      ctx,
      resolver,
      ledger,
      transport,
    }
  }

  pub fn context(&self) -> &SettlementContext {
    &self.ctx
  }

  async fn load_pool(&self) -> Result<(Pubkey, PoolAccount)> {
    let (address, _) = self.resolver.pool(self.ctx.pool_name.as_bytes())?;
    let data = self.ledger.account_data(&address).await?;
    let (_, pool) = decode_pool(&data).map_err(pole_chain::ChainError::from)?;
    Ok((address, pool))
  }

  /// Load the pool and refuse to settle against it if its configuration
  /// is out of bounds or a previous batch is visibly half-applied.
  async fn load_settleable_pool(&self) -> Result<(Pubkey, PoolAccount)> {
    let (address, pool) = self.load_pool().await?;
    assert_pool_params_valid(&pool.params())?;
    if pool.settlement_in_progress() {
      return Err(SettlementError::SettlementInProgress {
        pool: address,
        leverage: pool.port_state.leverage,
      });
    }
    Ok((address, pool))
  }

  /// Refuse to settle once the pool's last reward sale is too old for the
  /// pool program to accept the batch.
  async fn check_harvest_fresh(&self, pool: &PoolAccount, never_sold_ok: bool) -> Result<()> {
    let last_sold_slot = pool.port_state.last_sold_slot;
    let current_slot = self.ledger.current_slot().await?;
    debug!(last_sold_slot, current_slot, "harvest freshness");
    assert_harvest_fresh(last_sold_slot, current_slot, never_sold_ok)?;
    Ok(())
  }

  async fn submit(&self, flow: &'static str, batch: &SettlementBatch) -> Result<Confirmation> {
    for (index, step) in batch.steps().enumerate() {
      debug!(flow, index, step = %step.kind, "batch step");
    }
    match encoded_len(&batch.instructions(), &self.ctx.payer) {
      Ok(len) if len > PACKET_DATA_SIZE => {
        warn!(flow, len, limit = PACKET_DATA_SIZE, "batch exceeds packet size");
      }
      Ok(len) => debug!(flow, len, "batch wire size"),
      Err(err) => warn!(flow, error = %err, "could not size batch"),
    }

    let confirmation = self.transport.submit(batch, &self.ctx.payer).await?;
    debug!(flow, signature = %confirmation.signature, "batch confirmed");
    Ok(confirmation)
  }

  /// Deposit `amount` of the pool's liquidity token.
  pub async fn deposit(&self, amount: u64) -> Result<DepositReport> {
    let (pool_address, pool) = self.load_settleable_pool().await?;
    self.check_harvest_fresh(&pool, true).await?;
    let params = pool.params();
    let reserve = self.ledger.reserve(&pool.port_config.reserve).await?;
    let obligation = self.ledger.obligation(&pool.port_config.obligation).await?;
    let idle = self.ledger.token_balance(&pool.generic_config.liquidity_supply).await?;

    let pooled = pooled_liquidity(idle, reserve.available_liquidity)?;
    assert_deposit_admissible(amount, pooled, params.liquidity_cap, params.min_deposit)?;

    let accounts = resolve_settlement_accounts(&self.ctx, pool_address, &pool, &reserve)?;
    let lp_before = self.ledger.token_balance(&accounts.liquidity.user_lp_wallet).await?;

    let batch = deposit_batch(
      &self.ctx.programs,
      &accounts,
      &obligation,
      amount,
      params.iteration_count,
    )?;
    check_integrity(&batch, &self.ctx.programs, params.iteration_count)?;

    info!(
      pool = %pool_address,
      amount,
      pooled,
      iterations = params.iteration_count,
      "submitting deposit"
    );
    let confirmation = self.submit("deposit", &batch).await?;

    let (_, pool_after) = self.load_pool().await?;
    let reserve_after = self.ledger.reserve(&pool.port_config.reserve).await?;
    let lp_after = self.ledger.token_balance(&accounts.liquidity.user_lp_wallet).await?;

    let lp_minted = lp_after.checked_sub(lp_before).ok_or(AccountingError::ReconciliationFailure {
      check: "participant LP balance decreased during deposit",
      expected: lp_before,
      actual: lp_after,
    })?;
    let lp_supply_after = pool_after.basic_state.lp_amount;
    assert_mint_matches_supply(pool.basic_state.lp_amount, lp_supply_after, lp_minted)?;

    let observation = DepositObservation {
      requested: amount,
      reserve_before: reserve.available_liquidity,
      reserve_after: reserve_after.available_liquidity,
      lp_minted,
      lp_supply_after,
    };
    let expectation = verify_deposit(&observation)?;
    debug!(?observation, ?expectation, "deposit reconciled");

    let event = parse_events(&confirmation.logs).into_iter().find_map(|e| match e {
      PoleEvent::Deposit(ev) => Some(ev),
      _ => None,
    });
    if let Some(ev) = event {
      if ev.lp_amount_minted != lp_minted {
        return Err(
          AccountingError::ReconciliationFailure {
            check: "deposit event disagrees with LP gain",
            expected: lp_minted,
            actual: ev.lp_amount_minted,
          }
          .into(),
        );
      }
    }

    info!(pool = %pool_address, amount, lp_minted, "deposit settled");
    Ok(DepositReport {
      signature: confirmation.signature,
      lp_minted,
      expectation,
      event,
    })
  }

  /// Burn LP for liquidity, net of the pool's withdraw fee.
  pub async fn withdraw(&self, amount: WithdrawAmount) -> Result<WithdrawReport> {
    let (pool_address, pool) = self.load_settleable_pool().await?;
    let params = pool.params();
    let reserve = self.ledger.reserve(&pool.port_config.reserve).await?;
    let accounts = resolve_settlement_accounts(&self.ctx, pool_address, &pool, &reserve)?;

    let lp_balance = self.ledger.token_balance(&accounts.liquidity.user_lp_wallet).await?;
    let lp_amount = match amount {
      WithdrawAmount::All => {
        debug!(lp_balance, "withdrawing entire LP balance");
        lp_balance
      }
      WithdrawAmount::Exact(n) => n,
    };
    if lp_amount == 0 {
      return Err(AccountingError::ZeroAmount.into());
    }
    if lp_amount > lp_balance {
      return Err(SettlementError::InsufficientBalance {
        requested: lp_amount,
        available: lp_balance,
      });
    }

    let idle = self.ledger.token_balance(&pool.generic_config.liquidity_supply).await?;
    let pooled = pooled_liquidity(idle, reserve.available_liquidity)?;
    let lp_supply_before = pool.basic_state.lp_amount;
    let redeem = redeem_amount_for_lp(lp_amount, lp_supply_before, pooled)?;
    let expected_net = expected_liquidity_for_withdraw(lp_amount, lp_supply_before, pooled, params.withdraw_fee_bips)?;
    if redeem == 0 || expected_net == 0 {
      return Err(AccountingError::DustWithdraw { lp_amount, redeem }.into());
    }
    self.check_harvest_fresh(&pool, false).await?;

    let fee_before = self.ledger.token_balance(&accounts.fee_receiver).await?;
    let liquidity_before = self.ledger.token_balance(&accounts.liquidity.user_liquidity_wallet).await?;

    let batch = withdraw_batch(&self.ctx.programs, &accounts, lp_amount, params.iteration_count)?;
    check_integrity(&batch, &self.ctx.programs, params.iteration_count)?;

    info!(
      pool = %pool_address,
      lp_amount,
      pooled,
      redeem,
      expected_net,
      fee_bips = params.withdraw_fee_bips,
      iterations = params.iteration_count,
      "submitting withdraw"
    );
    let confirmation = self.submit("withdraw", &batch).await?;

    let (_, pool_after) = self.load_pool().await?;
    let fee_after = self.ledger.token_balance(&accounts.fee_receiver).await?;
    let liquidity_after = self.ledger.token_balance(&accounts.liquidity.user_liquidity_wallet).await?;

    let realized_net = liquidity_after
      .checked_sub(liquidity_before)
      .ok_or(AccountingError::ReconciliationFailure {
        check: "participant liquidity decreased during withdraw",
        expected: liquidity_before,
        actual: liquidity_after,
      })?;
    verify_withdraw_payout(expected_net, realized_net)?;
    verify_fee_collected(fee_before, fee_after, redeem, params.withdraw_fee_bips)?;
    assert_burn_matches_supply(lp_supply_before, pool_after.basic_state.lp_amount, lp_amount)?;

    let event = parse_events(&confirmation.logs).into_iter().find_map(|e| match e {
      PoleEvent::Redeem(ev) => Some(ev),
      _ => None,
    });
    if let Some(ev) = event {
      if ev.lp_amount_burned != lp_amount {
        return Err(
          AccountingError::ReconciliationFailure {
            check: "redeem event disagrees with LP burned",
            expected: lp_amount,
            actual: ev.lp_amount_burned,
          }
          .into(),
        );
      }
    }

    let fee_collected = fee_after.saturating_sub(fee_before);
    info!(
      pool = %pool_address,
      lp_amount,
      realized_net,
      fee_collected,
      "withdraw settled"
    );
    Ok(WithdrawReport {
      signature: confirmation.signature,
      lp_burned: lp_amount,
      expected_net,
      realized_net,
      fee_collected,
      event,
    })
  }

  /// Claim staking rewards and sell them into the pool's liquidity supply.
  ///
  /// A harvest that gains nothing is logged, not failed.
  pub async fn claim_and_sell(&self, target: &HarvestTarget) -> Result<HarvestReport> {
    let (pool_address, pool) = self.load_pool().await?;
    let reserve = self.ledger.reserve(&pool.port_config.reserve).await?;
    let market = self.ledger.market(&target.market).await?;
    let accounts = resolve_harvest_accounts(&self.ctx, pool_address, &pool, &reserve, target, &market)?;

    let before = self.ledger.token_balance(&accounts.liquidity_supply).await?;
    let batch = harvest_batch(&self.ctx.programs, &accounts)?;
    info!(pool = %pool_address, market = %target.market, "submitting harvest");
    let confirmation = self.submit("harvest", &batch).await?;
    let after = self.ledger.token_balance(&accounts.liquidity_supply).await?;

    let gain = after.saturating_sub(before);
    if gain == 0 {
      warn!(pool = %pool_address, before, after, "harvest produced no liquidity gain");
    } else {
      info!(pool = %pool_address, gain, "harvest settled");
    }

    let event = parse_events(&confirmation.logs).into_iter().find_map(|e| match e {
      PoleEvent::Sell(ev) => Some(ev),
      _ => None,
    });
    Ok(HarvestReport {
      signature: confirmation.signature,
      gain,
      event,
    })
  }

  async fn run_admin<F>(&self, ix: PoleInstruction, read_back: F) -> Result<Signature>
  where
    F: FnOnce(&PoolAccount) -> Result<()>,
  {
    let (pool_address, _) = self.load_pool().await?;
    let batch = admin_batch(&self.ctx.programs, &pool_address, &self.ctx.payer, ix)?;
    info!(pool = %pool_address, instruction = ix.name(), "submitting admin change");
    let confirmation = self.submit(ix.name(), &batch).await?;

    let (_, pool_after) = self.load_pool().await?;
    read_back(&pool_after)?;
    Ok(confirmation.signature)
  }

  pub async fn change_liquidity_cap(&self, cap: u64) -> Result<Signature> {
    assert_liquidity_cap_valid(cap)?;
    self
      .run_admin(PoleInstruction::ChangeLiquidityCap { cap }, |pool| {
        expect_equal("liquidity_cap", cap, pool.generic_config.liquidity_cap)
      })
      .await
  }

  pub async fn change_withdraw_fee(&self, bips: u8) -> Result<Signature> {
    self
      .run_admin(PoleInstruction::ChangeWithdrawFee { bips }, |pool| {
        expect_equal("withdraw_fee_bips", bips as u64, pool.generic_config.withdraw_fee_bips)?;
        assert_pool_params_valid(&pool.params())?;
        Ok(())
      })
      .await
  }

  pub async fn change_min_deposit(&self, min_deposit: u64) -> Result<Signature> {
    assert_min_deposit_valid(min_deposit)?;
    self
      .run_admin(PoleInstruction::ChangeMinDeposit { min_deposit }, |pool| {
        expect_equal("min_deposit", min_deposit, pool.port_config.min_deposit)
      })
      .await
  }

  pub async fn change_fee_receiver(&self, fee_receiver: Pubkey) -> Result<Signature> {
    self
      .run_admin(PoleInstruction::ChangeFeeReceiver { fee_receiver }, |pool| {
        expect_equal("fee_receiver", fee_receiver, pool.generic_config.fee_receiver)
      })
      .await
  }

  pub async fn change_owner(&self, owner: Pubkey) -> Result<Signature> {
    self
      .run_admin(PoleInstruction::ChangeOwner { owner }, |pool| {
        expect_equal("owner", owner, pool.generic_config.owner)
      })
      .await
  }
}

fn expect_equal<V: PartialEq + ToString>(field: &'static str, expected: V, actual: V) -> Result<()> {
  if expected != actual {
    return Err(SettlementError::StateMismatch {
      field,
      expected: expected.to_string(),
      actual: actual.to_string(),
    });
  }
  Ok(())
}
