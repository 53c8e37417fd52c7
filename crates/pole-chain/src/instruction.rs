//! Pool program instruction encoding
//!
//! Data is an 8-byte sighash, `sha256("global:<name>")[..8]`, followed by
//! the Borsh-encoded arguments. Account lists mirror the program's account
//! structs field by field, nested structs flattened in declaration order.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use solana_instruction::{AccountMeta, Instruction};
use solana_pubkey::Pubkey;

use crate::error::ChainError;
use crate::programs::sysvar;

/// Index of the participant's liquidity wallet in a deposit instruction
pub const DEPOSIT_WALLET_INDEX: usize = 2;
/// Index of the participant's LP wallet in a redeem instruction
pub const REDEEM_WALLET_INDEX: usize = 6;

/// First eight bytes of `sha256("<namespace>:<name>")`.
pub fn sighash(namespace: &str, name: &str) -> [u8; 8] {
  let digest = Sha256::new()
    .chain_update(namespace.as_bytes())
    .chain_update(b":")
    .chain_update(name.as_bytes())
    .finalize();
  let mut out = [0u8; 8];
  out.copy_from_slice(&digest[..8]);
  out
}

#[derive(BorshSerialize, BorshDeserialize)]
struct AmountArgs {
  amount: u64,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct AddressArgs {
  address: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct BipsArgs {
  bips: u8,
}

/// Pool program instructions used by the settlement flows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoleInstruction {
  VerifyDeposit,
  VerifyRedeem,
  DepositLiquidity { amount: u64 },
  RedeemLiquidity { amount: u64 },
  ClaimAndSell,
  ChangeOwner { owner: Pubkey },
  ChangeFeeReceiver { fee_receiver: Pubkey },
  ChangeLiquidityCap { cap: u64 },
  ChangeWithdrawFee { bips: u8 },
  ChangeMinDeposit { min_deposit: u64 },
}

const NAMES: [&str; 10] = [
  "verify_deposit",
  "verify_redeem",
  "deposit_liquidity",
  "redeem_liquidity",
  "claim_and_sell",
  "change_owner",
  "change_fee_receiver",
  "change_liquidity_cap",
  "change_withdraw_fee",
  "change_min_deposit",
];

impl PoleInstruction {
  pub fn name(&self) -> &'static str {
    match self {
      PoleInstruction::VerifyDeposit => NAMES[0],
      PoleInstruction::VerifyRedeem => NAMES[1],
      PoleInstruction::DepositLiquidity { .. } => NAMES[2],
      PoleInstruction::RedeemLiquidity { .. } => NAMES[3],
      PoleInstruction::ClaimAndSell => NAMES[4],
      PoleInstruction::ChangeOwner { .. } => NAMES[5],
      PoleInstruction::ChangeFeeReceiver { .. } => NAMES[6],
      PoleInstruction::ChangeLiquidityCap { .. } => NAMES[7],
      PoleInstruction::ChangeWithdrawFee { .. } => NAMES[8],
      PoleInstruction::ChangeMinDeposit { .. } => NAMES[9],
    }
  }

  pub fn discriminator(&self) -> [u8; 8] {
    sighash("global", self.name())
  }

  pub fn data(&self) -> Result<Vec<u8>, ChainError> {
    let mut data = self.discriminator().to_vec();
    let args = match *self {
      PoleInstruction::VerifyDeposit | PoleInstruction::VerifyRedeem | PoleInstruction::ClaimAndSell => {
        return Ok(data)
      }
      PoleInstruction::DepositLiquidity { amount }
      | PoleInstruction::RedeemLiquidity { amount }
      | PoleInstruction::ChangeLiquidityCap { cap: amount }
      | PoleInstruction::ChangeMinDeposit { min_deposit: amount } => borsh::to_vec(&AmountArgs { amount }),
      PoleInstruction::ChangeOwner { owner: address }
      | PoleInstruction::ChangeFeeReceiver { fee_receiver: address } => borsh::to_vec(&AddressArgs { address }),
      PoleInstruction::ChangeWithdrawFee { bips } => borsh::to_vec(&BipsArgs { bips }),
    }
    .map_err(|e| ChainError::Encode {
      what: self.name(),
      reason: e.to_string(),
    })?;
    data.extend_from_slice(&args);
    Ok(data)
  }

  /// Decode instruction data produced by [`PoleInstruction::data`].
  pub fn decode(data: &[u8]) -> Result<Self, ChainError> {
    if data.len() < 8 {
      return Err(ChainError::Encode {
        what: "pole instruction",
        reason: format!("{} bytes is shorter than a discriminator", data.len()),
      });
    }
    let mut disc = [0u8; 8];
    disc.copy_from_slice(&data[..8]);
    let args = &data[8..];

    let index = NAMES
      .iter()
      .position(|name| sighash("global", name) == disc)
      .ok_or(ChainError::UnknownInstruction(disc))?;
    let malformed = |e: std::io::Error| ChainError::Encode {
      what: NAMES[index],
      reason: e.to_string(),
    };

    let ix = match index {
      0 => PoleInstruction::VerifyDeposit,
      1 => PoleInstruction::VerifyRedeem,
      2 => PoleInstruction::DepositLiquidity {
        amount: borsh::from_slice::<AmountArgs>(args).map_err(malformed)?.amount,
      },
      3 => PoleInstruction::RedeemLiquidity {
        amount: borsh::from_slice::<AmountArgs>(args).map_err(malformed)?.amount,
      },
      4 => PoleInstruction::ClaimAndSell,
      5 => PoleInstruction::ChangeOwner {
        owner: borsh::from_slice::<AddressArgs>(args).map_err(malformed)?.address,
      },
      6 => PoleInstruction::ChangeFeeReceiver {
        fee_receiver: borsh::from_slice::<AddressArgs>(args).map_err(malformed)?.address,
      },
      7 => PoleInstruction::ChangeLiquidityCap {
        cap: borsh::from_slice::<AmountArgs>(args).map_err(malformed)?.amount,
      },
      8 => PoleInstruction::ChangeWithdrawFee {
        bips: borsh::from_slice::<BipsArgs>(args).map_err(malformed)?.bips,
      },
      _ => PoleInstruction::ChangeMinDeposit {
        min_deposit: borsh::from_slice::<AmountArgs>(args).map_err(malformed)?.amount,
      },
    };
    Ok(ix)
  }
}

/// Lending reserve accounts a deposit or redeem passes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortLendingAccounts {
  /// Pool's collateral token account
  pub pool_collateral_wallet: Pubkey,
  pub collateral_mint: Pubkey,
  pub collateral_supply: Pubkey,
  pub liquidity_mint: Pubkey,
  pub liquidity_supply: Pubkey,
  pub obligation: Pubkey,
  pub reserve: Pubkey,
  pub reserve_fee_receiver: Pubkey,
  pub stake_account: Pubkey,
  pub staking_pool: Pubkey,
  pub lending_market: Pubkey,
  pub lending_market_authority: Pubkey,
  pub lending_program: Pubkey,
  pub staking_program: Pubkey,
}

impl PortLendingAccounts {
  fn metas(&self) -> [AccountMeta; 14] {
    [
      AccountMeta::new(self.pool_collateral_wallet, false),
      AccountMeta::new(self.collateral_mint, false),
      AccountMeta::new(self.collateral_supply, false),
      AccountMeta::new_readonly(self.liquidity_mint, false),
      AccountMeta::new(self.liquidity_supply, false),
      AccountMeta::new(self.obligation, false),
      AccountMeta::new(self.reserve, false),
      AccountMeta::new(self.reserve_fee_receiver, false),
      AccountMeta::new(self.stake_account, false),
      AccountMeta::new(self.staking_pool, false),
      AccountMeta::new_readonly(self.lending_market, false),
      AccountMeta::new_readonly(self.lending_market_authority, false),
      AccountMeta::new_readonly(self.lending_program, false),
      AccountMeta::new_readonly(self.staking_program, false),
    ]
  }
}

/// Accounts shared by deposit and redeem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiquidityAccounts {
  pub pool: Pubkey,
  pub pool_authority: Pubkey,
  pub user_liquidity_wallet: Pubkey,
  pub pool_liquidity_supply: Pubkey,
  pub lp_mint: Pubkey,
  pub user_lp_wallet: Pubkey,
  pub port: PortLendingAccounts,
  pub user_transfer_authority: Pubkey,
  pub token_program: Pubkey,
}

impl LiquidityAccounts {
  fn metas(&self, fee_account: Option<Pubkey>) -> Vec<AccountMeta> {
    let mut metas = Vec::with_capacity(24);
    metas.push(AccountMeta::new(self.pool, false));
    metas.push(AccountMeta::new_readonly(self.pool_authority, false));
    if let Some(fee_account) = fee_account {
      metas.push(AccountMeta::new(fee_account, false));
    }
    metas.push(AccountMeta::new(self.user_liquidity_wallet, false));
    metas.push(AccountMeta::new(self.pool_liquidity_supply, false));
    metas.push(AccountMeta::new(self.lp_mint, false));
    metas.push(AccountMeta::new(self.user_lp_wallet, false));
    metas.extend(self.port.metas());
    metas.push(AccountMeta::new(self.user_transfer_authority, true));
    metas.push(AccountMeta::new_readonly(self.token_program, false));
    metas.push(AccountMeta::new_readonly(sysvar::CLOCK, false));
    metas
  }
}

/// Order-book market accounts a harvest sells through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarketAccounts {
  pub market: Pubkey,
  pub open_orders: Pubkey,
  pub request_queue: Pubkey,
  pub event_queue: Pubkey,
  pub bids: Pubkey,
  pub asks: Pubkey,
  pub coin_vault: Pubkey,
  pub pc_vault: Pubkey,
  pub vault_signer: Pubkey,
}

/// Staking accounts a harvest claims from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StakingAccounts {
  pub staking_program_authority: Pubkey,
  pub staking_program: Pubkey,
  pub stake_account: Pubkey,
  pub staking_pool: Pubkey,
  pub reward_supply: Pubkey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HarvestAccounts {
  pub pool: Pubkey,
  pub pool_authority: Pubkey,
  pub liquidity_supply: Pubkey,
  pub reward_holding: Pubkey,
  pub market: MarketAccounts,
  pub staking: StakingAccounts,
  pub reward_mint: Pubkey,
  pub token_program: Pubkey,
  pub dex_program: Pubkey,
  pub swap_program: Pubkey,
}

fn verify(program_id: &Pubkey, pool: &Pubkey, ix: PoleInstruction) -> Result<Instruction, ChainError> {
  Ok(Instruction::new_with_bytes(
    *program_id,
    &ix.data()?,
    vec![
      AccountMeta::new(*pool, false),
      AccountMeta::new_readonly(sysvar::INSTRUCTIONS, false),
    ],
  ))
}

/// Introspection check that must precede every deposit batch
pub fn verify_deposit(program_id: &Pubkey, pool: &Pubkey) -> Result<Instruction, ChainError> {
  verify(program_id, pool, PoleInstruction::VerifyDeposit)
}

/// Introspection check that must precede every redeem batch
pub fn verify_redeem(program_id: &Pubkey, pool: &Pubkey) -> Result<Instruction, ChainError> {
  verify(program_id, pool, PoleInstruction::VerifyRedeem)
}

pub fn deposit_liquidity(
  program_id: &Pubkey,
  accounts: &LiquidityAccounts,
  amount: u64,
) -> Result<Instruction, ChainError> {
  Ok(Instruction::new_with_bytes(
    *program_id,
    &PoleInstruction::DepositLiquidity { amount }.data()?,
    accounts.metas(None),
  ))
}

pub fn redeem_liquidity(
  program_id: &Pubkey,
  accounts: &LiquidityAccounts,
  fee_account: &Pubkey,
  amount: u64,
) -> Result<Instruction, ChainError> {
  Ok(Instruction::new_with_bytes(
    *program_id,
    &PoleInstruction::RedeemLiquidity { amount }.data()?,
    accounts.metas(Some(*fee_account)),
  ))
}

pub fn claim_and_sell(program_id: &Pubkey, accounts: &HarvestAccounts) -> Result<Instruction, ChainError> {
  let m = &accounts.market;
  let s = &accounts.staking;
  let metas = vec![
    AccountMeta::new(accounts.pool, false),
    AccountMeta::new_readonly(accounts.pool_authority, false),
    AccountMeta::new(accounts.liquidity_supply, false),
    AccountMeta::new(accounts.reward_holding, false),
    AccountMeta::new(m.market, false),
    AccountMeta::new(m.open_orders, false),
    AccountMeta::new(m.request_queue, false),
    AccountMeta::new(m.event_queue, false),
    AccountMeta::new(m.bids, false),
    AccountMeta::new(m.asks, false),
    AccountMeta::new(m.coin_vault, false),
    AccountMeta::new(m.pc_vault, false),
    AccountMeta::new_readonly(m.vault_signer, false),
    AccountMeta::new_readonly(s.staking_program_authority, false),
    AccountMeta::new_readonly(s.staking_program, false),
    AccountMeta::new(s.stake_account, false),
    AccountMeta::new(s.staking_pool, false),
    AccountMeta::new(s.reward_supply, false),
    AccountMeta::new_readonly(accounts.reward_mint, false),
    AccountMeta::new_readonly(accounts.token_program, false),
    AccountMeta::new_readonly(accounts.dex_program, false),
    AccountMeta::new_readonly(accounts.swap_program, false),
    AccountMeta::new_readonly(sysvar::CLOCK, false),
    AccountMeta::new_readonly(sysvar::RENT, false),
  ];
  Ok(Instruction::new_with_bytes(
    *program_id,
    &PoleInstruction::ClaimAndSell.data()?,
    metas,
  ))
}

/// Owner-signed pool configuration change.
pub fn admin(program_id: &Pubkey, pool: &Pubkey, owner: &Pubkey, ix: PoleInstruction) -> Result<Instruction, ChainError> {
  Ok(Instruction::new_with_bytes(
    *program_id,
    &ix.data()?,
    vec![AccountMeta::new(*pool, false), AccountMeta::new_readonly(*owner, true)],
  ))
}
