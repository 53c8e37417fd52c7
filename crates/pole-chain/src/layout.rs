//! Typed layouts of persisted pool program accounts
//!
//! Accounts are an 8-byte discriminator, `sha256("account:<Name>")[..8]`,
//! followed by fixed-size little-endian fields with no padding between
//! them. The discriminator selects the layout version.

use borsh::{BorshDeserialize, BorshSerialize};
use pole_core::PoolParams;
use solana_pubkey::Pubkey;

use crate::error::LayoutError;
use crate::instruction::sighash;

pub const DISCRIMINATOR_SIZE: usize = 8;
pub const POOL_ACCOUNT_SIZE: usize = 936;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutVersion {
  /// `PolePortPool`: one lending reserve, one order-book market
  V1,
}

impl LayoutVersion {
  pub const ALL: [LayoutVersion; 1] = [LayoutVersion::V1];

  pub fn account_name(self) -> &'static str {
    match self {
      LayoutVersion::V1 => "PolePortPool",
    }
  }

  pub fn discriminator(self) -> [u8; 8] {
    sighash("account", self.account_name())
  }

  pub fn body_len(self) -> usize {
    match self {
      LayoutVersion::V1 => POOL_ACCOUNT_SIZE,
    }
  }
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenericPoolConfig {
  pub bump: u64,
  pub liquidity_cap: u64,
  pub withdraw_fee_bips: u64,
  pub fee_receiver: Pubkey,
  pub owner: Pubkey,
  pub lp_mint: Pubkey,
  pub liquidity_supply: Pubkey,
  pub token_program: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PortConfig {
  pub min_deposit: u64,
  pub obligation: Pubkey,
  pub reserve: Pubkey,
  pub stake_account: Pubkey,
  pub port_lending_program: Pubkey,
  pub port_staking_program: Pubkey,
  pub port_token_mint: Pubkey,
  /// Pool's collateral token account
  pub port_lp_supply: Pubkey,
  /// Pool's reward token account
  pub port_supply: Pubkey,
  pub port_iterate: u64,
  pub port_reserve_percentage: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SerumConfig {
  pub dex_program: Pubkey,
  pub swap_program: Pubkey,
  pub port_open_orders: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BasicState {
  pub lp_amount: u64,
}

/// Progress of an in-flight settlement; all zero between batches.
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PortState {
  pub deposit_verified: u64,
  pub redeem_verified: u64,
  pub leverage: u64,
  pub init_port_liquidity: [u64; 3],
  pub approved_wallet: Pubkey,
  pub is_redeemed: u64,
  pub redeem_amount: u64,
  pub amount_to_unroll: u64,
  pub last_sold_slot: u64,
  pub user_liquidity_percentage: [u64; 2],
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolAccount {
  pub generic_config: GenericPoolConfig,
  pub port_config: PortConfig,
  pub serum_config: SerumConfig,
  pub basic_state: BasicState,
  pub port_state: PortState,
  pub padding: [u64; 30],
}

impl PoolAccount {
  pub fn params(&self) -> PoolParams {
    PoolParams {
      iteration_count: self.port_config.port_iterate,
      reserve_percentage: self.port_config.port_reserve_percentage,
      min_deposit: self.port_config.min_deposit,
      withdraw_fee_bips: self.generic_config.withdraw_fee_bips,
      liquidity_cap: self.generic_config.liquidity_cap,
    }
  }

  /// A previous batch stopped between its first and last step
  pub fn settlement_in_progress(&self) -> bool {
    self.port_state.leverage != 0
  }

  /// Discriminator plus body, as the program stores it.
  pub fn encode(&self, version: LayoutVersion) -> Result<Vec<u8>, LayoutError> {
    let mut data = version.discriminator().to_vec();
    let body = borsh::to_vec(self).map_err(|e| LayoutError::Malformed {
      account: version.account_name(),
      reason: e.to_string(),
    })?;
    data.extend_from_slice(&body);
    Ok(data)
  }
}

/// Decode a pool account of any known layout version.
pub fn decode_pool(data: &[u8]) -> Result<(LayoutVersion, PoolAccount), LayoutError> {
  let disc = read_discriminator("pool", data)?;
  let version = LayoutVersion::ALL
    .into_iter()
    .find(|v| v.discriminator() == disc)
    .ok_or(LayoutError::DiscriminatorMismatch { account: "pool", actual: disc })?;

  let account = version.account_name();
  let expected = DISCRIMINATOR_SIZE + version.body_len();
  if data.len() < expected {
    return Err(LayoutError::TooShort {
      account,
      expected,
      actual: data.len(),
    });
  }
  let pool = PoolAccount::deserialize(&mut &data[DISCRIMINATOR_SIZE..expected]).map_err(|e| {
    LayoutError::Malformed {
      account,
      reason: e.to_string(),
    }
  })?;
  Ok((version, pool))
}

fn read_discriminator(account: &'static str, data: &[u8]) -> Result<[u8; 8], LayoutError> {
  if data.len() < DISCRIMINATOR_SIZE {
    return Err(LayoutError::TooShort {
      account,
      expected: DISCRIMINATOR_SIZE,
      actual: data.len(),
    });
  }
  let mut disc = [0u8; 8];
  disc.copy_from_slice(&data[..DISCRIMINATOR_SIZE]);
  Ok(disc)
}
