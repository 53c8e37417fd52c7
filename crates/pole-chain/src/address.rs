//! Program-derived address resolution
//!
//! Every address here is a pure function of (seeds, program id). A candidate
//! suffix is appended to the seeds and hashed; the first candidate that lands
//! off the ed25519 curve is the one only program logic can sign for.

use solana_pubkey::{Pubkey, PubkeyError};

use crate::error::ChainError;
use crate::programs::ProgramIds;

/// Candidate suffixes live in [0, 255]
pub const MAX_DERIVATION_ATTEMPTS: u16 = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchDirection {
  /// 255 down to 0, the program-derived address convention
  Descending,
  /// 0 up to 255, the order-book vault signer convention
  Ascending,
}

/// How a candidate suffix is appended to the seeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuffixEncoding {
  /// One byte
  Byte,
  /// Eight bytes, little-endian
  U64Le,
}

impl SuffixEncoding {
  fn encode(self, candidate: u8) -> ([u8; 8], usize) {
    match self {
      SuffixEncoding::Byte => ([candidate, 0, 0, 0, 0, 0, 0, 0], 1),
      SuffixEncoding::U64Le => ((candidate as u64).to_le_bytes(), 8),
    }
  }
}

/// Bounded guess-and-check over suffix candidates.
///
/// # Arguments
/// * `seeds` - Fixed seeds, without the suffix
/// * `program_id` - Program the address is scoped to
/// * `direction` - Order in which candidates are tried
/// * `encoding` - Width of the appended suffix
/// * `max_attempts` - Candidates to try, capped at 256
///
/// # Returns
/// The first off-curve address and the suffix that produced it
pub fn search_valid_derivation(
  seeds: &[&[u8]],
  program_id: &Pubkey,
  direction: SearchDirection,
  encoding: SuffixEncoding,
  max_attempts: u16,
) -> Result<(Pubkey, u8), ChainError> {
  let attempts = max_attempts.min(MAX_DERIVATION_ATTEMPTS);

  for i in 0..attempts {
    let candidate = match direction {
      SearchDirection::Descending => (255 - i) as u8,
      SearchDirection::Ascending => i as u8,
    };
    let (buf, len) = encoding.encode(candidate);

    let mut with_suffix: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 1);
    with_suffix.extend_from_slice(seeds);
    with_suffix.push(&buf[..len]);

    match Pubkey::create_program_address(&with_suffix, program_id) {
      Ok(address) => return Ok((address, candidate)),
      Err(PubkeyError::InvalidSeeds) => continue, // on curve
      Err(err) => return Err(ChainError::InvalidSeeds(err)),
    }
  }

  Err(ChainError::DerivationExhausted {
    program: *program_id,
    direction,
    attempts,
  })
}

/// Program-derived address with a descending one-byte bump.
pub fn derive_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<(Pubkey, u8), ChainError> {
  search_valid_derivation(
    seeds,
    program_id,
    SearchDirection::Descending,
    SuffixEncoding::Byte,
    MAX_DERIVATION_ATTEMPTS,
  )
}

/// Vault signer of an order-book market: ascending nonce, eight bytes LE.
pub fn find_vault_signer_nonce(market: &Pubkey, dex_program: &Pubkey) -> Result<(Pubkey, u64), ChainError> {
  let (signer, nonce) = search_valid_derivation(
    &[market.as_ref()],
    dex_program,
    SearchDirection::Ascending,
    SuffixEncoding::U64Le,
    MAX_DERIVATION_ATTEMPTS,
  )?;
  Ok((signer, nonce as u64))
}

/// Vault signer for a known nonce.
pub fn vault_signer(market: &Pubkey, nonce: u64, dex_program: &Pubkey) -> Result<Pubkey, ChainError> {
  Ok(Pubkey::create_program_address(
    &[market.as_ref(), &nonce.to_le_bytes()],
    dex_program,
  )?)
}

/// Associated token account of (wallet, mint) under a token program.
pub fn associated_token_address(wallet: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Pubkey {
  #[allow(deprecated)]
  spl_associated_token_account::get_associated_token_address_with_program_id(wallet, mint, token_program)
}

/// Named derivations used by the settlement flows.
#[derive(Clone, Copy, Debug)]
pub struct AddressResolver {
  programs: ProgramIds,
}

impl AddressResolver {
  pub fn new(programs: ProgramIds) -> Self {
    Self { programs }
  }

  pub fn programs(&self) -> &ProgramIds {
    &self.programs
  }

  /// Pool state account, seeded by the pool name
  pub fn pool(&self, name: &[u8]) -> Result<(Pubkey, u8), ChainError> {
    derive_address(&[name], &self.programs.pole)
  }

  /// Signer for every pool-owned token account
  pub fn pool_authority(&self) -> Result<(Pubkey, u8), ChainError> {
    derive_address(&[], &self.programs.pole)
  }

  pub fn lending_market_authority(&self, lending_market: &Pubkey) -> Result<Pubkey, ChainError> {
    derive_address(&[lending_market.as_ref()], &self.programs.port_lending).map(|(a, _)| a)
  }

  pub fn staking_program_authority(&self, staking_pool: &Pubkey) -> Result<Pubkey, ChainError> {
    derive_address(&[staking_pool.as_ref()], &self.programs.port_staking).map(|(a, _)| a)
  }

  pub fn user_balance(&self, user: &Pubkey, pool: &Pubkey) -> Result<(Pubkey, u8), ChainError> {
    derive_address(&[user.as_ref(), pool.as_ref()], &self.programs.pole)
  }

  pub fn user_lp_wallet(&self, user: &Pubkey, lp_mint: &Pubkey) -> Pubkey {
    associated_token_address(user, lp_mint, &self.programs.token)
  }

  /// Vault signer of `market`, using the recorded nonce when there is one
  pub fn vault_signer(&self, market: &Pubkey, nonce: Option<u64>) -> Result<(Pubkey, u64), ChainError> {
    match nonce {
      Some(nonce) => Ok((vault_signer(market, nonce, &self.programs.dex)?, nonce)),
      None => find_vault_signer_nonce(market, &self.programs.dex),
    }
  }
}
