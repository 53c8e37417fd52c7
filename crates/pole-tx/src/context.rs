use pole_chain::{AddressResolver, ChainError, ProgramIds};
use solana_pubkey::Pubkey;

/// Everything a settlement call needs besides ledger access: program
/// identities, the signing participant and the pool being settled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementContext {
  pub programs: ProgramIds,
  /// Signs every batch and owns the participant wallets
  pub payer: Pubkey,
  pub pool_name: String,
  /// Overrides the payer's associated liquidity token account
  pub user_liquidity_wallet: Option<Pubkey>,
}

impl SettlementContext {
  pub fn new(programs: ProgramIds, payer: Pubkey, pool_name: impl Into<String>) -> Self {
    Self {
      programs,
      payer,
      pool_name: pool_name.into(),
      user_liquidity_wallet: None,
    }
  }

  pub fn with_liquidity_wallet(mut self, wallet: Pubkey) -> Self {
    self.user_liquidity_wallet = Some(wallet);
    self
  }

  pub fn resolver(&self) -> AddressResolver {
    AddressResolver::new(self.programs)
  }

  pub fn pool_address(&self) -> Result<Pubkey, ChainError> {
    self.resolver().pool(self.pool_name.as_bytes()).map(|(address, _)| address)
  }
}
