//! Program identities the settlement flows talk to

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_pubkey::{pubkey, Pubkey};

use crate::error::ChainError;

pub const POLE_PROGRAM_ID: Pubkey = pubkey!("PoLEr5uRhLSpEZgmBaSmzTUVbEANuFp4vBARZbKsqnu");
pub const PORT_LENDING_PROGRAM_ID: Pubkey = pubkey!("Port7uDYB3wk6GJAw4KT1WpTeMtSu9bTcChBHkX2LfR");
pub const PORT_STAKING_PROGRAM_ID: Pubkey = pubkey!("stkarvwmSzv2BygN5e2LeTwimTczLWHCKPKGC2zVLiq");
pub const SERUM_DEX_PROGRAM_ID: Pubkey = pubkey!("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin");
pub const SWAP_PROGRAM_ID: Pubkey = pubkey!("22Y43yTVxuUkoRKdm9thyRhQ3SdgQS7c7kB6UNCiaczD");

pub mod sysvar {
  use solana_pubkey::{pubkey, Pubkey};

  pub const CLOCK: Pubkey = pubkey!("SysvarC1ock11111111111111111111111111111111");
  pub const RENT: Pubkey = pubkey!("SysvarRent111111111111111111111111111111111");
  pub const INSTRUCTIONS: Pubkey = pubkey!("Sysvar1nstructions1111111111111111111111111");
}

/// Every program a pool settles against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramIds {
  pub pole: Pubkey,
  pub port_lending: Pubkey,
  pub port_staking: Pubkey,
  pub dex: Pubkey,
  pub swap: Pubkey,
  pub token: Pubkey,
}

impl Default for ProgramIds {
  fn default() -> Self {
    Self {
      pole: POLE_PROGRAM_ID,
      port_lending: PORT_LENDING_PROGRAM_ID,
      port_staking: PORT_STAKING_PROGRAM_ID,
      dex: SERUM_DEX_PROGRAM_ID,
      swap: SWAP_PROGRAM_ID,
      token: spl_token::ID,
    }
  }
}

impl ProgramIds {
  /// Parse configured base58 identities. The token program is always SPL Token.
  pub fn parse(
    pole: &str,
    port_lending: &str,
    port_staking: &str,
    dex: &str,
    swap: &str,
  ) -> Result<Self, ChainError> {
    Ok(Self {
      pole: parse_address("pole program", pole)?,
      port_lending: parse_address("lending program", port_lending)?,
      port_staking: parse_address("staking program", port_staking)?,
      dex: parse_address("dex program", dex)?,
      swap: parse_address("swap program", swap)?,
      token: spl_token::ID,
    })
  }
}

/// Parse a base58 address, naming the setting it came from on failure.
pub fn parse_address(name: &'static str, value: &str) -> Result<Pubkey, ChainError> {
  Pubkey::from_str(value.trim()).map_err(|_| ChainError::InvalidAddress {
    name,
    value: value.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_round_trip_through_base58() {
    let ids = ProgramIds::default();
    assert_eq!(ids.pole.to_string(), "PoLEr5uRhLSpEZgmBaSmzTUVbEANuFp4vBARZbKsqnu");
    assert_eq!(ids.token.to_string(), "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
    assert_eq!(sysvar::CLOCK.to_string(), "SysvarC1ock11111111111111111111111111111111");
  }

  #[test]
  fn test_parse_address_names_the_setting() {
    assert_eq!(
      parse_address("pole", " PoLEr5uRhLSpEZgmBaSmzTUVbEANuFp4vBARZbKsqnu ").unwrap(),
      POLE_PROGRAM_ID
    );
    match parse_address("dex", "not-an-address") {
      Err(ChainError::InvalidAddress { name, value }) => {
        assert_eq!(name, "dex");
        assert_eq!(value, "not-an-address");
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn test_parse_program_ids() {
    let ids = ProgramIds::parse(
      "PoLEr5uRhLSpEZgmBaSmzTUVbEANuFp4vBARZbKsqnu",
      "Port7uDYB3wk6GJAw4KT1WpTeMtSu9bTcChBHkX2LfR",
      "stkarvwmSzv2BygN5e2LeTwimTczLWHCKPKGC2zVLiq",
      "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin",
      "22Y43yTVxuUkoRKdm9thyRhQ3SdgQS7c7kB6UNCiaczD",
    )
    .unwrap();
    assert_eq!(ids, ProgramIds::default());

    let err = ProgramIds::parse("x", "", "", "", "").unwrap_err();
    assert!(matches!(err, ChainError::InvalidAddress { name: "pole program", .. }));
  }
}
