//! Environment configuration
//!
//! An optional `.env` file is loaded first; process environment wins over
//! it. Every setting has a default except the payer, which only planning
//! commands require.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_POLE_PROGRAM_ID: &str = "PoLEr5uRhLSpEZgmBaSmzTUVbEANuFp4vBARZbKsqnu";
pub const DEFAULT_PORT_LENDING_PROGRAM_ID: &str = "Port7uDYB3wk6GJAw4KT1WpTeMtSu9bTcChBHkX2LfR";
pub const DEFAULT_PORT_STAKING_PROGRAM_ID: &str = "stkarvwmSzv2BygN5e2LeTwimTczLWHCKPKGC2zVLiq";
pub const DEFAULT_DEX_PROGRAM_ID: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";
pub const DEFAULT_SWAP_PROGRAM_ID: &str = "22Y43yTVxuUkoRKdm9thyRhQ3SdgQS7c7kB6UNCiaczD";
pub const DEFAULT_POOL_NAME: &str = "USDC";
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Longest seed a program address derivation accepts
const MAX_SEED_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
  #[error("{0} is not set")]
  Missing(&'static str),

  #[error("{key}={value:?} is invalid: {reason}")]
  Invalid {
    key: &'static str,
    value: String,
    reason: &'static str,
  },
}

/// Base58 program identities, parsed into addresses by the chain crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramConfig {
  pub pole: String,
  pub port_lending: String,
  pub port_staking: String,
  pub dex: String,
  pub swap: String,
}

impl Default for ProgramConfig {
  fn default() -> Self {
    Self {
      pole: DEFAULT_POLE_PROGRAM_ID.to_string(),
      port_lending: DEFAULT_PORT_LENDING_PROGRAM_ID.to_string(),
      port_staking: DEFAULT_PORT_STAKING_PROGRAM_ID.to_string(),
      dex: DEFAULT_DEX_PROGRAM_ID.to_string(),
      swap: DEFAULT_SWAP_PROGRAM_ID.to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
  pub programs: ProgramConfig,
  pub pool_name: String,
  pub payer: Option<String>,
  pub rpc_url: Option<String>,
  pub log_filter: String,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      programs: ProgramConfig::default(),
      pool_name: DEFAULT_POOL_NAME.to_string(),
      payer: None,
      rpc_url: None,
      log_filter: DEFAULT_LOG_FILTER.to_string(),
    }
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    let _ = dotenvy::dotenv();
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Build from any key lookup; empty values count as unset.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

    let config = Self {
      programs: ProgramConfig {
        pole: or("POLE_PROGRAM_ID", DEFAULT_POLE_PROGRAM_ID),
        port_lending: or("POLE_PORT_LENDING_PROGRAM_ID", DEFAULT_PORT_LENDING_PROGRAM_ID),
        port_staking: or("POLE_PORT_STAKING_PROGRAM_ID", DEFAULT_PORT_STAKING_PROGRAM_ID),
        dex: or("POLE_DEX_PROGRAM_ID", DEFAULT_DEX_PROGRAM_ID),
        swap: or("POLE_SWAP_PROGRAM_ID", DEFAULT_SWAP_PROGRAM_ID),
      },
      pool_name: or("POLE_POOL_NAME", DEFAULT_POOL_NAME),
      payer: get("POLE_PAYER"),
      rpc_url: get("POLE_RPC_URL"),
      log_filter: or("POLE_LOG_FILTER", DEFAULT_LOG_FILTER),
    };
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.pool_name.len() > MAX_SEED_LEN {
      return Err(ConfigError::Invalid {
        key: "POLE_POOL_NAME",
        value: self.pool_name.clone(),
        reason: "longer than 32 bytes",
      });
    }
    if let Some(url) = &self.rpc_url {
      if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::Invalid {
          key: "POLE_RPC_URL",
          value: url.clone(),
          reason: "must be an http(s) url",
        });
      }
    }
    Ok(())
  }

  /// The payer, for commands that sign.
  pub fn require_payer(&self) -> Result<&str, ConfigError> {
    self.payer.as_deref().ok_or(ConfigError::Missing("POLE_PAYER"))
  }
}
