//! Settlement orchestrator for Pole liquidity pools.
//!
//! Builds the ordered, iteration-unrolled batches for deposit, withdraw,
//! harvest and administrative flows, submits them through a [`Transport`]
//! and verifies the settled state read back through a [`LedgerReader`].

pub mod batch;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod transport;

pub use batch::{BatchBuilder, SettlementBatch, Step, StepKind};
pub use context::SettlementContext;
pub use error::SettlementError;
pub use orchestrator::{DepositReport, HarvestReport, Orchestrator, WithdrawAmount, WithdrawReport};
pub use plan::HarvestTarget;
pub use transport::{
  Confirmation, LedgerError, LedgerReader, MarketSnapshot, ObligationSnapshot, ReserveSnapshot, Transport,
  TransportError,
};
