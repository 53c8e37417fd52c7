//! Settlement batches
//!
//! A batch is a fixed preamble followed by a convergence body repeated
//! `iteration_count - 1` times. The flat step sequence submitted to the
//! ledger is derived from that structure, never stored.

use std::fmt;

use pole_chain::instruction::{DEPOSIT_WALLET_INDEX, REDEEM_WALLET_INDEX};
use pole_chain::lending::LendingInstruction;
use pole_chain::{PoleInstruction, ProgramIds};
use pole_core::AccountingError;
use solana_instruction::Instruction;
use solana_pubkey::Pubkey;

use crate::error::{Result, SettlementError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind {
  VerifyIntegrity,
  RefreshReserve,
  RefreshObligation,
  ApplyDeposit { amount: u64 },
  ApplyWithdraw { amount: u64 },
  ClaimAndSell,
  Admin(&'static str),
}

impl fmt::Display for StepKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StepKind::VerifyIntegrity => write!(f, "verify-integrity"),
      StepKind::RefreshReserve => write!(f, "refresh-reserve"),
      StepKind::RefreshObligation => write!(f, "refresh-obligation"),
      StepKind::ApplyDeposit { amount } => write!(f, "apply-deposit({amount})"),
      StepKind::ApplyWithdraw { amount } => write!(f, "apply-withdraw({amount})"),
      StepKind::ClaimAndSell => write!(f, "claim-and-sell"),
      StepKind::Admin(name) => write!(f, "admin:{name}"),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
  pub kind: StepKind,
  pub instruction: Instruction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementBatch {
  pub preamble: Vec<Step>,
  pub convergence_body: Vec<Step>,
  pub repeats: u64,
}

impl SettlementBatch {
  /// One-step batch with no convergence body
  pub fn single(kind: StepKind, instruction: Instruction) -> Self {
    Self {
      preamble: vec![Step { kind, instruction }],
      convergence_body: Vec::new(),
      repeats: 0,
    }
  }

  /// Flat step sequence in submission order
  pub fn steps(&self) -> impl Iterator<Item = &Step> + '_ {
    self
      .preamble
      .iter()
      .chain((0..self.repeats).flat_map(move |_| self.convergence_body.iter()))
  }

  pub fn len(&self) -> usize {
    self.preamble.len() + self.convergence_body.len() * self.repeats as usize
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn step(&self, index: usize) -> Option<&Step> {
    self.steps().nth(index)
  }

  pub fn instructions(&self) -> Vec<Instruction> {
    self.steps().map(|s| s.instruction.clone()).collect()
  }
}

/// Assembles a [`SettlementBatch`] from preamble and convergence steps.
#[derive(Debug, Default)]
pub struct BatchBuilder {
  preamble: Vec<Step>,
  body: Vec<Step>,
}

impl BatchBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a step that runs once.
  pub fn then(mut self, kind: StepKind, instruction: Instruction) -> Self {
    self.preamble.push(Step { kind, instruction });
    self
  }

  /// Append a step to the convergence body.
  pub fn repeat(mut self, kind: StepKind, instruction: Instruction) -> Self {
    self.body.push(Step { kind, instruction });
    self
  }

  pub fn build(self, iteration_count: u64) -> Result<SettlementBatch> {
    let repeats = iteration_count
      .checked_sub(1)
      .ok_or(AccountingError::InvalidPoolConfig("iteration count must be in [1, 10)"))?;
    Ok(SettlementBatch {
      preamble: self.preamble,
      convergence_body: self.body,
      repeats,
    })
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
  Deposit,
  Redeem,
}

fn reject(step: usize, reason: impl Into<String>) -> SettlementError {
  SettlementError::BatchRejected {
    step: Some(step),
    reason: format!("pre-submit check: {}", reason.into()),
  }
}

/// Check a deposit or redeem batch against the rules the pool program
/// enforces, so a malformed batch fails before it costs a submission.
///
/// * the first step is the verify instruction for the flow
/// * every later pool instruction is the flow's apply instruction
/// * exactly `iteration_count` applies, only the first carrying an amount
/// * one participant wallet across all applies
/// * the reserve is refreshed before every apply
/// * redeem refreshes the obligation before every apply; deposit refreshes
///   it before the first apply only
pub fn check_integrity(batch: &SettlementBatch, programs: &ProgramIds, iteration_count: u64) -> Result<()> {
  let mut steps = batch.steps().enumerate();
  let flow = match steps.next() {
    Some((_, step)) if step.instruction.program_id == programs.pole => {
      match PoleInstruction::decode(&step.instruction.data)? {
        PoleInstruction::VerifyDeposit => Flow::Deposit,
        PoleInstruction::VerifyRedeem => Flow::Redeem,
        other => return Err(reject(0, format!("{} cannot open a settlement batch", other.name()))),
      }
    }
    _ => return Err(reject(0, "batch must open with a verify instruction")),
  };

  let mut applies = 0u64;
  let mut wallet: Option<Pubkey> = None;
  let mut reserve_fresh = false;
  let mut obligation_fresh = false;

  for (index, step) in steps {
    let ix = &step.instruction;
    if ix.program_id == programs.port_lending {
      match LendingInstruction::decode(&ix.data) {
        Some(LendingInstruction::RefreshReserve) => reserve_fresh = true,
        Some(LendingInstruction::RefreshObligation) => obligation_fresh = true,
        None => return Err(reject(index, "unknown lending instruction")),
      }
      continue;
    }
    if ix.program_id != programs.pole {
      continue;
    }

    let (amount, wallet_index) = match (flow, PoleInstruction::decode(&ix.data)?) {
      (Flow::Deposit, PoleInstruction::DepositLiquidity { amount }) => (amount, DEPOSIT_WALLET_INDEX),
      (Flow::Redeem, PoleInstruction::RedeemLiquidity { amount }) => (amount, REDEEM_WALLET_INDEX),
      (_, other) => return Err(reject(index, format!("{} inside a {flow:?} batch", other.name()))),
    };

    if (amount > 0) != (applies == 0) {
      return Err(reject(index, "only the first apply may carry an amount"));
    }
    let step_wallet = ix
      .accounts
      .get(wallet_index)
      .map(|m| m.pubkey)
      .ok_or_else(|| reject(index, "apply instruction is missing the participant wallet"))?;
    if *wallet.get_or_insert(step_wallet) != step_wallet {
      return Err(reject(index, "participant wallet changes between applies"));
    }
    if !reserve_fresh {
      return Err(reject(index, "reserve not refreshed before apply"));
    }
    match flow {
      Flow::Redeem if !obligation_fresh => {
        return Err(reject(index, "obligation not refreshed before redeem"));
      }
      Flow::Deposit if (applies == 0) != obligation_fresh => {
        return Err(reject(
          index,
          "obligation must be refreshed before the first deposit only",
        ));
      }
      _ => {}
    }

    applies += 1;
    reserve_fresh = false;
    obligation_fresh = false;
  }

  if applies != iteration_count {
    return Err(SettlementError::BatchRejected {
      step: None,
      reason: format!("pre-submit check: {applies} applies, pool iterates {iteration_count} times"),
    });
  }
  Ok(())
}
