//! Offline settlement planner
//!
//! Derives pool addresses and prints the batch a deposit or withdraw would
//! submit, step by step, with its encoded size. Nothing is signed or sent.

mod snapshot;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pole_chain::programs::parse_address;
use pole_chain::wire::{encoded_len, fits_in_packet, PACKET_DATA_SIZE};
use pole_chain::ProgramIds;
use pole_config::AppConfig;
use pole_tx::batch::check_integrity;
use pole_tx::plan::{deposit_batch, resolve_settlement_accounts, withdraw_batch};
use pole_tx::{SettlementBatch, SettlementContext};
use serde::Serialize;
use snapshot::PoolSnapshotFile;
use solana_pubkey::Pubkey;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "planner")]
#[command(about = "Plan Pole settlement batches without touching the network")]
struct Cli {
  /// Override the pool name from configuration
  #[arg(long)]
  pool: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Print the program-derived addresses of the configured pool
  Addresses,
  /// Plan a deposit of `amount` liquidity
  Deposit {
    /// JSON file describing the pool's accounts
    #[arg(long)]
    snapshot: String,
    #[arg(long)]
    amount: u64,
  },
  /// Plan a withdraw burning `lp_amount` LP
  Withdraw {
    #[arg(long)]
    snapshot: String,
    #[arg(long)]
    lp_amount: u64,
  },
}

#[derive(Serialize)]
struct AddressReport {
  pool_name: String,
  pool: String,
  pool_bump: u8,
  pool_authority: String,
  authority_bump: u8,
  user_balance: Option<String>,
}

#[derive(Serialize)]
struct StepLine {
  index: usize,
  kind: String,
  program: String,
  accounts: usize,
  data_len: usize,
}

#[derive(Serialize)]
struct PlanReport {
  flow: &'static str,
  pool: String,
  iterations: u64,
  steps: Vec<StepLine>,
  wire_len: usize,
  packet_limit: usize,
  fits_in_packet: bool,
}

fn load_context(config: &AppConfig, pool_override: Option<String>) -> Result<SettlementContext> {
  let p = &config.programs;
  let programs = ProgramIds::parse(&p.pole, &p.port_lending, &p.port_staking, &p.dex, &p.swap)?;
  let payer = match &config.payer {
    Some(payer) => parse_address("POLE_PAYER", payer)?,
    None => Pubkey::default(),
  };
  let pool_name = pool_override.unwrap_or_else(|| config.pool_name.clone());
  Ok(SettlementContext::new(programs, payer, pool_name))
}

fn addresses(ctx: &SettlementContext, has_payer: bool) -> Result<AddressReport> {
  let resolver = ctx.resolver();
  let (pool, pool_bump) = resolver.pool(ctx.pool_name.as_bytes())?;
  let (authority, authority_bump) = resolver.pool_authority()?;
  let user_balance = if has_payer {
    Some(resolver.user_balance(&ctx.payer, &pool)?.0.to_string())
  } else {
    None
  };
  Ok(AddressReport {
    pool_name: ctx.pool_name.clone(),
    pool: pool.to_string(),
    pool_bump,
    pool_authority: authority.to_string(),
    authority_bump,
    user_balance,
  })
}

fn report(flow: &'static str, pool: &Pubkey, iterations: u64, batch: &SettlementBatch, payer: &Pubkey) -> Result<PlanReport> {
  let steps = batch
    .steps()
    .enumerate()
    .map(|(index, step)| StepLine {
      index,
      kind: step.kind.to_string(),
      program: step.instruction.program_id.to_string(),
      accounts: step.instruction.accounts.len(),
      data_len: step.instruction.data.len(),
    })
    .collect();
  let instructions = batch.instructions();
  let wire_len = encoded_len(&instructions, payer)?;
  let fits = fits_in_packet(&instructions, payer)?;
  if !fits {
    warn!(flow, wire_len, limit = PACKET_DATA_SIZE, "batch exceeds packet size");
  }
  Ok(PlanReport {
    flow,
    pool: pool.to_string(),
    iterations,
    steps,
    wire_len,
    packet_limit: PACKET_DATA_SIZE,
    fits_in_packet: fits,
  })
}

#[derive(Clone, Copy)]
enum Flow {
  Deposit { amount: u64 },
  Withdraw { lp_amount: u64 },
}

impl Flow {
  fn name(self) -> &'static str {
    match self {
      Flow::Deposit { .. } => "deposit",
      Flow::Withdraw { .. } => "withdraw",
    }
  }
}

async fn plan(ctx: &SettlementContext, flow: Flow, snapshot: &str) -> Result<PlanReport> {
  let loaded = PoolSnapshotFile::load(snapshot).await?.into_snapshot(&ctx.programs)?;
  let pool_address = ctx.pool_address()?;
  let iterations = loaded.pool.port_config.port_iterate;
  let accounts = resolve_settlement_accounts(ctx, pool_address, &loaded.pool, &loaded.reserve)?;

  let batch = match flow {
    Flow::Deposit { amount } => deposit_batch(&ctx.programs, &accounts, &loaded.obligation, amount, iterations)?,
    Flow::Withdraw { lp_amount } => withdraw_batch(&ctx.programs, &accounts, lp_amount, iterations)?,
  };
  check_integrity(&batch, &ctx.programs, iterations).context("planned batch failed its integrity check")?;
  info!(flow = flow.name(), pool = %pool_address, steps = batch.len(), "planned batch");
  report(flow.name(), &pool_address, iterations, &batch, &ctx.payer)
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let config = AppConfig::from_env()?;
  pole_telemetry::init(&config.log_filter)?;

  let ctx = load_context(&config, cli.pool)?;
  let output = match cli.command {
    Command::Addresses => serde_json::to_string_pretty(&addresses(&ctx, config.payer.is_some())?)?,
    Command::Deposit { snapshot, amount } => {
      config.require_payer()?;
      serde_json::to_string_pretty(&plan(&ctx, Flow::Deposit { amount }, &snapshot).await?)?
    }
    Command::Withdraw { snapshot, lp_amount } => {
      config.require_payer()?;
      serde_json::to_string_pretty(&plan(&ctx, Flow::Withdraw { lp_amount }, &snapshot).await?)?
    }
  };
  println!("{output}");
  Ok(())
}
