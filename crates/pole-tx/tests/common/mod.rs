//! In-memory ledger that executes settlement batches the way the pool,
//! lending and market programs would, closely enough to exercise the
//! orchestrator end to end.
//!
//! The reserve is modelled as holding only this pool's liquidity, so its
//! available liquidity is the pool's position. Refreshes never accrue;
//! interest arrives through [`SimLedger::accrue`].

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pole_chain::address::{associated_token_address, find_vault_signer_nonce};
use pole_chain::event::PROGRAM_DATA_PREFIX;
use pole_chain::instruction::{sighash, DEPOSIT_WALLET_INDEX, REDEEM_WALLET_INDEX};
use pole_chain::layout::{LayoutVersion, PoolAccount, PortState};
use pole_chain::lending::LendingInstruction;
use pole_chain::{AddressResolver, PoleInstruction, ProgramIds};
use pole_core::accounting::{exchange_rate, liquidity_to_lp, redeem_amount_for_lp, split_withdraw_fee};
use pole_core::constants::{MIN_LIQUIDITY_CAP, STALE_SLOT};
use pole_core::math::mul_div_down;
use pole_tx::{
    Confirmation, LedgerError, LedgerReader, MarketSnapshot, ObligationSnapshot, ReserveSnapshot, SettlementBatch,
    StepKind, Transport, TransportError,
};
use solana_instruction::Instruction;
use solana_pubkey::Pubkey;
use solana_signature::Signature;

pub const POOL_NAME: &str = "USDC";
pub const ITERATIONS: u64 = 3;
pub const FEE_BIPS: u64 = 10;
pub const MIN_DEPOSIT: u64 = 100;
pub const DEFAULT_CAP: u64 = 1_000_000_000_000_000;
/// Liquidity units received per reward unit sold
pub const REWARD_PRICE: u64 = 2;

/// An event line as the pool program logs it.
fn encode_log(name: &str, fields: &[u64]) -> String {
    let mut bytes = sighash("event", name).to_vec();
    for f in fields {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    format!("{PROGRAM_DATA_PREFIX}{}", STANDARD.encode(bytes))
}

#[derive(Clone, Debug)]
pub struct SimState {
    pub programs: ProgramIds,
    pub pool_address: Pubkey,
    pub pool: PoolAccount,
    pub reserve_address: Pubkey,
    pub reserve: ReserveSnapshot,
    pub obligation_address: Pubkey,
    pub obligation: ObligationSnapshot,
    pub market_address: Pubkey,
    pub market: MarketSnapshot,
    pub reward_supply: Pubkey,
    pub balances: HashMap<Pubkey, u64>,
    pub pending_rewards: u64,
    pub slot: u64,
    pub reserve_refreshes: u64,
    pub faulty_admin: bool,
    pub fail_next: Option<TransportError>,
    pub submitted: Vec<Vec<StepKind>>,
    reserve_fresh: bool,
    obligation_fresh: bool,
    redeem_lp_burned: u64,
}

type StepResult = Result<(), String>;

impl SimState {
    fn idle(&self) -> u64 {
        self.balance(&self.pool.generic_config.liquidity_supply)
    }

    pub fn balance(&self, account: &Pubkey) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn credit(&mut self, account: Pubkey, amount: u64) {
        *self.balances.entry(account).or_insert(0) += amount;
    }

    fn debit(&mut self, account: Pubkey, amount: u64) -> StepResult {
        let balance = self.balances.entry(account).or_insert(0);
        if *balance < amount {
            return Err(format!("insufficient funds in {account}: {} < {amount}", *balance));
        }
        *balance -= amount;
        Ok(())
    }

    fn execute(&mut self, instructions: &[Instruction], payer: &Pubkey, logs: &mut Vec<String>) -> Result<(), (usize, String)> {
        self.reserve_fresh = false;
        self.obligation_fresh = false;
        for (index, ix) in instructions.iter().enumerate() {
            let result = if ix.program_id == self.programs.port_lending {
                self.lending(ix)
            } else if ix.program_id == self.programs.pole {
                logs.push(format!("Program {} invoke [1]", self.programs.pole));
                self.pole(index, ix, instructions, payer, logs)
            } else {
                Err(format!("unknown program {}", ix.program_id))
            };
            result.map_err(|reason| (index, reason))?;
        }
        Ok(())
    }

    fn lending(&mut self, ix: &Instruction) -> StepResult {
        match LendingInstruction::decode(&ix.data) {
            Some(LendingInstruction::RefreshReserve) => {
                if ix.accounts[0].pubkey != self.reserve_address {
                    return Err("refresh of an unknown reserve".into());
                }
                self.reserve_refreshes += 1;
                self.reserve_fresh = true;
                Ok(())
            }
            Some(LendingInstruction::RefreshObligation) => {
                if ix.accounts[0].pubkey != self.obligation_address {
                    return Err("refresh of an unknown obligation".into());
                }
                let passed: Vec<Pubkey> = ix.accounts[2..].iter().map(|m| m.pubkey).collect();
                let registered: Vec<Pubkey> = self
                    .obligation
                    .deposit_reserves
                    .iter()
                    .chain(&self.obligation.borrow_reserves)
                    .copied()
                    .collect();
                if passed != registered {
                    return Err("obligation refresh reserves do not match registration".into());
                }
                if !registered.is_empty() && !self.reserve_fresh {
                    return Err("reserve is stale".into());
                }
                self.obligation_fresh = true;
                Ok(())
            }
            None => Err("unknown lending instruction".into()),
        }
    }

    fn pole(
        &mut self,
        index: usize,
        ix: &Instruction,
        all: &[Instruction],
        payer: &Pubkey,
        logs: &mut Vec<String>,
    ) -> StepResult {
        if ix.accounts[0].pubkey != self.pool_address {
            return Err("wrong pool account".into());
        }
        let decoded = PoleInstruction::decode(&ix.data).map_err(|e| e.to_string())?;
        match decoded {
            PoleInstruction::VerifyDeposit | PoleInstruction::VerifyRedeem => self.verify(decoded, &all[index + 1..]),
            PoleInstruction::DepositLiquidity { amount } => self.deposit(ix, amount, payer, logs),
            PoleInstruction::RedeemLiquidity { amount } => self.redeem(ix, amount, payer, logs),
            PoleInstruction::ClaimAndSell => self.claim_and_sell(ix, logs),
            admin => self.admin(ix, admin),
        }
    }

    fn verify(&mut self, which: PoleInstruction, rest: &[Instruction]) -> StepResult {
        let mut count = 0u64;
        let mut wallet: Option<Pubkey> = None;
        for ix in rest.iter().filter(|ix| ix.program_id == self.programs.pole) {
            let (amount, wallet_index) = match (which, PoleInstruction::decode(&ix.data).map_err(|e| e.to_string())?) {
                (PoleInstruction::VerifyDeposit, PoleInstruction::DepositLiquidity { amount }) => (amount, DEPOSIT_WALLET_INDEX),
                (PoleInstruction::VerifyRedeem, PoleInstruction::RedeemLiquidity { amount }) => (amount, REDEEM_WALLET_INDEX),
                _ => return Err("InvalidTransaction".into()),
            };
            if (amount > 0) != (count == 0) {
                return Err("InvalidTransaction: amount position".into());
            }
            let w = ix.accounts[wallet_index].pubkey;
            if *wallet.get_or_insert(w) != w {
                return Err("InvalidTransaction: wallet changed".into());
            }
            count += 1;
        }
        if count != self.pool.port_config.port_iterate {
            return Err("InvalidTransaction: iteration count".into());
        }
        let state = &mut self.pool.port_state;
        match which {
            PoleInstruction::VerifyDeposit => state.deposit_verified = 1,
            _ => state.redeem_verified = 1,
        }
        state.approved_wallet = wallet.unwrap_or_default();
        Ok(())
    }

    /// Rewards must have been sold within the window; a pool that never
    /// sold is exempt only when `never_sold_ok`.
    fn check_sold_recently(&self, never_sold_ok: bool) -> StepResult {
        let last = self.pool.port_state.last_sold_slot;
        if last == 0 && never_sold_ok {
            return Ok(());
        }
        if self.slot.saturating_sub(last) > STALE_SLOT {
            return Err(format!("PortNotSell: last sold at {last}, now {}", self.slot));
        }
        Ok(())
    }

    fn check_signer(ix: &Instruction, payer: &Pubkey) -> StepResult {
        match ix.accounts.iter().find(|m| m.is_signer) {
            Some(m) if m.pubkey == *payer => Ok(()),
            _ => Err("missing transfer authority signature".into()),
        }
    }

    /// Sweep idle pool liquidity into the reserve and register the
    /// obligation against it, as the leveraged lending loop does.
    fn sweep_into_reserve(&mut self) {
        let idle = self.idle();
        self.balances.insert(self.pool.generic_config.liquidity_supply, 0);
        self.reserve.available_liquidity += idle;
        if self.obligation.deposit_reserves.is_empty() {
            self.obligation.deposit_reserves = vec![self.reserve_address];
            self.obligation.borrow_reserves = vec![self.reserve_address];
        }
    }

    fn deposit(&mut self, ix: &Instruction, amount: u64, payer: &Pubkey, logs: &mut Vec<String>) -> StepResult {
        Self::check_signer(ix, payer)?;
        self.check_sold_recently(true)?;
        let leverage = self.pool.port_state.leverage;
        if self.pool.port_state.deposit_verified != 1 {
            return Err("deposit not verified".into());
        }
        if (leverage == 0) != (amount > 0) {
            return Err("InvalidInput: amount at leverage step".into());
        }
        let user_wallet = ix.accounts[DEPOSIT_WALLET_INDEX].pubkey;
        if user_wallet != self.pool.port_state.approved_wallet {
            return Err("wallet not approved".into());
        }
        if !self.reserve_fresh {
            return Err("reserve is stale".into());
        }
        if self.obligation_fresh == (amount == 0) {
            return Err("obligation freshness does not match leverage step".into());
        }

        if leverage == 0 {
            let port = self.reserve.available_liquidity;
            let idle = self.idle();
            if port + idle + amount >= self.pool.generic_config.liquidity_cap {
                return Err("MeetDepositLimit".into());
            }
            self.debit(user_wallet, amount)?;
            self.credit(self.pool.generic_config.liquidity_supply, amount);
            self.pool.port_state.init_port_liquidity = [port, 0, 0];
            self.pool.port_state.user_liquidity_percentage = [amount, amount + idle];
        }

        self.sweep_into_reserve();
        self.reserve_fresh = false;
        self.obligation_fresh = false;

        self.pool.port_state.leverage += 1;
        if self.pool.port_state.leverage == self.pool.port_config.port_iterate {
            let init = self.pool.port_state.init_port_liquidity[0];
            let [num, den] = self.pool.port_state.user_liquidity_percentage;
            let after = self.reserve.available_liquidity;
            let gain = mul_div_down(after - init, num, den).ok_or("overflow")?;
            let rate = exchange_rate(self.pool.basic_state.lp_amount, after - gain).map_err(|e| e.to_string())?;
            let minted = liquidity_to_lp(rate, gain).map_err(|e| e.to_string())?;

            self.pool.basic_state.lp_amount += minted;
            self.credit(ix.accounts[5].pubkey, minted);
            let last_sold_slot = match self.pool.port_state.last_sold_slot {
                0 => self.slot,
                last => last,
            };
            self.pool.port_state = PortState {
                last_sold_slot,
                ..PortState::default()
            };
            logs.push(encode_log("DidDeposit", &[gain, minted]));
        }
        Ok(())
    }

    fn redeem(&mut self, ix: &Instruction, amount: u64, payer: &Pubkey, logs: &mut Vec<String>) -> StepResult {
        Self::check_signer(ix, payer)?;
        self.check_sold_recently(false)?;
        let leverage = self.pool.port_state.leverage;
        if self.pool.port_state.redeem_verified != 1 {
            return Err("redeem not verified".into());
        }
        if (leverage == 0) != (amount > 0) {
            return Err("InvalidInput: amount at leverage step".into());
        }
        if ix.accounts[REDEEM_WALLET_INDEX].pubkey != self.pool.port_state.approved_wallet {
            return Err("wallet not approved".into());
        }
        if ix.accounts[2].pubkey != self.pool.generic_config.fee_receiver {
            return Err("InvalidFeeReceiver".into());
        }
        if !self.reserve_fresh || !self.obligation_fresh {
            return Err("reserve or obligation is stale".into());
        }
        let user_liquidity = ix.accounts[3].pubkey;
        let user_lp = ix.accounts[REDEEM_WALLET_INDEX].pubkey;

        if leverage == 0 {
            let idle = self.idle();
            let pooled = self.reserve.available_liquidity + idle;
            let redeem = redeem_amount_for_lp(amount, self.pool.basic_state.lp_amount, pooled).map_err(|e| e.to_string())?;
            self.debit(user_lp, amount)?;
            self.pool.basic_state.lp_amount -= amount;
            self.pool.port_state.redeem_amount = redeem;
            self.pool.port_state.amount_to_unroll = redeem.saturating_sub(idle);
            self.redeem_lp_burned = amount;
        }

        if self.pool.port_state.is_redeemed != 1 {
            let steps_left = self.pool.port_config.port_iterate - leverage;
            let chunk = self.pool.port_state.amount_to_unroll.div_ceil(steps_left);
            self.reserve.available_liquidity -= chunk;
            self.credit(self.pool.generic_config.liquidity_supply, chunk);
            self.pool.port_state.amount_to_unroll -= chunk;

            if self.pool.port_state.amount_to_unroll == 0 {
                let redeem = self.pool.port_state.redeem_amount;
                let (net, fee) = split_withdraw_fee(redeem, self.pool.generic_config.withdraw_fee_bips)
                    .map_err(|e| e.to_string())?;
                self.debit(self.pool.generic_config.liquidity_supply, redeem)?;
                self.credit(self.pool.generic_config.fee_receiver, fee);
                self.credit(user_liquidity, net);
                self.pool.port_state.is_redeemed = 1;
                logs.push(encode_log("DidRedeem", &[redeem, self.redeem_lp_burned]));
            }
        }

        self.reserve_fresh = false;
        self.obligation_fresh = false;
        self.pool.port_state.leverage += 1;
        if self.pool.port_state.leverage == self.pool.port_config.port_iterate {
            self.pool.port_state = PortState {
                last_sold_slot: self.pool.port_state.last_sold_slot,
                ..PortState::default()
            };
        }
        Ok(())
    }

    fn claim_and_sell(&mut self, ix: &Instruction, logs: &mut Vec<String>) -> StepResult {
        let (signer, _) = find_vault_signer_nonce(&self.market_address, &self.programs.dex).map_err(|e| e.to_string())?;
        if ix.accounts[4].pubkey != self.market_address || ix.accounts[12].pubkey != signer {
            return Err("wrong market accounts".into());
        }
        let sold = std::mem::take(&mut self.pending_rewards);
        self.credit(self.pool.generic_config.liquidity_supply, sold * REWARD_PRICE);
        self.pool.port_state.last_sold_slot = self.slot;
        logs.push(encode_log("DidSell", &[sold, self.slot]));
        Ok(())
    }

    fn admin(&mut self, ix: &Instruction, change: PoleInstruction) -> StepResult {
        let owner = &ix.accounts[1];
        if !owner.is_signer || owner.pubkey != self.pool.generic_config.owner {
            return Err("InvalidOwner".into());
        }
        let skew = u64::from(self.faulty_admin);
        let config = &mut self.pool.generic_config;
        match change {
            PoleInstruction::ChangeLiquidityCap { cap } => {
                if cap < MIN_LIQUIDITY_CAP {
                    return Err("InvalidPoolConfig".into());
                }
                config.liquidity_cap = cap + skew;
            }
            PoleInstruction::ChangeWithdrawFee { bips } => config.withdraw_fee_bips = bips as u64 + skew,
            PoleInstruction::ChangeMinDeposit { min_deposit } => self.pool.port_config.min_deposit = min_deposit + skew,
            PoleInstruction::ChangeFeeReceiver { fee_receiver } => config.fee_receiver = fee_receiver,
            PoleInstruction::ChangeOwner { owner } => config.owner = owner,
            other => return Err(format!("{} is not an admin instruction", other.name())),
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct SimLedger {
    state: Arc<Mutex<SimState>>,
}

impl SimLedger {
    /// A configured, empty pool owned by `owner`.
    pub fn new(owner: Pubkey) -> Self {
        let programs = ProgramIds::default();
        let resolver = AddressResolver::new(programs);
        let (pool_address, bump) = resolver.pool(POOL_NAME.as_bytes()).unwrap();
        let k = Pubkey::new_unique;

        let mut pool = PoolAccount::default();
        pool.generic_config.bump = bump as u64;
        pool.generic_config.liquidity_cap = DEFAULT_CAP;
        pool.generic_config.withdraw_fee_bips = FEE_BIPS;
        pool.generic_config.fee_receiver = k();
        pool.generic_config.owner = owner;
        pool.generic_config.lp_mint = k();
        pool.generic_config.liquidity_supply = k();
        pool.generic_config.token_program = programs.token;
        pool.port_config.min_deposit = MIN_DEPOSIT;
        pool.port_config.obligation = k();
        pool.port_config.reserve = k();
        pool.port_config.stake_account = k();
        pool.port_config.port_lending_program = programs.port_lending;
        pool.port_config.port_staking_program = programs.port_staking;
        pool.port_config.port_token_mint = k();
        pool.port_config.port_lp_supply = k();
        pool.port_config.port_supply = k();
        pool.port_config.port_iterate = ITERATIONS;
        pool.serum_config.dex_program = programs.dex;
        pool.serum_config.swap_program = programs.swap;
        pool.serum_config.port_open_orders = k();

        let reserve = ReserveSnapshot {
            available_liquidity: 0,
            liquidity_mint: k(),
            liquidity_supply: k(),
            fee_receiver: k(),
            collateral_mint: k(),
            collateral_supply: k(),
            lending_market: k(),
            staking_pool: k(),
            oracle: Some(k()),
        };
        let market = MarketSnapshot {
            request_queue: k(),
            event_queue: k(),
            bids: k(),
            asks: k(),
            coin_vault: k(),
            pc_vault: k(),
            vault_signer_nonce: None,
        };

        let state = SimState {
            programs,
            pool_address,
            reserve_address: pool.port_config.reserve,
            obligation_address: pool.port_config.obligation,
            pool,
            reserve,
            obligation: ObligationSnapshot::default(),
            market_address: k(),
            market,
            reward_supply: k(),
            balances: HashMap::new(),
            pending_rewards: 0,
            slot: 1,
            reserve_refreshes: 0,
            faulty_admin: false,
            fail_next: None,
            submitted: Vec::new(),
            reserve_fresh: false,
            obligation_fresh: false,
            redeem_lp_burned: 0,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn pool(&self) -> PoolAccount {
        self.with(|s| s.pool)
    }

    pub fn lp_wallet(&self, user: &Pubkey) -> Pubkey {
        self.with(|s| associated_token_address(user, &s.pool.generic_config.lp_mint, &s.programs.token))
    }

    pub fn liquidity_wallet(&self, user: &Pubkey) -> Pubkey {
        self.with(|s| associated_token_address(user, &s.reserve.liquidity_mint, &s.programs.token))
    }

    pub fn lp_balance(&self, user: &Pubkey) -> u64 {
        let wallet = self.lp_wallet(user);
        self.with(|s| s.balance(&wallet))
    }

    pub fn liquidity_balance(&self, user: &Pubkey) -> u64 {
        let wallet = self.liquidity_wallet(user);
        self.with(|s| s.balance(&wallet))
    }

    pub fn fee_balance(&self) -> u64 {
        self.with(|s| s.balance(&s.pool.generic_config.fee_receiver))
    }

    pub fn fund(&self, user: &Pubkey, amount: u64) {
        let wallet = self.liquidity_wallet(user);
        self.with(|s| s.credit(wallet, amount));
    }

    /// An already-running pool: `reserve_liquidity` in the reserve backing
    /// `lp_supply` LP, all of it held by `holder`.
    pub fn seed(&self, reserve_liquidity: u64, lp_supply: u64, holder: &Pubkey) {
        let lp_wallet = self.lp_wallet(holder);
        self.with(|s| {
            s.reserve.available_liquidity = reserve_liquidity;
            s.pool.basic_state.lp_amount = lp_supply;
            s.balances.insert(lp_wallet, lp_supply);
            s.obligation.deposit_reserves = vec![s.reserve_address];
            s.obligation.borrow_reserves = vec![s.reserve_address];
        });
    }

    /// Let the ledger move on without submitting anything.
    pub fn advance_slots(&self, slots: u64) {
        self.with(|s| s.slot += slots);
    }

    pub fn slot(&self) -> u64 {
        self.with(|s| s.slot)
    }

    /// Interest accrued by the reserve on the pool's position
    pub fn accrue(&self, amount: u64) {
        self.with(|s| s.reserve.available_liquidity += amount);
    }

    pub fn available_liquidity(&self) -> u64 {
        self.with(|s| s.reserve.available_liquidity)
    }

    pub fn market_address(&self) -> Pubkey {
        self.with(|s| s.market_address)
    }

    pub fn reward_supply(&self) -> Pubkey {
        self.with(|s| s.reward_supply)
    }

    pub fn submitted(&self) -> Vec<Vec<StepKind>> {
        self.with(|s| s.submitted.clone())
    }
}

#[async_trait]
impl LedgerReader for SimLedger {
    async fn account_data(&self, address: &Pubkey) -> Result<Vec<u8>, LedgerError> {
        self.with(|s| {
            if *address != s.pool_address {
                return Err(LedgerError::AccountNotFound(*address));
            }
            s.pool
                .encode(LayoutVersion::V1)
                .map_err(|e| LedgerError::Unavailable(e.to_string()))
        })
    }

    async fn token_balance(&self, address: &Pubkey) -> Result<u64, LedgerError> {
        Ok(self.with(|s| s.balance(address)))
    }

    async fn reserve(&self, address: &Pubkey) -> Result<ReserveSnapshot, LedgerError> {
        self.with(|s| {
            if *address == s.reserve_address {
                Ok(s.reserve)
            } else {
                Err(LedgerError::WrongAccountType {
                    address: *address,
                    expected: "reserve",
                })
            }
        })
    }

    async fn obligation(&self, address: &Pubkey) -> Result<ObligationSnapshot, LedgerError> {
        self.with(|s| {
            if *address == s.obligation_address {
                Ok(s.obligation.clone())
            } else {
                Err(LedgerError::WrongAccountType {
                    address: *address,
                    expected: "obligation",
                })
            }
        })
    }

    async fn current_slot(&self) -> Result<u64, LedgerError> {
        Ok(self.with(|s| s.slot))
    }

    async fn market(&self, address: &Pubkey) -> Result<MarketSnapshot, LedgerError> {
        self.with(|s| {
            if *address == s.market_address {
                Ok(s.market)
            } else {
                Err(LedgerError::WrongAccountType {
                    address: *address,
                    expected: "market",
                })
            }
        })
    }
}

#[async_trait]
impl Transport for SimLedger {
    async fn submit(&self, batch: &SettlementBatch, payer: &Pubkey) -> Result<Confirmation, TransportError> {
        self.with(|s| {
            if let Some(err) = s.fail_next.take() {
                return Err(err);
            }
            s.submitted.push(batch.steps().map(|step| step.kind).collect());
            s.slot += 1;

            let snapshot = s.clone();
            let mut logs = Vec::new();
            if let Err((step, reason)) = s.execute(&batch.instructions(), payer, &mut logs) {
                let submitted = std::mem::take(&mut s.submitted);
                *s = snapshot;
                s.submitted = submitted;
                return Err(TransportError::Rejected {
                    step: Some(step),
                    reason,
                });
            }

            let mut signature = [0u8; 64];
            signature[..8].copy_from_slice(&s.slot.to_le_bytes());
            Ok(Confirmation {
                signature: Signature::from(signature),
                logs,
            })
        })
    }
}
