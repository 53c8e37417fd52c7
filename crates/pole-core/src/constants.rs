pub const BPS_PRECISION: u64 = 10_000; // 100% = 10000 bps
pub const WAD: u128 = 1_000_000_000_000_000_000; // 18 decimal fixed point

/// Smallest liquidity cap the pool program accepts
pub const MIN_LIQUIDITY_CAP: u64 = 1_000_000;

/// Iteration count must be in [1, MAX_ITERATION_COUNT)
pub const MAX_ITERATION_COUNT: u64 = 10;

/// Reserve percentage must be below this
pub const MAX_RESERVE_PERCENTAGE: u64 = 10;

/// Minimum deposit must be strictly greater than this
pub const MIN_DEPOSIT_FLOOR: u64 = 10;

pub const MAX_WITHDRAW_FEE_BIPS: u64 = BPS_PRECISION;

/// Slots a pool may go without selling rewards before deposits and
/// withdraws are refused
pub const STALE_SLOT: u64 = 50;

// Deposit reconciliation bands, in bps of the requested amount
pub const DEPOSIT_LOWER_BAND_BPS: u64 = 9_500;
pub const DEPOSIT_STRICT_BAND_BPS: u64 = 9_999;
/// Requested amounts at or above this must land inside the strict band
pub const DEPOSIT_STRICT_BAND_THRESHOLD: u64 = 1_000_000;

// Withdraw payout band, in bps of the expected net amount
pub const WITHDRAW_LOWER_BAND_BPS: u64 = 9_990;
