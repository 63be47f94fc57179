//! Engine constants. Percentages use five implied decimals (`1e5` = 100%).

/// One day in seconds.
pub const DAY: u64 = 86_400;

/// One hour in seconds.
pub const HOUR: u64 = 3_600;

/// 100% in the engine's percentage unit.
///
/// Debt buffers, discounts and teller fees are all expressed against this
/// denominator, so `10_000` is 10% and `500` is 0.5%.
pub const ONE_HUNDRED_PERCENT: u32 = 100_000;

/// Smallest token decimal count a market may use.
pub const MIN_TOKEN_DECIMALS: u8 = 6;

/// Largest token decimal count a market may use.
pub const MAX_TOKEN_DECIMALS: u8 = 18;

/// Base exponent of a market's scale: `scale = 10^(SCALE_BASE_EXPONENT + adjustment)`.
pub const SCALE_BASE_EXPONENT: i32 = 36;

/// Bound on the absolute value of a market's scale adjustment.
pub const MAX_SCALE_ADJUSTMENT: i8 = 24;

/// Debt decay interval as a multiple of the deposit interval.
///
/// `debt_decay_interval = max(min_debt_decay_interval, DEBT_DECAY_MULTIPLIER * deposit_interval)`.
pub const DEBT_DECAY_MULTIPLIER: u64 = 5;

/// Upper bound on the debt buffer a creator may request.
pub const MAX_DEBT_BUFFER: u32 = ONE_HUNDRED_PERCENT;

/// Shortest fixed-term vesting period (anything shorter must be instant).
pub const MIN_FIXED_TERM_VESTING: u64 = DAY;

/// Longest fixed-term vesting period: 50 years.
pub const MAX_FIXED_TERM_VESTING: u64 = 50 * 365 * DAY;

// ---------------------------------------------------------------------------
// Default tuning parameters (see `AuctioneerConfig`)
// ---------------------------------------------------------------------------

/// Default minimum time between two capacity-lagging tunes.
pub const DEFAULT_TUNE_INTERVAL: u64 = 24 * HOUR;

/// Default window over which a control-variable decrease is smoothed.
pub const DEFAULT_TUNE_ADJUSTMENT: u64 = HOUR;

/// Default floor for a market's debt decay interval.
pub const DEFAULT_MIN_DEBT_DECAY_INTERVAL: u64 = 3 * DAY;

/// Default floor for a market's deposit interval.
pub const DEFAULT_MIN_DEPOSIT_INTERVAL: u64 = HOUR;

/// Default floor for a market's duration.
pub const DEFAULT_MIN_MARKET_DURATION: u64 = DAY;
