//! Error types for the bond auction engine.
use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::types::{InactiveReason, MarketId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    /// Quotient wider than 256 bits, or a zero denominator.
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

/// Causes of a rejected parameter set. Every variant maps to `InvalidParams`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("token decimals {0} outside [6, 18]")] TokenDecimals(u8),
    #[error("oracle decimals {0} outside [6, 18]")] OracleDecimals(u8),
    #[error("scale adjustment {0} outside [-24, 24]")] ScaleAdjustment(i32),
    #[error("zero price")] ZeroPrice,
    #[error("initial price {initial} below minimum {minimum}")] InitialBelowMinimum { initial: U256, minimum: U256 },
    #[error("duration {duration} shorter than minimum {min}")] DurationTooShort { duration: u64, min: u64 },
    #[error("deposit interval {interval} outside [{min}, {max}]")] DepositInterval { interval: u64, min: u64, max: u64 },
    #[error("start {start} is in the past (now {now})")] StartInPast { start: u64, now: u64 },
    #[error("zero capacity")] ZeroCapacity,
    #[error("capacity too small for target debt")] ZeroTargetDebt,
    #[error("debt buffer {0} above ceiling")] DebtBuffer(u32),
    #[error("invalid vesting: {0}")] Vesting(String),
    #[error("discount {0} out of range")] Discount(u32),
    #[error("base discount {base} above max discount {max}")] DiscountOrder { base: u32, max: u32 },
    #[error("unknown oracle {0}")] UnknownOracle(Address),
    #[error("oracle price scale out of range")] OracleScale,
    #[error("invalid intervals: {0}")] Intervals(String),
    #[error("market {0} is not live")] MarketNotLive(MarketId),
    #[error("market {0} has no tunable intervals")] NotTunable(MarketId),
    #[error("invalid config: {0}")] Config(String),
    #[error("market {0} already stored")] DuplicateMarket(MarketId),
    #[error(transparent)] Math(#[from] MathError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("stale price")] Stale,
    #[error("unsupported pair")] UnsupportedPair,
    #[error("market {0} not registered with oracle")] UnknownMarket(MarketId),
    #[error("unavailable: {0}")] Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuctionError {
    #[error("invalid params: {0}")] InvalidParams(#[from] ParamsError),
    #[error("unknown market {0}")] UnknownMarket(MarketId),
    #[error("market {id} not active: {reason}")] NotActive { id: MarketId, reason: InactiveReason },
    #[error("payout {payout} below minimum {minimum}")] BelowMinimum { payout: U256, minimum: U256 },
    #[error("not enough capacity: requested {requested}, available {available}")] CapacityExceeded { requested: U256, available: U256 },
    #[error("max payout exceeded: {payout} > {max}")] MaxPayoutExceeded { payout: U256, max: U256 },
    #[error("{caller} not authorized to {action}")] Unauthorized { caller: Address, action: &'static str },
    #[error("new markets are not allowed")] NewMarketsDisabled,
    #[error("market {0} is not debt priced")] NotDebtPriced(MarketId),
    #[error("oracle returned zero price for market {0}")] OraclePriceZero(MarketId),
    #[error("oracle: {0}")] Oracle(#[from] OracleError),
    #[error(transparent)] Math(#[from] MathError),
}

impl AuctionError {
    /// Whether the caller may succeed by resubmitting with different inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BelowMinimum { .. } | Self::CapacityExceeded { .. } | Self::MaxPayoutExceeded { .. }
        )
    }
}
