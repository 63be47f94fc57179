//! Market records shared by the engine, its store and its callers.
//!
//! All token amounts, prices, debt values and control variables are [`U256`].
//! Timestamps and durations are Unix seconds in `u64`.

use std::fmt;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::constants::DAY;

/// Identifier of a market, issued by the aggregator.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarketId(pub u64);

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for MarketId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A fungible asset as seen by the engine: its address and decimal count.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Token {
    pub address: Address,
    pub decimals: u8,
}

impl Token {
    pub fn new(address: Address, decimals: u8) -> Self {
        Self { address, decimals }
    }
}

/// When bond holders may redeem their payout.
///
/// The engine only validates and forwards vesting; settlement belongs to the
/// teller.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Vesting {
    /// Payout is delivered on purchase.
    #[default]
    Instant,
    /// Payout vests this many seconds after each purchase.
    FixedTerm(u64),
    /// Payout vests at a fixed timestamp, rounded down to a whole day.
    FixedExpiry(u64),
}

impl Vesting {
    /// Normalize an expiry to the start of its day. Other variants are unchanged.
    pub fn normalized(self) -> Self {
        match self {
            Self::FixedExpiry(ts) => Self::FixedExpiry(ts / DAY * DAY),
            other => other,
        }
    }

    /// Whether a purchase at `now` settles immediately.
    pub fn is_instant(&self, now: u64) -> bool {
        match self {
            Self::Instant => true,
            Self::FixedTerm(_) => false,
            Self::FixedExpiry(expiry) => *expiry <= now,
        }
    }
}

/// State common to every market regardless of its price model.
///
/// # Invariants
///
/// * `capacity` only decreases after creation.
/// * `sold` and `purchased` only grow, by the amounts a purchase removed from
///   `capacity` (payout or quote, depending on `capacity_in_quote`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Market {
    pub owner: Address,
    pub payout_token: Token,
    pub quote_token: Token,
    /// Optional contract notified on purchases. Requires an authorized owner.
    pub callback: Option<Address>,
    /// Whether `capacity` counts quote tokens accepted instead of payout tokens sold.
    pub capacity_in_quote: bool,
    /// Remaining budget, in the denomination chosen by `capacity_in_quote`.
    pub capacity: U256,
    /// Largest payout a single purchase may receive.
    pub max_payout: U256,
    /// Cumulative payout tokens sold.
    pub sold: U256,
    /// Cumulative quote tokens received.
    pub purchased: U256,
    /// Fixed-point base normalizing the decimal gap between the two tokens.
    pub scale: U256,
    /// Price floor.
    pub min_price: U256,
}

/// Market timing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Terms {
    pub start: u64,
    /// Moves earlier on close, never before `start`.
    pub conclusion: u64,
    /// Duration the market was created with. Not shortened by a close.
    pub length: u64,
    pub deposit_interval: u64,
    pub vesting: Vesting,
}

impl Terms {
    /// Seconds until conclusion, saturating at zero.
    pub fn time_remaining(&self, now: u64) -> u64 {
        self.conclusion.saturating_sub(now)
    }
}

/// Debt decay and tuning bookkeeping of a sequential dutch auction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    /// Reference point of the stored debt. May sit in the future after large purchases.
    pub last_decay: u64,
    pub last_tune: u64,
    pub tune_interval: u64,
    pub tune_adjustment_delay: u64,
    pub debt_decay_interval: u64,
    /// Capacity expected to sell over one tune interval.
    pub tune_interval_capacity: U256,
    /// Capacity below which an oversold market re-tunes immediately.
    pub tune_below_capacity: U256,
    /// Target debt computed by the last tune (payout units).
    pub last_tune_debt: U256,
}

/// In-flight control-variable decrease, drained linearly over time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Adjustment {
    /// Amount still to subtract from the control variable.
    pub change: U256,
    pub last_adjustment: u64,
    /// Seconds left from `last_adjustment` until `change` is fully applied.
    pub time_to_adjusted: u64,
    pub active: bool,
}

/// Pricing state of a debt-decay (sequential dutch auction) market.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SdaState {
    /// Price per unit of debt, scaled by the market scale.
    pub control_variable: U256,
    /// Debt ceiling enforced by the circuit breaker.
    pub max_debt: U256,
    /// Debt as of `metadata.last_decay`.
    pub total_debt: U256,
    pub metadata: Metadata,
    pub adjustment: Adjustment,
}

/// Oracle reference shared by the oracle-priced models.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OracleTerms {
    /// Address under which the oracle is registered with the engine.
    pub oracle: Address,
    /// Multiplier taking raw oracle prices to the market's price scale.
    pub oracle_conversion: U256,
    /// Discount applied to the oracle price.
    pub base_discount: u32,
}

/// How a market derives its price, chosen at creation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum PriceModel {
    /// Debt-decayed price with control-variable tuning.
    Sda(SdaState),
    /// Oracle price at a fixed discount.
    OracleFixedDiscount(OracleTerms),
    /// Discounted oracle price scaled by how far sales are ahead of or behind schedule.
    OracleDynamicDiscount {
        oracle: OracleTerms,
        /// Price change per 100% of initial capacity off schedule (percentage units).
        decay_speed: U256,
    },
    /// Constant price.
    FixedPrice { price: U256 },
}

impl PriceModel {
    /// Short label used in logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sda(_) => "sda",
            Self::OracleFixedDiscount(_) => "oracle-fixed-discount",
            Self::OracleDynamicDiscount { .. } => "oracle-dynamic-discount",
            Self::FixedPrice { .. } => "fixed-price",
        }
    }

    pub fn as_sda(&self) -> Option<&SdaState> {
        match self {
            Self::Sda(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_sda_mut(&mut self) -> Option<&mut SdaState> {
        match self {
            Self::Sda(state) => Some(state),
            _ => None,
        }
    }

    /// Oracle terms for the oracle-referenced models.
    pub fn oracle_terms(&self) -> Option<&OracleTerms> {
        match self {
            Self::OracleFixedDiscount(terms) => Some(terms),
            Self::OracleDynamicDiscount { oracle, .. } => Some(oracle),
            _ => None,
        }
    }
}

/// Everything the engine stores for one market.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MarketRecord {
    pub id: MarketId,
    pub market: Market,
    pub terms: Terms,
    pub model: PriceModel,
    /// Address allowed to pull ownership, if a transfer is pending.
    pub pending_owner: Option<Address>,
}

/// Why a market is not accepting purchases.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum InactiveReason {
    NotStarted { start: u64 },
    Concluded { conclusion: u64 },
    /// Capacity exhausted or market closed early.
    Closed,
}

impl fmt::Display for InactiveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted { start } => write!(f, "starts at {start}"),
            Self::Concluded { conclusion } => write!(f, "concluded at {conclusion}"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Interval overrides accepted by `set_intervals`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Intervals {
    pub tune_interval: u64,
    pub tune_adjustment_delay: u64,
    pub debt_decay_interval: u64,
}

/// What a teller needs to settle a purchase.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MarketInfoForPurchase {
    pub owner: Address,
    pub callback: Option<Address>,
    pub payout_token: Token,
    pub quote_token: Token,
    pub vesting: Vesting,
    pub max_payout: U256,
}
