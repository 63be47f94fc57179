//! Interfaces of the engine's external collaborators.
//!
//! - [`Aggregator`]: issues globally unique market identifiers
//! - [`Teller`]: the only caller allowed to purchase; supplies fee rates
//! - [`PriceOracle`]: price feed for the oracle-referenced price models
//! - [`Authority`]: capability check for administrative calls
//!
//! The engine never implements these; in-process reference versions live in
//! `bond-auction` and `bond-tests`.

use alloy_primitives::{Address, U256};

use crate::error::{AuctionError, OracleError};
use crate::types::{MarketId, Token};

/// Registry of markets across pricing engines.
pub trait Aggregator: Send + Sync {
    /// Reserve an identifier for a new market on the given pair.
    fn register_market(&self, payout: &Token, quote: &Token) -> Result<MarketId, AuctionError>;
}

/// User-facing purchase front end.
pub trait Teller: Send + Sync {
    /// Address the engine accepts `purchase_bond` calls from.
    fn address(&self) -> Address;

    /// Total fee taken from a purchase routed through `referrer`, in
    /// percentage units (`ONE_HUNDRED_PERCENT` = 100%).
    fn fee(&self, referrer: &Address) -> u32;
}

/// Price feed consulted by oracle-priced markets.
///
/// Prices are quote per payout token, scaled by `10^decimals`. Implementations
/// must return an error rather than a stale price.
pub trait PriceOracle: Send + Sync {
    /// Bind a newly created market to a pair.
    fn register_market(&self, id: MarketId, payout: &Token, quote: &Token) -> Result<(), OracleError>;

    /// Current price for a registered market.
    fn current_price(&self, id: MarketId) -> Result<U256, OracleError>;

    /// Decimals of [`current_price`](Self::current_price).
    fn decimals(&self, id: MarketId) -> Result<u8, OracleError>;

    /// Current price for a pair, used before a market identifier exists.
    fn pair_price(&self, payout: &Token, quote: &Token) -> Result<U256, OracleError>;

    /// Decimals of [`pair_price`](Self::pair_price).
    fn pair_decimals(&self, payout: &Token, quote: &Token) -> Result<u8, OracleError>;
}

/// Administrative actions gated by an [`Authority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CreateMarket,
    SetDefaults,
    SetAllowNewMarkets,
    SetCallbackAuthStatus,
}

impl Capability {
    pub fn action(&self) -> &'static str {
        match self {
            Self::CreateMarket => "create markets",
            Self::SetDefaults => "set defaults",
            Self::SetAllowNewMarkets => "toggle new markets",
            Self::SetCallbackAuthStatus => "set callback authorization",
        }
    }
}

/// Externally supplied permission predicate.
pub trait Authority: Send + Sync {
    fn is_authorized(&self, caller: &Address, capability: Capability) -> bool;
}

/// Authority that permits everything except the listed administrative
/// capabilities, which only `admin` holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerAuthority {
    pub admin: Address,
}

impl Authority for OwnerAuthority {
    fn is_authorized(&self, caller: &Address, capability: Capability) -> bool {
        match capability {
            Capability::CreateMarket => true,
            _ => *caller == self.admin,
        }
    }
}
