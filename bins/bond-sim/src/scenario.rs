//! Scenario files and their replay against an in-process engine.
//!
//! A scenario is one market plus a list of purchases spaced out in simulated
//! seconds. Replaying it produces one [`PricePoint`] per purchase, including
//! rejected ones.

use std::path::Path;
use std::sync::Arc;

use alloy_primitives::address;
use anyhow::{bail, Context, Result};
use bond_auction::{AuctionEngine, AuctionEvent, LocalAggregator, MarketParams};
use bond_core::config::AuctioneerConfig;
use bond_core::constants::ONE_HUNDRED_PERCENT;
use bond_core::error::OracleError;
use bond_core::math::{mul_div, sub};
use bond_core::traits::{OwnerAuthority, PriceOracle, Teller};
use bond_core::types::{MarketId, Token};
use bond_core::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Address purchases are routed through.
pub const SIM_TELLER: Address = address!("7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e");
/// Holder of the administrative capabilities.
pub const SIM_ADMIN: Address = address!("adadadadadadadadadadadadadadadadadadadad");
/// Creator and owner of the simulated market.
pub const SIM_OWNER: Address = address!("0101010101010101010101010101010101010101");

/// A market and the order flow to replay against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Unix time of market creation. Defaults to the wall clock.
    #[serde(default)]
    pub start_time: Option<u64>,
    /// Teller fee in percentage units.
    #[serde(default)]
    pub fee: u32,
    /// Constant feed for oracle-priced markets.
    #[serde(default)]
    pub oracle: Option<OracleFeed>,
    pub market: MarketParams,
    #[serde(default)]
    pub purchases: Vec<Purchase>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleFeed {
    pub price: U256,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    /// Seconds since the previous purchase (or market creation).
    #[serde(default)]
    pub after: u64,
    /// Quote tokens offered, fee included.
    pub amount: U256,
    #[serde(default)]
    pub min_amount_out: U256,
}

/// Market state observed around one purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricePoint {
    pub time: u64,
    pub timestamp: String,
    pub amount: U256,
    /// Teller fee taken out of `amount` before it reaches the market.
    pub fee: U256,
    /// Price quoted just before the purchase.
    pub price: Option<U256>,
    pub payout: Option<U256>,
    pub error: Option<String>,
    pub capacity: U256,
    pub debt: Option<U256>,
    pub control_variable: Option<U256>,
    pub live: bool,
}

/// Market quote at a single instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub time: u64,
    pub timestamp: String,
    pub price: U256,
    pub max_payout: U256,
    pub max_amount_accepted: U256,
    pub live: bool,
    pub closing: bool,
}

/// Outcome of a replay.
pub struct Replay {
    pub engine: AuctionEngine,
    pub market: MarketId,
    pub path: Vec<PricePoint>,
    /// Simulated time after the last purchase.
    pub clock: u64,
}

impl Replay {
    pub fn events(&self) -> &[AuctionEvent] {
        self.engine.events()
    }

    /// Quote the market `offset` seconds after the last purchase.
    pub fn quote(&self, offset: u64) -> Result<Quote> {
        let time = self.clock.saturating_add(offset);
        let id = self.market;
        let price = self
            .engine
            .market_price(id, time)
            .with_context(|| format!("market {id} has no price at {time}"))?;
        Ok(Quote {
            time,
            timestamp: format_timestamp(time),
            price,
            max_payout: self.engine.max_payout(id, time)?,
            max_amount_accepted: self.engine.max_amount_accepted(id, &Address::ZERO, time)?,
            live: self.engine.is_live(id, time),
            closing: self.engine.is_closing(id, time)?,
        })
    }
}

/// Teller charging a flat fee.
struct SimTeller {
    fee: u32,
}

impl Teller for SimTeller {
    fn address(&self) -> Address {
        SIM_TELLER
    }

    fn fee(&self, _referrer: &Address) -> u32 {
        self.fee
    }
}

/// Oracle quoting the same price for every pair.
struct FixedOracle {
    feed: OracleFeed,
}

impl PriceOracle for FixedOracle {
    fn register_market(&self, _id: MarketId, _payout: &Token, _quote: &Token) -> Result<(), OracleError> {
        Ok(())
    }

    fn current_price(&self, _id: MarketId) -> Result<U256, OracleError> {
        Ok(self.feed.price)
    }

    fn decimals(&self, _id: MarketId) -> Result<u8, OracleError> {
        Ok(self.feed.decimals)
    }

    fn pair_price(&self, _payout: &Token, _quote: &Token) -> Result<U256, OracleError> {
        Ok(self.feed.price)
    }

    fn pair_decimals(&self, _payout: &Token, _quote: &Token) -> Result<u8, OracleError> {
        Ok(self.feed.decimals)
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid scenario {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Create the market at the scenario's start time and run every purchase.
    ///
    /// Rejected purchases are recorded in the path and do not stop the replay.
    pub fn replay(&self, config: AuctioneerConfig, wall_clock: u64) -> Result<Replay> {
        let mut engine = AuctionEngine::new(
            config,
            Arc::new(LocalAggregator::new()),
            Arc::new(SimTeller { fee: self.fee }),
            Arc::new(OwnerAuthority { admin: SIM_ADMIN }),
        )
        .context("engine configuration rejected")?;

        if let Some(address) = self.market.pricing.oracle() {
            let Some(feed) = self.oracle.clone() else {
                bail!("oracle-priced market needs an `oracle` feed");
            };
            engine.register_oracle(address, Arc::new(FixedOracle { feed }));
        }

        let mut clock = self.start_time.unwrap_or(wall_clock);
        let market = engine
            .create_market(SIM_OWNER, self.market.clone(), clock)
            .context("market creation failed")?;
        info!(%market, start = clock, purchases = self.purchases.len(), "sim: market created");

        let mut path = Vec::with_capacity(self.purchases.len());
        for purchase in &self.purchases {
            clock = clock.saturating_add(purchase.after);
            let price = engine.market_price(market, clock).ok();
            let fee = mul_div(
                purchase.amount,
                U256::from(self.fee),
                U256::from(ONE_HUNDRED_PERCENT),
            )?;
            let net = sub(purchase.amount, fee)?;
            let result = engine.purchase_bond(SIM_TELLER, market, net, purchase.min_amount_out, clock);
            if let Err(err) = &result {
                debug!(%market, time = clock, %err, "sim: purchase rejected");
            }
            let (payout, error) = match result {
                Ok(payout) => (Some(payout), None),
                Err(err) => (None, Some(err.to_string())),
            };
            path.push(PricePoint {
                time: clock,
                timestamp: format_timestamp(clock),
                amount: purchase.amount,
                fee,
                price,
                payout,
                error,
                capacity: engine.current_capacity(market)?,
                debt: engine.current_debt(market, clock).ok(),
                control_variable: engine.current_control_variable(market, clock).ok(),
                live: engine.is_live(market, clock),
            });
        }

        Ok(Replay {
            engine,
            market,
            path,
            clock,
        })
    }
}

/// RFC 3339 rendering of a unix timestamp, empty if out of range.
pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|time| time.to_rfc3339())
        .unwrap_or_default()
}
