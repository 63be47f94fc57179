//! Shared mock collaborators and market builders for integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bond_auction::{AuctionEngine, LocalAggregator, MarketParams, PricingParams};
use bond_core::config::AuctioneerConfig;
use bond_core::constants::DAY;
use bond_core::error::OracleError;
use bond_core::math::pow10;
use bond_core::traits::{OwnerAuthority, PriceOracle, Teller};
use bond_core::types::{MarketId, Token, Vesting};
use bond_core::{Address, U256};
use parking_lot::RwLock;

/// Reference timestamp for scenarios.
pub const NOW: u64 = 1_700_000_000;

pub fn teller_address() -> Address {
    Address::repeat_byte(0x7e)
}

pub fn admin() -> Address {
    Address::repeat_byte(0xad)
}

pub fn owner() -> Address {
    Address::repeat_byte(0x01)
}

pub fn stranger() -> Address {
    Address::repeat_byte(0x99)
}

pub fn oracle_address() -> Address {
    Address::repeat_byte(0x0c)
}

/// `x * 10^18`.
pub fn e18(x: u64) -> U256 {
    U256::from(x) * pow10(18).unwrap()
}

/// Token with a seed-byte address.
pub fn token(seed: u8, decimals: u8) -> Token {
    Token::new(Address::repeat_byte(seed), decimals)
}

/// Teller with an adjustable flat fee.
#[derive(Debug, Default)]
pub struct MockTeller {
    fee: AtomicU32,
}

impl MockTeller {
    pub fn set_fee(&self, fee: u32) {
        self.fee.store(fee, Ordering::SeqCst);
    }
}

impl Teller for MockTeller {
    fn address(&self) -> Address {
        teller_address()
    }

    fn fee(&self, _referrer: &Address) -> u32 {
        self.fee.load(Ordering::SeqCst)
    }
}

/// Oracle with one settable price per pair.
#[derive(Debug)]
pub struct MockOracle {
    decimals: u8,
    prices: RwLock<HashMap<(Token, Token), U256>>,
    markets: RwLock<HashMap<MarketId, (Token, Token)>>,
    stale: RwLock<bool>,
}

impl MockOracle {
    pub fn new(decimals: u8) -> Self {
        Self {
            decimals,
            prices: RwLock::new(HashMap::new()),
            markets: RwLock::new(HashMap::new()),
            stale: RwLock::new(false),
        }
    }

    pub fn set_price(&self, payout: &Token, quote: &Token, price: U256) {
        self.prices.write().insert((*payout, *quote), price);
    }

    pub fn set_stale(&self, stale: bool) {
        *self.stale.write() = stale;
    }

    fn price_of(&self, pair: &(Token, Token)) -> Result<U256, OracleError> {
        if *self.stale.read() {
            return Err(OracleError::Stale);
        }
        self.prices
            .read()
            .get(pair)
            .copied()
            .ok_or(OracleError::UnsupportedPair)
    }
}

impl PriceOracle for MockOracle {
    fn register_market(&self, id: MarketId, payout: &Token, quote: &Token) -> Result<(), OracleError> {
        self.price_of(&(*payout, *quote))?;
        self.markets.write().insert(id, (*payout, *quote));
        Ok(())
    }

    fn current_price(&self, id: MarketId) -> Result<U256, OracleError> {
        let pair = self
            .markets
            .read()
            .get(&id)
            .copied()
            .ok_or(OracleError::UnknownMarket(id))?;
        self.price_of(&pair)
    }

    fn decimals(&self, id: MarketId) -> Result<u8, OracleError> {
        if !self.markets.read().contains_key(&id) {
            return Err(OracleError::UnknownMarket(id));
        }
        Ok(self.decimals)
    }

    fn pair_price(&self, payout: &Token, quote: &Token) -> Result<U256, OracleError> {
        self.price_of(&(*payout, *quote))
    }

    fn pair_decimals(&self, _payout: &Token, _quote: &Token) -> Result<u8, OracleError> {
        Ok(self.decimals)
    }
}

/// Engine wired to mock collaborators, with handles kept for steering them.
pub struct Harness {
    pub engine: AuctionEngine,
    pub teller: Arc<MockTeller>,
    pub oracle: Arc<MockOracle>,
    pub aggregator: Arc<LocalAggregator>,
}

impl Harness {
    /// Default config, zero fee, an 8-decimal oracle under [`oracle_address`].
    pub fn new() -> Self {
        Self::with_config(AuctioneerConfig::default())
    }

    pub fn with_config(config: AuctioneerConfig) -> Self {
        let teller = Arc::new(MockTeller::default());
        let oracle = Arc::new(MockOracle::new(8));
        let aggregator = Arc::new(LocalAggregator::new());
        let mut engine = AuctionEngine::new(
            config,
            aggregator.clone(),
            teller.clone(),
            Arc::new(OwnerAuthority { admin: admin() }),
        )
        .unwrap();
        engine.register_oracle(oracle_address(), oracle.clone());
        Self {
            engine,
            teller,
            oracle,
            aggregator,
        }
    }

    pub fn create(&mut self, params: MarketParams) -> MarketId {
        self.engine.create_market(owner(), params, NOW).unwrap()
    }

    pub fn buy(&mut self, id: MarketId, amount: U256, now: u64) -> U256 {
        self.engine
            .purchase_bond(teller_address(), id, amount, U256::ZERO, now)
            .unwrap()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// 1000 payout tokens over 10 days, one-day deposit interval, price 1.0,
/// both tokens 18 decimals.
pub fn sda_params() -> MarketParams {
    MarketParams {
        payout_token: token(0xaa, 18),
        quote_token: token(0xbb, 18),
        callback: None,
        capacity: e18(1_000),
        capacity_in_quote: false,
        vesting: Vesting::Instant,
        start: None,
        duration: 10 * DAY,
        deposit_interval: DAY,
        pricing: PricingParams::Sda {
            initial_price: pow10(36).unwrap(),
            minimum_price: pow10(35).unwrap(),
            debt_buffer: 10_000,
            scale_adjustment: 0,
        },
    }
}

/// ETH (18 decimals) paid out for USDC (6 decimals) at an oracle price.
pub fn oracle_params(pricing: PricingParams) -> MarketParams {
    MarketParams {
        payout_token: token(0xee, 18),
        quote_token: token(0xcc, 6),
        capacity: e18(100),
        pricing,
        ..sda_params()
    }
}
