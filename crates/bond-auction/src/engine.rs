//! Market lifecycle orchestration.
//!
//! [`AuctionEngine`] owns the market store, the engine configuration and the
//! event journal, and talks to its collaborators (aggregator, teller, oracles,
//! authority) through the `bond_core::traits` interfaces.
//!
//! Every mutating operation validates first and writes last. Purchases stage
//! their changes on a clone of the market record and commit it with a single
//! [`MarketStore::replace`], so a failed call leaves no trace.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bond_core::config::AuctioneerConfig;
use bond_core::constants::{MAX_TOKEN_DECIMALS, MIN_TOKEN_DECIMALS, ONE_HUNDRED_PERCENT};
use bond_core::error::{AuctionError, ParamsError};
use bond_core::math::{add, mul_div, sub};
use bond_core::traits::{Aggregator, Authority, Capability, PriceOracle, Teller};
use bond_core::types::{
    InactiveReason, Intervals, MarketId, MarketInfoForPurchase, MarketRecord, PriceModel,
};
use bond_core::{Address, U256};
use tracing::{debug, info, warn};

use crate::debt::{add_payout_to_debt, current_control_variable, current_debt, decay_and_get_price};
use crate::events::{AuctionEvent, CloseReason};
use crate::params::{build_market, MarketParams};
use crate::pricing::market_price;
use crate::store::{MarketStore, MemoryMarketStore};
use crate::tuning::tune;

/// Why a market is not live at `now`, or `None` if it is.
pub fn inactive_reason(record: &MarketRecord, now: u64) -> Option<InactiveReason> {
    if now < record.terms.start {
        Some(InactiveReason::NotStarted {
            start: record.terms.start,
        })
    } else if record.market.capacity.is_zero() {
        Some(InactiveReason::Closed)
    } else if now >= record.terms.conclusion {
        Some(InactiveReason::Concluded {
            conclusion: record.terms.conclusion,
        })
    } else {
        None
    }
}

/// Single-engine bond auctioneer over a [`MarketStore`].
pub struct AuctionEngine<S: MarketStore = MemoryMarketStore> {
    config: AuctioneerConfig,
    store: S,
    aggregator: Arc<dyn Aggregator>,
    teller: Arc<dyn Teller>,
    authority: Arc<dyn Authority>,
    oracles: HashMap<Address, Arc<dyn PriceOracle>>,
    callback_authorized: HashSet<Address>,
    events: Vec<AuctionEvent>,
}

impl AuctionEngine<MemoryMarketStore> {
    /// Engine over an empty in-memory store.
    pub fn new(
        config: AuctioneerConfig,
        aggregator: Arc<dyn Aggregator>,
        teller: Arc<dyn Teller>,
        authority: Arc<dyn Authority>,
    ) -> Result<Self, AuctionError> {
        Self::with_store(MemoryMarketStore::new(), config, aggregator, teller, authority)
    }
}

impl<S: MarketStore> AuctionEngine<S> {
    pub fn with_store(
        store: S,
        config: AuctioneerConfig,
        aggregator: Arc<dyn Aggregator>,
        teller: Arc<dyn Teller>,
        authority: Arc<dyn Authority>,
    ) -> Result<Self, AuctionError> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            aggregator,
            teller,
            authority,
            oracles: HashMap::new(),
            callback_authorized: HashSet::new(),
            events: Vec::new(),
        })
    }

    /// Make an oracle available to oracle-priced markets under `address`.
    pub fn register_oracle(&mut self, address: Address, oracle: Arc<dyn PriceOracle>) {
        info!(%address, "auction: oracle registered");
        self.oracles.insert(address, oracle);
    }

    pub fn config(&self) -> &AuctioneerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_callback_authorized(&self, account: &Address) -> bool {
        self.callback_authorized.contains(account)
    }

    // ------------------------------------------------------------------
    // Market lifecycle
    // ------------------------------------------------------------------

    /// Validate `params`, register the market with the aggregator (and its
    /// oracle, if any) and store it. `caller` becomes the owner.
    pub fn create_market(
        &mut self,
        caller: Address,
        params: MarketParams,
        now: u64,
    ) -> Result<MarketId, AuctionError> {
        if !self.config.allow_new_markets {
            return Err(AuctionError::NewMarketsDisabled);
        }
        self.require(&caller, Capability::CreateMarket)?;
        if params.callback.is_some() && !self.callback_authorized.contains(&caller) {
            return Err(AuctionError::Unauthorized {
                caller,
                action: "set a callback",
            });
        }

        let oracle = match params.pricing.oracle() {
            Some(address) => Some(
                self.oracles
                    .get(&address)
                    .cloned()
                    .ok_or(ParamsError::UnknownOracle(address))?,
            ),
            None => None,
        };

        let new = build_market(&params, caller, &self.config, oracle.as_deref(), now)?;
        let id = self
            .aggregator
            .register_market(&params.payout_token, &params.quote_token)?;

        if let Some(oracle) = &oracle {
            oracle.register_market(id, &params.payout_token, &params.quote_token)?;
            let decimals = oracle.decimals(id)?;
            if !(MIN_TOKEN_DECIMALS..=MAX_TOKEN_DECIMALS).contains(&decimals) {
                return Err(ParamsError::OracleDecimals(decimals).into());
            }
        }

        let kind = new.model.kind();
        self.store.insert(MarketRecord {
            id,
            market: new.market,
            terms: new.terms,
            model: new.model,
            pending_owner: None,
        })?;

        info!(%id, owner = %caller, model = kind, initial_price = %new.initial_price, "auction: market created");
        self.events.push(AuctionEvent::MarketCreated {
            id,
            owner: caller,
            payout_token: params.payout_token.address,
            quote_token: params.quote_token.address,
            model: kind.to_string(),
            initial_price: new.initial_price,
        });
        Ok(id)
    }

    /// Exchange `amount` quote tokens for payout tokens on market `id`.
    ///
    /// Only the teller may call this. Returns the payout. A purchase that
    /// pushes debt above the ceiling still succeeds and closes the market.
    pub fn purchase_bond(
        &mut self,
        caller: Address,
        id: MarketId,
        amount: U256,
        min_amount_out: U256,
        now: u64,
    ) -> Result<U256, AuctionError> {
        if caller != self.teller.address() {
            return Err(AuctionError::Unauthorized {
                caller,
                action: "purchase bonds",
            });
        }
        let mut record = self.record(id)?.clone();
        if record.market.callback.is_some()
            && !self.callback_authorized.contains(&record.market.owner)
        {
            return Err(AuctionError::Unauthorized {
                caller: record.market.owner,
                action: "use a callback",
            });
        }
        if let Some(reason) = inactive_reason(&record, now) {
            return Err(AuctionError::NotActive { id, reason });
        }
        let oracle = self.oracle_for(&record.model);

        let MarketRecord {
            market,
            terms,
            model,
            ..
        } = &mut record;

        let (price, payout) = match &mut *model {
            PriceModel::Sda(state) => {
                let out = decay_and_get_price(market, terms.start, state, amount, now)?;
                (out.price, out.payout)
            }
            other => {
                let price = market_price(id, market, terms, other, oracle.as_deref(), now)?;
                (price, mul_div(amount, market.scale, price)?)
            }
        };

        if payout < min_amount_out {
            return Err(AuctionError::BelowMinimum {
                payout,
                minimum: min_amount_out,
            });
        }
        if payout > market.max_payout {
            return Err(AuctionError::MaxPayoutExceeded {
                payout,
                max: market.max_payout,
            });
        }
        let spent = if market.capacity_in_quote { amount } else { payout };
        if spent > market.capacity {
            return Err(AuctionError::CapacityExceeded {
                requested: spent,
                available: market.capacity,
            });
        }
        market.capacity = sub(market.capacity, spent)?;
        market.purchased = add(market.purchased, amount)?;
        market.sold = add(market.sold, payout)?;

        let mut breaker = false;
        let mut tuned = None;
        if let PriceModel::Sda(state) = model {
            add_payout_to_debt(state, payout, now)?;
            if state.total_debt > state.max_debt {
                terms.conclusion = now;
                market.capacity = U256::ZERO;
                breaker = true;
            } else {
                tuned = tune(market, terms, state, price, now)?;
            }
        }

        self.store.replace(record)?;

        debug!(%id, %amount, %payout, %price, "auction: bond purchased");
        self.events.push(AuctionEvent::Bonded {
            id,
            amount,
            payout,
            price,
            at: now,
        });
        if let Some(outcome) = tuned {
            debug!(
                %id,
                old = %outcome.old_control_variable,
                new = %outcome.new_control_variable,
                deferred = outcome.deferred,
                "auction: control variable tuned"
            );
            self.events.push(AuctionEvent::Tuned {
                id,
                old_control_variable: outcome.old_control_variable,
                new_control_variable: outcome.new_control_variable,
                deferred: outcome.deferred,
                at: now,
            });
        }
        if breaker {
            warn!(%id, "auction: debt ceiling breached, market closed");
            self.events.push(AuctionEvent::MarketClosed {
                id,
                reason: CloseReason::CircuitBreaker,
                at: now,
            });
        }
        Ok(payout)
    }

    /// Stop market `id` now. Owner only.
    pub fn close_market(&mut self, caller: Address, id: MarketId, now: u64) -> Result<(), AuctionError> {
        let mut record = self.record(id)?.clone();
        if caller != record.market.owner {
            return Err(AuctionError::Unauthorized {
                caller,
                action: "close market",
            });
        }
        record.terms.conclusion = now.max(record.terms.start).min(record.terms.conclusion);
        record.market.capacity = U256::ZERO;
        self.store.replace(record)?;

        info!(%id, "auction: market closed by owner");
        self.events.push(AuctionEvent::MarketClosed {
            id,
            reason: CloseReason::Owner,
            at: now,
        });
        Ok(())
    }

    /// Override the tuning intervals of a live debt-priced market. Owner only.
    pub fn set_intervals(
        &mut self,
        caller: Address,
        id: MarketId,
        intervals: Intervals,
        now: u64,
    ) -> Result<(), AuctionError> {
        let mut record = self.record(id)?.clone();
        if inactive_reason(&record, now).is_some() {
            return Err(ParamsError::MarketNotLive(id).into());
        }
        let Intervals {
            tune_interval,
            tune_adjustment_delay,
            debt_decay_interval,
        } = intervals;

        let state = record
            .model
            .as_sda_mut()
            .ok_or(ParamsError::NotTunable(id))?;
        if tune_interval == 0 || tune_adjustment_delay == 0 || debt_decay_interval == 0 {
            return Err(ParamsError::Intervals("intervals must be non-zero".to_string()).into());
        }
        if tune_interval < tune_adjustment_delay {
            return Err(ParamsError::Intervals(format!(
                "tune interval {tune_interval} shorter than adjustment delay {tune_adjustment_delay}"
            ))
            .into());
        }
        if tune_interval < record.terms.deposit_interval {
            return Err(ParamsError::Intervals(format!(
                "tune interval {tune_interval} shorter than deposit interval {}",
                record.terms.deposit_interval
            ))
            .into());
        }
        if debt_decay_interval < self.config.min_debt_decay_interval {
            return Err(ParamsError::Intervals(format!(
                "debt decay interval {debt_decay_interval} below minimum {}",
                self.config.min_debt_decay_interval
            ))
            .into());
        }
        if caller != record.market.owner {
            return Err(AuctionError::Unauthorized {
                caller,
                action: "set intervals",
            });
        }

        let capacity = record.market.capacity;
        let meta = &mut state.metadata;
        meta.tune_interval = tune_interval;
        meta.tune_adjustment_delay = tune_adjustment_delay;
        meta.debt_decay_interval = debt_decay_interval;
        meta.tune_interval_capacity = mul_div(
            capacity,
            U256::from(tune_interval),
            U256::from(record.terms.conclusion - now),
        )?;
        meta.tune_below_capacity = capacity.saturating_sub(meta.tune_interval_capacity);
        self.store.replace(record)?;

        info!(%id, tune_interval, tune_adjustment_delay, debt_decay_interval, "auction: intervals updated");
        self.events.push(AuctionEvent::IntervalsUpdated { id, intervals });
        Ok(())
    }

    /// Nominate `new_owner` for market `id`. Owner only.
    pub fn push_ownership(
        &mut self,
        caller: Address,
        id: MarketId,
        new_owner: Address,
    ) -> Result<(), AuctionError> {
        let mut record = self.record(id)?.clone();
        if caller != record.market.owner {
            return Err(AuctionError::Unauthorized {
                caller,
                action: "transfer ownership",
            });
        }
        record.pending_owner = Some(new_owner);
        self.store.replace(record)?;
        info!(%id, %new_owner, "auction: ownership pushed");
        self.events.push(AuctionEvent::OwnershipPushed { id, new_owner });
        Ok(())
    }

    /// Accept a pending ownership transfer. Nominee only.
    pub fn pull_ownership(&mut self, caller: Address, id: MarketId) -> Result<(), AuctionError> {
        let mut record = self.record(id)?.clone();
        if record.pending_owner != Some(caller) {
            return Err(AuctionError::Unauthorized {
                caller,
                action: "pull ownership",
            });
        }
        record.market.owner = caller;
        record.pending_owner = None;
        self.store.replace(record)?;
        info!(%id, owner = %caller, "auction: ownership pulled");
        self.events.push(AuctionEvent::OwnershipPulled { id, owner: caller });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Replace the engine configuration. Existing markets keep their intervals.
    pub fn set_defaults(&mut self, caller: Address, config: AuctioneerConfig) -> Result<(), AuctionError> {
        self.require(&caller, Capability::SetDefaults)?;
        config.validate()?;
        info!(by = %caller, ?config, "auction: defaults updated");
        self.config = config.clone();
        self.events.push(AuctionEvent::DefaultsUpdated { by: caller, config });
        Ok(())
    }

    pub fn set_allow_new_markets(&mut self, caller: Address, allowed: bool) -> Result<(), AuctionError> {
        self.require(&caller, Capability::SetAllowNewMarkets)?;
        self.config.allow_new_markets = allowed;
        info!(by = %caller, allowed, "auction: new markets toggled");
        self.events.push(AuctionEvent::NewMarketsToggled { by: caller, allowed });
        Ok(())
    }

    pub fn set_callback_auth_status(
        &mut self,
        caller: Address,
        account: Address,
        authorized: bool,
    ) -> Result<(), AuctionError> {
        self.require(&caller, Capability::SetCallbackAuthStatus)?;
        if authorized {
            self.callback_authorized.insert(account);
        } else {
            self.callback_authorized.remove(&account);
        }
        info!(by = %caller, %account, authorized, "auction: callback authorization updated");
        self.events.push(AuctionEvent::CallbackAuthUpdated {
            by: caller,
            account,
            authorized,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn market(&self, id: MarketId) -> Result<&MarketRecord, AuctionError> {
        self.record(id)
    }

    pub fn market_price(&self, id: MarketId, now: u64) -> Result<U256, AuctionError> {
        let record = self.record(id)?;
        let oracle = self.oracle_for(&record.model);
        market_price(
            id,
            &record.market,
            &record.terms,
            &record.model,
            oracle.as_deref(),
            now,
        )
    }

    pub fn current_debt(&self, id: MarketId, now: u64) -> Result<U256, AuctionError> {
        let record = self.record(id)?;
        let state = record.model.as_sda().ok_or(AuctionError::NotDebtPriced(id))?;
        Ok(current_debt(state, record.terms.start, now)?)
    }

    pub fn current_control_variable(&self, id: MarketId, now: u64) -> Result<U256, AuctionError> {
        let record = self.record(id)?;
        let state = record.model.as_sda().ok_or(AuctionError::NotDebtPriced(id))?;
        Ok(current_control_variable(state, now)?)
    }

    /// Largest payout a purchase at `now` can receive: the per-purchase cap or
    /// the remaining capacity, whichever is smaller.
    pub fn max_payout(&self, id: MarketId, now: u64) -> Result<U256, AuctionError> {
        let record = self.record(id)?;
        let market = &record.market;
        let capacity = if market.capacity_in_quote {
            let price = self.market_price(id, now)?;
            mul_div(market.capacity, market.scale, price)?
        } else {
            market.capacity
        };
        Ok(capacity.min(market.max_payout))
    }

    /// Largest quote amount, fee included, the market accepts at `now`.
    pub fn max_amount_accepted(
        &self,
        id: MarketId,
        referrer: &Address,
        now: u64,
    ) -> Result<U256, AuctionError> {
        let record = self.record(id)?;
        let market = &record.market;
        let price = self.market_price(id, now)?;
        let quote_capacity = if market.capacity_in_quote {
            market.capacity
        } else {
            mul_div(market.capacity, price, market.scale)?
        };
        let max_quote = mul_div(market.max_payout, price, market.scale)?;
        let accepted = quote_capacity.min(max_quote);
        let fee = mul_div(
            accepted,
            U256::from(self.teller.fee(referrer)),
            U256::from(ONE_HUNDRED_PERCENT),
        )?;
        Ok(add(accepted, fee)?)
    }

    /// Payout a purchase of `amount` (fee included) would receive at `now`.
    pub fn payout_for(
        &self,
        amount: U256,
        id: MarketId,
        referrer: &Address,
        now: u64,
    ) -> Result<U256, AuctionError> {
        let record = self.record(id)?;
        let fee = mul_div(
            amount,
            U256::from(self.teller.fee(referrer)),
            U256::from(ONE_HUNDRED_PERCENT),
        )?;
        let price = self.market_price(id, now)?;
        let payout = mul_div(sub(amount, fee)?, record.market.scale, price)?;
        if payout > record.market.max_payout {
            return Err(AuctionError::MaxPayoutExceeded {
                payout,
                max: record.market.max_payout,
            });
        }
        Ok(payout)
    }

    /// Unknown markets are not live.
    pub fn is_live(&self, id: MarketId, now: u64) -> bool {
        self.store
            .get(id)
            .is_some_and(|record| inactive_reason(record, now).is_none())
    }

    /// Whether the market has no capacity left.
    pub fn is_empty(&self, id: MarketId) -> Result<bool, AuctionError> {
        Ok(self.record(id)?.market.capacity.is_zero())
    }

    /// Whether a live market concludes within its next deposit interval.
    pub fn is_closing(&self, id: MarketId, now: u64) -> Result<bool, AuctionError> {
        let record = self.record(id)?;
        Ok(inactive_reason(record, now).is_none()
            && record.terms.time_remaining(now) < record.terms.deposit_interval)
    }

    pub fn market_scale(&self, id: MarketId) -> Result<U256, AuctionError> {
        Ok(self.record(id)?.market.scale)
    }

    pub fn owner_of(&self, id: MarketId) -> Result<Address, AuctionError> {
        Ok(self.record(id)?.market.owner)
    }

    pub fn current_capacity(&self, id: MarketId) -> Result<U256, AuctionError> {
        Ok(self.record(id)?.market.capacity)
    }

    pub fn conclusion(&self, id: MarketId) -> Result<u64, AuctionError> {
        Ok(self.record(id)?.terms.conclusion)
    }

    pub fn market_info_for_purchase(&self, id: MarketId) -> Result<MarketInfoForPurchase, AuctionError> {
        let record = self.record(id)?;
        Ok(MarketInfoForPurchase {
            owner: record.market.owner,
            callback: record.market.callback,
            payout_token: record.market.payout_token,
            quote_token: record.market.quote_token,
            vesting: record.terms.vesting,
            max_payout: record.market.max_payout,
        })
    }

    pub fn is_instant_swap(&self, id: MarketId, now: u64) -> Result<bool, AuctionError> {
        Ok(self.record(id)?.terms.vesting.is_instant(now))
    }

    pub fn events(&self) -> &[AuctionEvent] {
        &self.events
    }

    /// Take the journal, leaving it empty.
    pub fn drain_events(&mut self) -> Vec<AuctionEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------

    fn record(&self, id: MarketId) -> Result<&MarketRecord, AuctionError> {
        self.store.get(id).ok_or(AuctionError::UnknownMarket(id))
    }

    fn oracle_for(&self, model: &PriceModel) -> Option<Arc<dyn PriceOracle>> {
        model
            .oracle_terms()
            .and_then(|terms| self.oracles.get(&terms.oracle).cloned())
    }

    fn require(&self, caller: &Address, capability: Capability) -> Result<(), AuctionError> {
        if self.authority.is_authorized(caller, capability) {
            Ok(())
        } else {
            Err(AuctionError::Unauthorized {
                caller: *caller,
                action: capability.action(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::LocalAggregator;
    use crate::params::PricingParams;
    use bond_core::constants::{DAY, HOUR};
    use bond_core::math::pow10;
    use bond_core::traits::OwnerAuthority;
    use bond_core::types::{Token, Vesting};

    const NOW: u64 = 1_700_000_000;

    struct TestTeller {
        fee: u32,
    }

    impl Teller for TestTeller {
        fn address(&self) -> Address {
            teller()
        }
        fn fee(&self, _referrer: &Address) -> u32 {
            self.fee
        }
    }

    fn teller() -> Address {
        Address::repeat_byte(0x7e)
    }
    fn admin() -> Address {
        Address::repeat_byte(0xad)
    }
    fn owner() -> Address {
        Address::repeat_byte(0x01)
    }
    fn stranger() -> Address {
        Address::repeat_byte(0x99)
    }

    fn e18(x: u64) -> U256 {
        U256::from(x) * pow10(18).unwrap()
    }

    fn engine_with_fee(fee: u32) -> AuctionEngine {
        AuctionEngine::new(
            AuctioneerConfig::default(),
            Arc::new(LocalAggregator::new()),
            Arc::new(TestTeller { fee }),
            Arc::new(OwnerAuthority { admin: admin() }),
        )
        .unwrap()
    }

    fn engine() -> AuctionEngine {
        engine_with_fee(0)
    }

    fn params() -> MarketParams {
        MarketParams {
            payout_token: Token::new(Address::repeat_byte(0xaa), 18),
            quote_token: Token::new(Address::repeat_byte(0xbb), 18),
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

    fn create(engine: &mut AuctionEngine) -> MarketId {
        engine.create_market(owner(), params(), NOW).unwrap()
    }

    #[test]
    fn create_assigns_ids_and_journals() {
        let mut engine = engine();
        assert_eq!(create(&mut engine), MarketId(0));
        assert_eq!(create(&mut engine), MarketId(1));
        assert_eq!(engine.store().market_count(), 2);
        assert_eq!(engine.owner_of(MarketId(1)).unwrap(), owner());
        assert!(matches!(
            engine.events()[0],
            AuctionEvent::MarketCreated { id: MarketId(0), .. }
        ));
        assert_eq!(engine.market_price(MarketId(0), NOW).unwrap(), pow10(36).unwrap());
    }

    #[test]
    fn create_respects_allow_new_markets() {
        let mut engine = engine();
        engine.set_allow_new_markets(admin(), false).unwrap();
        assert_eq!(
            engine.create_market(owner(), params(), NOW).unwrap_err(),
            AuctionError::NewMarketsDisabled
        );
        engine.set_allow_new_markets(admin(), true).unwrap();
        assert!(engine.create_market(owner(), params(), NOW).is_ok());
    }

    #[test]
    fn invalid_params_write_nothing() {
        let mut engine = engine();
        let mut bad = params();
        bad.duration = HOUR;
        assert!(engine.create_market(owner(), bad, NOW).is_err());
        assert!(engine.store().is_empty());
        assert!(engine.events().is_empty());
    }

    #[test]
    fn callback_requires_authorization() {
        let mut engine = engine();
        let mut with_callback = params();
        with_callback.callback = Some(Address::repeat_byte(0xcb));
        assert!(matches!(
            engine.create_market(owner(), with_callback.clone(), NOW).unwrap_err(),
            AuctionError::Unauthorized { .. }
        ));

        engine.set_callback_auth_status(admin(), owner(), true).unwrap();
        let id = engine.create_market(owner(), with_callback, NOW).unwrap();

        // revoking blocks purchases on the callback market
        engine.set_callback_auth_status(admin(), owner(), false).unwrap();
        assert!(matches!(
            engine.purchase_bond(teller(), id, e18(1), U256::ZERO, NOW).unwrap_err(),
            AuctionError::Unauthorized { .. }
        ));
    }

    #[test]
    fn only_teller_purchases() {
        let mut engine = engine();
        let id = create(&mut engine);
        let err = engine
            .purchase_bond(stranger(), id, e18(1), U256::ZERO, NOW)
            .unwrap_err();
        assert_eq!(
            err,
            AuctionError::Unauthorized {
                caller: stranger(),
                action: "purchase bonds"
            }
        );
    }

    #[test]
    fn max_purchase_at_open() {
        let mut engine = engine();
        let id = create(&mut engine);
        let before = engine.market_price(id, NOW).unwrap();

        let payout = engine
            .purchase_bond(teller(), id, e18(100), e18(100), NOW)
            .unwrap();
        assert_eq!(payout, e18(100));

        let record = engine.market(id).unwrap();
        assert_eq!(record.market.capacity, e18(900));
        assert_eq!(record.market.sold, e18(100));
        assert_eq!(record.market.purchased, e18(100));
        assert!(engine.market_price(id, NOW).unwrap() >= before);
        assert!(engine.is_live(id, NOW));
    }

    #[test]
    fn purchase_errors_leave_state_untouched() {
        let mut engine = engine();
        let id = create(&mut engine);
        let snapshot = engine.market(id).unwrap().clone();

        assert!(matches!(
            engine.purchase_bond(teller(), id, e18(10), e18(11), NOW).unwrap_err(),
            AuctionError::BelowMinimum { .. }
        ));
        assert!(matches!(
            engine.purchase_bond(teller(), id, e18(101), U256::ZERO, NOW).unwrap_err(),
            AuctionError::MaxPayoutExceeded { .. }
        ));
        assert_eq!(engine.market(id).unwrap(), &snapshot);
        assert_eq!(engine.events().len(), 1);
    }

    #[test]
    fn purchase_outside_window_is_not_active() {
        let mut engine = engine();
        let mut future = params();
        future.start = Some(NOW + DAY);
        let id = engine.create_market(owner(), future, NOW).unwrap();
        assert_eq!(
            engine.purchase_bond(teller(), id, e18(1), U256::ZERO, NOW).unwrap_err(),
            AuctionError::NotActive {
                id,
                reason: InactiveReason::NotStarted { start: NOW + DAY }
            }
        );

        let concluded = NOW + DAY + 10 * DAY;
        assert!(matches!(
            engine.purchase_bond(teller(), id, e18(1), U256::ZERO, concluded).unwrap_err(),
            AuctionError::NotActive {
                reason: InactiveReason::Concluded { .. },
                ..
            }
        ));
        assert_eq!(
            engine.purchase_bond(teller(), MarketId(42), e18(1), U256::ZERO, NOW).unwrap_err(),
            AuctionError::UnknownMarket(MarketId(42))
        );
    }

    #[test]
    fn owner_close() {
        let mut engine = engine();
        let id = create(&mut engine);
        assert!(matches!(
            engine.close_market(stranger(), id, NOW + 10).unwrap_err(),
            AuctionError::Unauthorized { .. }
        ));
        engine.close_market(owner(), id, NOW + 10).unwrap();
        assert!(!engine.is_live(id, NOW + 10));
        assert!(engine.is_empty(id).unwrap());
        assert_eq!(engine.conclusion(id).unwrap(), NOW + 10);
        assert_eq!(
            engine.purchase_bond(teller(), id, e18(1), U256::ZERO, NOW + 10).unwrap_err(),
            AuctionError::NotActive {
                id,
                reason: InactiveReason::Closed
            }
        );
    }

    #[test]
    fn close_before_start_keeps_conclusion_at_start() {
        let mut engine = engine();
        let mut future = params();
        future.start = Some(NOW + DAY);
        let id = engine.create_market(owner(), future, NOW).unwrap();
        engine.close_market(owner(), id, NOW).unwrap();
        assert_eq!(engine.conclusion(id).unwrap(), NOW + DAY);
    }

    #[test]
    fn set_intervals_rules() {
        let mut engine = engine();
        let id = create(&mut engine);
        let good = Intervals {
            tune_interval: 2 * DAY,
            tune_adjustment_delay: 2 * HOUR,
            debt_decay_interval: 6 * DAY,
        };

        assert!(matches!(
            engine.set_intervals(stranger(), id, good, NOW).unwrap_err(),
            AuctionError::Unauthorized { .. }
        ));
        let short = Intervals {
            tune_interval: HOUR,
            ..good
        };
        assert!(matches!(
            engine.set_intervals(owner(), id, short, NOW).unwrap_err(),
            AuctionError::InvalidParams(ParamsError::Intervals(_))
        ));

        engine.set_intervals(owner(), id, good, NOW).unwrap();
        let meta = &engine.market(id).unwrap().model.as_sda().unwrap().metadata;
        assert_eq!(meta.tune_interval, 2 * DAY);
        assert_eq!(meta.debt_decay_interval, 6 * DAY);
        // 1000 * 2 / 10
        assert_eq!(meta.tune_interval_capacity, e18(200));
        assert_eq!(meta.tune_below_capacity, e18(800));

        engine.close_market(owner(), id, NOW + 1).unwrap();
        assert_eq!(
            engine.set_intervals(owner(), id, good, NOW + 1).unwrap_err(),
            AuctionError::InvalidParams(ParamsError::MarketNotLive(id))
        );
    }

    #[test]
    fn set_intervals_requires_debt_pricing() {
        let mut engine = engine();
        let mut fixed = params();
        fixed.pricing = PricingParams::FixedPrice {
            price: pow10(36).unwrap(),
            scale_adjustment: 0,
        };
        let id = engine.create_market(owner(), fixed, NOW).unwrap();
        let intervals = Intervals {
            tune_interval: DAY,
            tune_adjustment_delay: HOUR,
            debt_decay_interval: 5 * DAY,
        };
        assert_eq!(
            engine.set_intervals(owner(), id, intervals, NOW).unwrap_err(),
            AuctionError::InvalidParams(ParamsError::NotTunable(id))
        );
        assert_eq!(engine.current_debt(id, NOW).unwrap_err(), AuctionError::NotDebtPriced(id));
    }

    #[test]
    fn two_step_ownership() {
        let mut engine = engine();
        let id = create(&mut engine);
        let heir = Address::repeat_byte(0x42);

        assert!(engine.pull_ownership(heir, id).is_err());
        assert!(engine.push_ownership(heir, id, heir).is_err());
        engine.push_ownership(owner(), id, heir).unwrap();
        assert!(engine.pull_ownership(stranger(), id).is_err());
        engine.pull_ownership(heir, id).unwrap();

        assert_eq!(engine.owner_of(id).unwrap(), heir);
        assert_eq!(engine.market(id).unwrap().pending_owner, None);
        assert!(engine.close_market(owner(), id, NOW).is_err());
        engine.close_market(heir, id, NOW).unwrap();
    }

    #[test]
    fn admin_calls_are_gated_and_journaled() {
        let mut engine = engine();
        let cfg = AuctioneerConfig {
            min_market_duration: 2 * DAY,
            ..AuctioneerConfig::default()
        };
        assert!(matches!(
            engine.set_defaults(stranger(), cfg.clone()).unwrap_err(),
            AuctionError::Unauthorized { action: "set defaults", .. }
        ));
        assert!(engine.set_allow_new_markets(stranger(), false).is_err());
        assert!(engine.set_callback_auth_status(stranger(), owner(), true).is_err());

        engine.set_defaults(admin(), cfg.clone()).unwrap();
        assert_eq!(engine.config(), &cfg);
        assert_eq!(
            engine.drain_events(),
            vec![AuctionEvent::DefaultsUpdated { by: admin(), config: cfg }]
        );
        assert!(engine.events().is_empty());

        let invalid = AuctioneerConfig {
            min_deposit_interval: 0,
            ..AuctioneerConfig::default()
        };
        assert!(engine.set_defaults(admin(), invalid).is_err());
    }

    #[test]
    fn quote_reads_with_fee() {
        // 1% fee
        let mut engine = engine_with_fee(1_000);
        let id = create(&mut engine);
        let referrer = Address::ZERO;

        assert_eq!(engine.max_payout(id, NOW).unwrap(), e18(100));
        // 100 quote + 1%
        assert_eq!(engine.max_amount_accepted(id, &referrer, NOW).unwrap(), e18(101));
        assert_eq!(engine.payout_for(e18(101), id, &referrer, NOW).unwrap(), e18(100) - pow10(16).unwrap());
        assert!(matches!(
            engine.payout_for(e18(200), id, &referrer, NOW).unwrap_err(),
            AuctionError::MaxPayoutExceeded { .. }
        ));
    }

    #[test]
    fn misc_reads() {
        let mut engine = engine();
        let mut p = params();
        p.vesting = Vesting::FixedTerm(7 * DAY);
        let id = engine.create_market(owner(), p, NOW).unwrap();

        assert_eq!(engine.market_scale(id).unwrap(), pow10(36).unwrap());
        assert_eq!(engine.current_capacity(id).unwrap(), e18(1_000));
        assert!(!engine.is_instant_swap(id, NOW).unwrap());
        assert!(!engine.is_closing(id, NOW).unwrap());
        assert!(engine.is_closing(id, NOW + 9 * DAY + 1).unwrap());
        assert!(!engine.is_closing(id, NOW + 10 * DAY).unwrap());
        assert!(!engine.is_live(MarketId(9), NOW));

        let info = engine.market_info_for_purchase(id).unwrap();
        assert_eq!(info.owner, owner());
        assert_eq!(info.vesting, Vesting::FixedTerm(7 * DAY));
        assert_eq!(info.max_payout, e18(100));
        assert_eq!(
            engine.current_control_variable(id, NOW).unwrap(),
            U256::from(2u64) * pow10(51).unwrap()
        );
        assert_eq!(engine.current_debt(id, NOW).unwrap(), e18(500));
    }
}
