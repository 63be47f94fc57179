//! Current price of a market under each [`PriceModel`].
//!
//! Every model is floored at the market's `min_price`. Oracle-referenced
//! models read the oracle on each call and fail closed on a zero price.

use bond_core::constants::ONE_HUNDRED_PERCENT;
use bond_core::error::{AuctionError, OracleError};
use bond_core::math::{add, mul_div, mul_div_up, sub};
use bond_core::traits::PriceOracle;
use bond_core::types::{Market, MarketId, OracleTerms, PriceModel, Terms};
use bond_core::U256;

use crate::debt::{current_control_variable, current_debt, debt_price};

/// Price of market `id` at `now`, in the market's scaled units.
///
/// `oracle` must be supplied for the oracle-referenced models.
pub fn market_price(
    id: MarketId,
    market: &Market,
    terms: &Terms,
    model: &PriceModel,
    oracle: Option<&dyn PriceOracle>,
    now: u64,
) -> Result<U256, AuctionError> {
    match model {
        PriceModel::Sda(state) => {
            let cv = current_control_variable(state, now)?;
            let debt = current_debt(state, terms.start, now)?;
            Ok(debt_price(cv, debt, market.scale, market.min_price)?)
        }
        PriceModel::OracleFixedDiscount(oracle_terms) => {
            let price = discounted_oracle_price(id, oracle_terms, oracle)?;
            Ok(price.max(market.min_price))
        }
        PriceModel::OracleDynamicDiscount {
            oracle: oracle_terms,
            decay_speed,
        } => {
            let base = discounted_oracle_price(id, oracle_terms, oracle)?;
            let factor = schedule_factor(market, terms, *decay_speed, now)?;
            let price = mul_div(base, factor, U256::from(ONE_HUNDRED_PERCENT))?.max(market.min_price);
            if price.is_zero() {
                return Err(AuctionError::OraclePriceZero(id));
            }
            Ok(price)
        }
        PriceModel::FixedPrice { price } => Ok(*price),
    }
}

/// `oracle_price * conversion * (1 - base_discount)`, rounded up.
fn discounted_oracle_price(
    id: MarketId,
    terms: &OracleTerms,
    oracle: Option<&dyn PriceOracle>,
) -> Result<U256, AuctionError> {
    let oracle = oracle.ok_or_else(|| {
        OracleError::Unavailable(format!("oracle {} not registered", terms.oracle))
    })?;
    let raw = oracle.current_price(id)?;
    if raw.is_zero() {
        return Err(AuctionError::OraclePriceZero(id));
    }
    let price = raw
        .checked_mul(terms.oracle_conversion)
        .ok_or(bond_core::error::MathError::ArithmeticOverflow)?;
    let percent = U256::from(ONE_HUNDRED_PERCENT);
    Ok(mul_div_up(
        price,
        sub(percent, U256::from(terms.base_discount))?,
        percent,
    )?)
}

/// Multiplier (percentage units) for how far sales run ahead of or behind a
/// linear schedule. Above 100% when ahead, below when behind, never negative.
pub fn schedule_factor(
    market: &Market,
    terms: &Terms,
    decay_speed: U256,
    now: u64,
) -> Result<U256, AuctionError> {
    let percent = U256::from(ONE_HUNDRED_PERCENT);
    let sold = if market.capacity_in_quote {
        market.purchased
    } else {
        market.sold
    };
    let initial = add(market.capacity, sold)?;
    if initial.is_zero() {
        return Ok(percent);
    }
    let remaining = terms.time_remaining(now).min(terms.length);
    let expected = mul_div(initial, U256::from(remaining), U256::from(terms.length))?;

    if expected > market.capacity {
        let ahead = mul_div(decay_speed, expected - market.capacity, initial)?;
        Ok(add(percent, ahead)?)
    } else {
        let behind = mul_div(decay_speed, market.capacity - expected, initial)?;
        Ok(percent.saturating_sub(behind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bond_core::math::pow10;
    use bond_core::types::{Adjustment, Metadata, SdaState, Token, Vesting};
    use bond_core::Address;

    struct StaticOracle(U256);

    impl PriceOracle for StaticOracle {
        fn register_market(&self, _: MarketId, _: &Token, _: &Token) -> Result<(), OracleError> {
            Ok(())
        }
        fn current_price(&self, _: MarketId) -> Result<U256, OracleError> {
            Ok(self.0)
        }
        fn decimals(&self, _: MarketId) -> Result<u8, OracleError> {
            Ok(18)
        }
        fn pair_price(&self, _: &Token, _: &Token) -> Result<U256, OracleError> {
            Ok(self.0)
        }
        fn pair_decimals(&self, _: &Token, _: &Token) -> Result<u8, OracleError> {
            Ok(18)
        }
    }

    fn market(capacity: u64, sold: u64) -> Market {
        let token = Token::new(Address::ZERO, 18);
        Market {
            owner: Address::ZERO,
            payout_token: token,
            quote_token: token,
            callback: None,
            capacity_in_quote: false,
            capacity: U256::from(capacity),
            max_payout: U256::from(capacity),
            sold: U256::from(sold),
            purchased: U256::ZERO,
            scale: pow10(36).unwrap(),
            min_price: U256::from(50u64) * pow10(34).unwrap(),
        }
    }

    fn terms() -> Terms {
        Terms {
            start: 0,
            conclusion: 1_000,
            length: 1_000,
            deposit_interval: 100,
            vesting: Vesting::Instant,
        }
    }

    fn oracle_terms(base_discount: u32) -> OracleTerms {
        OracleTerms {
            oracle: Address::repeat_byte(7),
            oracle_conversion: pow10(18).unwrap(),
            base_discount,
        }
    }

    #[test]
    fn fixed_discount_applies_and_floors() {
        let oracle = StaticOracle(pow10(18).unwrap());
        let model = PriceModel::OracleFixedDiscount(oracle_terms(10_000));
        let m = market(1_000, 0);
        let price = market_price(MarketId(1), &m, &terms(), &model, Some(&oracle), 0).unwrap();
        assert_eq!(price, U256::from(9u64) * pow10(35).unwrap());

        // 60% discount falls under the 50% floor
        let model = PriceModel::OracleFixedDiscount(oracle_terms(60_000));
        let price = market_price(MarketId(1), &m, &terms(), &model, Some(&oracle), 0).unwrap();
        assert_eq!(price, m.min_price);
    }

    #[test]
    fn zero_oracle_price_fails_closed() {
        let oracle = StaticOracle(U256::ZERO);
        let model = PriceModel::OracleFixedDiscount(oracle_terms(0));
        let err = market_price(MarketId(4), &market(1, 0), &terms(), &model, Some(&oracle), 0)
            .unwrap_err();
        assert_eq!(err, AuctionError::OraclePriceZero(MarketId(4)));
    }

    #[test]
    fn missing_oracle_is_an_oracle_error() {
        let model = PriceModel::OracleFixedDiscount(oracle_terms(0));
        let err = market_price(MarketId(1), &market(1, 0), &terms(), &model, None, 0).unwrap_err();
        assert!(matches!(err, AuctionError::Oracle(OracleError::Unavailable(_))));
    }

    #[test]
    fn schedule_factor_tracks_sell_through() {
        let t = terms();
        let speed = U256::from(20_000u64);
        // on schedule: half the time gone, half sold
        assert_eq!(schedule_factor(&market(500, 500), &t, speed, 500).unwrap(), U256::from(100_000u64));
        // ahead: 80% sold at the half way mark => +20% * 0.3
        assert_eq!(schedule_factor(&market(200, 800), &t, speed, 500).unwrap(), U256::from(106_000u64));
        // behind: nothing sold at the half way mark => -20% * 0.5
        assert_eq!(schedule_factor(&market(1_000, 0), &t, speed, 500).unwrap(), U256::from(90_000u64));
    }

    #[test]
    fn schedule_factor_never_negative() {
        let huge = U256::from(10_000_000u64);
        assert_eq!(schedule_factor(&market(1_000, 0), &terms(), huge, 900).unwrap(), U256::ZERO);
        assert_eq!(
            schedule_factor(&market(0, 0), &terms(), huge, 900).unwrap(),
            U256::from(ONE_HUNDRED_PERCENT)
        );
    }

    #[test]
    fn dynamic_discount_floors_at_min_price() {
        let oracle = StaticOracle(pow10(18).unwrap());
        let model = PriceModel::OracleDynamicDiscount {
            oracle: oracle_terms(0),
            decay_speed: U256::from(10_000_000u64),
        };
        let m = market(1_000, 0);
        let price = market_price(MarketId(1), &m, &terms(), &model, Some(&oracle), 900).unwrap();
        assert_eq!(price, m.min_price);
    }

    #[test]
    fn sda_price_uses_live_debt_and_floor() {
        let mut m = market(1_000, 0);
        m.min_price = U256::from(1u64);
        let state = SdaState {
            control_variable: U256::from(2u64) * pow10(36).unwrap(),
            max_debt: U256::from(2_000u64),
            total_debt: U256::from(1_000u64),
            metadata: Metadata {
                last_decay: 0,
                last_tune: 0,
                tune_interval: 100,
                tune_adjustment_delay: 10,
                debt_decay_interval: 500,
                tune_interval_capacity: U256::from(100u64),
                tune_below_capacity: U256::from(900u64),
                last_tune_debt: U256::from(500u64),
            },
            adjustment: Adjustment::default(),
        };
        let model = PriceModel::Sda(state);
        assert_eq!(
            market_price(MarketId(1), &m, &terms(), &model, None, 0).unwrap(),
            U256::from(2_000u64)
        );
        // half decayed
        assert_eq!(
            market_price(MarketId(1), &m, &terms(), &model, None, 250).unwrap(),
            U256::from(1_000u64)
        );
        m.min_price = U256::from(1_500u64);
        assert_eq!(
            market_price(MarketId(1), &m, &terms(), &model, None, 250).unwrap(),
            U256::from(1_500u64)
        );
    }

    #[test]
    fn fixed_price_is_constant() {
        let model = PriceModel::FixedPrice { price: U256::from(42u64) };
        for now in [0, 500, 5_000] {
            assert_eq!(
                market_price(MarketId(1), &market(1, 0), &terms(), &model, None, now).unwrap(),
                U256::from(42u64)
            );
        }
    }
}
