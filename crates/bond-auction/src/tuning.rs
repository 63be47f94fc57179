//! Control-variable tuning for debt-priced markets.
//!
//! After each purchase the market is compared against a linear sell-through
//! schedule. The time-neutral capacity is what the market's initial capacity
//! would look like if every sale so far had happened on schedule:
//!
//! ```text
//! initial      = capacity + sold
//! time_neutral = initial * elapsed / length + capacity
//! ```
//!
//! `time_neutral < initial` means the market is ahead of schedule and
//! `time_neutral > initial` means it lags. An oversold market is tuned as soon
//! as capacity falls below `tune_below_capacity`; a lagging one at most once
//! per `tune_interval`.
//!
//! Increases apply at once. Decreases are installed as an [`Adjustment`] and
//! drained linearly over `tune_adjustment_delay`.

use bond_core::error::MathError;
use bond_core::math::{add, mul_div, mul_div_up, sub};
use bond_core::types::{Adjustment, Market, SdaState, Terms};
use bond_core::U256;

/// What a tune changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuneOutcome {
    pub old_control_variable: U256,
    pub new_control_variable: U256,
    pub target_debt: U256,
    pub max_payout: U256,
    /// Whether the new control variable glides in over the adjustment delay.
    pub deferred: bool,
}

/// Re-tune `state` at `now` if the schedule trigger fires.
///
/// `price` is the price of the purchase that preceded the tune. Returns
/// `None` if nothing changed.
pub fn tune(
    market: &mut Market,
    terms: &Terms,
    state: &mut SdaState,
    price: U256,
    now: u64,
) -> Result<Option<TuneOutcome>, MathError> {
    let length = U256::from(terms.length);
    let time_remaining = terms.time_remaining(now);
    if time_remaining == 0 || terms.length == 0 {
        return Ok(None);
    }

    let sold = if market.capacity_in_quote {
        market.purchased
    } else {
        market.sold
    };
    let initial = add(market.capacity, sold)?;
    let elapsed = U256::from(terms.length.saturating_sub(time_remaining));
    let time_neutral = add(mul_div(initial, elapsed, length)?, market.capacity)?;

    let meta = &state.metadata;
    let oversold = market.capacity < meta.tune_below_capacity && time_neutral < initial;
    let lagging =
        now >= meta.last_tune.saturating_add(meta.tune_interval) && time_neutral > initial;
    if !(oversold || lagging) {
        return Ok(None);
    }

    let (capacity, neutral_payout) = if market.capacity_in_quote {
        (
            mul_div(market.capacity, market.scale, price)?,
            mul_div(time_neutral, market.scale, price)?,
        )
    } else {
        (market.capacity, time_neutral)
    };

    let d = U256::from(meta.debt_decay_interval);
    let target_debt = mul_div(neutral_payout, d, length)?;
    if target_debt.is_zero() {
        return Ok(None);
    }

    let max_payout = mul_div(
        capacity,
        U256::from(terms.deposit_interval),
        U256::from(time_remaining),
    )?;
    let new_cv = mul_div_up(price, market.scale, target_debt)?;
    let old_cv = state.control_variable;

    market.max_payout = max_payout;
    let deferred = new_cv < old_cv;
    if deferred {
        state.adjustment = Adjustment {
            change: sub(old_cv, new_cv)?,
            last_adjustment: now,
            time_to_adjusted: state.metadata.tune_adjustment_delay,
            active: true,
        };
    } else {
        state.control_variable = new_cv;
        state.adjustment.active = false;
    }

    let meta = &mut state.metadata;
    meta.last_tune = now;
    meta.tune_below_capacity = market.capacity.saturating_sub(meta.tune_interval_capacity);
    meta.last_tune_debt = target_debt;

    Ok(Some(TuneOutcome {
        old_control_variable: old_cv,
        new_control_variable: new_cv,
        target_debt,
        max_payout,
        deferred,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bond_core::math::pow10;
    use bond_core::types::{Metadata, Token, Vesting};
    use bond_core::Address;

    const DAY: u64 = 86_400;

    fn e18(x: u64) -> U256 {
        U256::from(x) * pow10(18).unwrap()
    }

    fn setup(capacity: u64, sold: u64) -> (Market, Terms, SdaState) {
        let token = Token::new(Address::ZERO, 18);
        let market = Market {
            owner: Address::ZERO,
            payout_token: token,
            quote_token: token,
            callback: None,
            capacity_in_quote: false,
            capacity: e18(capacity),
            max_payout: e18(100),
            sold: e18(sold),
            purchased: e18(sold),
            scale: pow10(36).unwrap(),
            min_price: U256::from(1u64),
        };
        let terms = Terms {
            start: 0,
            conclusion: 10 * DAY,
            length: 10 * DAY,
            deposit_interval: DAY,
            vesting: Vesting::Instant,
        };
        let state = SdaState {
            control_variable: U256::from(2u64) * pow10(51).unwrap(),
            max_debt: e18(600),
            total_debt: e18(500),
            metadata: Metadata {
                last_decay: 0,
                last_tune: 0,
                tune_interval: DAY,
                tune_adjustment_delay: 3_600,
                debt_decay_interval: 5 * DAY,
                tune_interval_capacity: e18(100),
                tune_below_capacity: e18(900),
                last_tune_debt: e18(500),
            },
            adjustment: Adjustment::default(),
        };
        (market, terms, state)
    }

    #[test]
    fn on_schedule_market_is_left_alone() {
        let (mut m, t, mut s) = setup(900, 100);
        let before = s.clone();
        // one day in, 10% sold
        assert_eq!(tune(&mut m, &t, &mut s, pow10(36).unwrap(), DAY).unwrap(), None);
        assert_eq!(s, before);
    }

    #[test]
    fn lagging_market_waits_for_tune_interval() {
        let (mut m, t, mut s) = setup(1_000, 0);
        assert_eq!(tune(&mut m, &t, &mut s, pow10(36).unwrap(), DAY - 1).unwrap(), None);
    }

    #[test]
    fn lagging_market_glides_down() {
        let (mut m, t, mut s) = setup(1_000, 0);
        let price = pow10(36).unwrap();
        let out = tune(&mut m, &t, &mut s, price, DAY).unwrap().unwrap();

        // time neutral = 1000 * 1/10 + 1000 = 1100; target = 1100 * 5 / 10 = 550
        assert_eq!(out.target_debt, e18(550));
        // 1000 * 1 day / 9 days
        assert_eq!(out.max_payout, mul_div(e18(1_000), U256::from(1u64), U256::from(9u64)).unwrap());
        let new_cv = mul_div_up(price, pow10(36).unwrap(), e18(550)).unwrap();
        assert_eq!(out.new_control_variable, new_cv);
        assert!(out.deferred);

        // control variable untouched until drained
        assert_eq!(s.control_variable, U256::from(2u64) * pow10(51).unwrap());
        assert!(s.adjustment.active);
        assert_eq!(s.adjustment.change, s.control_variable - new_cv);
        assert_eq!(s.adjustment.time_to_adjusted, 3_600);
        assert_eq!(s.adjustment.last_adjustment, DAY);
        assert_eq!(s.metadata.last_tune, DAY);
        assert_eq!(s.metadata.last_tune_debt, e18(550));
        assert_eq!(s.metadata.tune_below_capacity, e18(900));
        assert_eq!(m.max_payout, out.max_payout);
    }

    #[test]
    fn oversold_market_raises_immediately() {
        // 300 sold one day in, below the 900 threshold
        let (mut m, t, mut s) = setup(700, 300);
        s.adjustment = Adjustment {
            change: U256::from(5u64),
            last_adjustment: 0,
            time_to_adjusted: 3_600,
            active: true,
        };
        let price = U256::from(2u64) * pow10(36).unwrap();
        let out = tune(&mut m, &t, &mut s, price, DAY).unwrap().unwrap();

        // time neutral = 100 + 700 = 800; target = 400
        assert_eq!(out.target_debt, e18(400));
        assert!(!out.deferred);
        assert_eq!(s.control_variable, U256::from(5u64) * pow10(51).unwrap());
        assert!(!s.adjustment.active);
        assert_eq!(s.metadata.tune_below_capacity, e18(600));
    }

    #[test]
    fn capacity_in_quote_converts_targets_by_price() {
        let (mut m, t, mut s) = setup(1_000, 0);
        m.capacity_in_quote = true;
        let price = U256::from(2u64) * pow10(36).unwrap();
        let out = tune(&mut m, &t, &mut s, price, DAY).unwrap().unwrap();
        // 1100 quote at price 2 => 550 payout; target = 275
        assert_eq!(out.target_debt, e18(275));
        assert_eq!(out.max_payout, mul_div(e18(500), U256::from(1u64), U256::from(9u64)).unwrap());
    }

    #[test]
    fn concluded_market_never_tunes() {
        let (mut m, t, mut s) = setup(1_000, 0);
        assert_eq!(tune(&mut m, &t, &mut s, pow10(36).unwrap(), 10 * DAY).unwrap(), None);
    }
}
