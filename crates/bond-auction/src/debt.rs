//! Debt decay for debt-priced (SDA) markets.
//!
//! Debt is a time-decayed sum of payouts. It is stored as of
//! `metadata.last_decay` and decays linearly to zero over one
//! `debt_decay_interval` (`D`):
//!
//! ```text
//! debt(now) = total_debt * (D - (now - last_decay)) / D    last_decay <= now
//! debt(now) = total_debt * (D + (last_decay - now)) / D    last_decay >  now
//! ```
//!
//! A purchase moves `last_decay` forward in proportion to its payout instead
//! of resetting it to `now`, which keeps the price continuous across the
//! purchase. Large purchases can therefore leave `last_decay` in the future.

use bond_core::error::MathError;
use bond_core::math::{add, mul_div, mul_div_up, sub, to_u64};
use bond_core::types::{Adjustment, Market, SdaState};
use bond_core::U256;

/// Debt of `state` as of `now`. Debt does not decay before `start`.
pub fn current_debt(state: &SdaState, start: u64, now: u64) -> Result<U256, MathError> {
    if now < start {
        return Ok(state.total_debt);
    }
    let interval = state.metadata.debt_decay_interval;
    let last_decay = state.metadata.last_decay;
    let d = U256::from(interval);

    if last_decay > now {
        let ahead = U256::from(last_decay - now);
        return mul_div(state.total_debt, add(d, ahead)?, d);
    }
    let elapsed = now - last_decay;
    if elapsed >= interval {
        return Ok(U256::ZERO);
    }
    mul_div(state.total_debt, U256::from(interval - elapsed), d)
}

/// Portion of an adjustment applied by `now`, and whether it is still running.
pub fn control_decay(adjustment: &Adjustment, now: u64) -> Result<(U256, bool), MathError> {
    if !adjustment.active {
        return Ok((U256::ZERO, false));
    }
    let elapsed = now.saturating_sub(adjustment.last_adjustment);
    if elapsed >= adjustment.time_to_adjusted {
        return Ok((adjustment.change, false));
    }
    let decay = mul_div(
        adjustment.change,
        U256::from(elapsed),
        U256::from(adjustment.time_to_adjusted),
    )?;
    Ok((decay, true))
}

/// Control variable with any in-flight adjustment applied up to `now`.
pub fn current_control_variable(state: &SdaState, now: u64) -> Result<U256, MathError> {
    let (decay, _) = control_decay(&state.adjustment, now)?;
    sub(state.control_variable, decay)
}

/// Price implied by control variable and debt, floored at `min_price`.
pub fn debt_price(
    control_variable: U256,
    debt: U256,
    scale: U256,
    min_price: U256,
) -> Result<U256, MathError> {
    Ok(mul_div_up(control_variable, debt, scale)?.max(min_price))
}

/// Price and payout of one purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecayOutcome {
    pub price: U256,
    pub payout: U256,
}

/// Bring `state` up to `now` and price a purchase of `amount` quote tokens.
///
/// Stores the decayed debt and drains any in-flight adjustment, but does not
/// add the payout to the debt: callers check the payout against the market's
/// limits first, then call [`add_payout_to_debt`]. Both steps are staged on a
/// copy of the market record.
pub fn decay_and_get_price(
    market: &Market,
    start: u64,
    state: &mut SdaState,
    amount: U256,
    now: u64,
) -> Result<DecayOutcome, MathError> {
    let decayed = current_debt(state, start, now)?;
    if decayed.is_zero() && now >= state.metadata.last_decay {
        // Fully decayed: restart the decay window at the purchase.
        state.metadata.last_decay = now;
    }
    state.total_debt = decayed;

    let elapsed = now.saturating_sub(state.adjustment.last_adjustment);
    let (decay, still_active) = control_decay(&state.adjustment, now)?;
    if state.adjustment.active {
        if still_active {
            state.adjustment.change = sub(state.adjustment.change, decay)?;
            state.adjustment.time_to_adjusted -= elapsed;
            state.adjustment.last_adjustment = now;
        } else {
            state.adjustment.change = U256::ZERO;
            state.adjustment.time_to_adjusted = 0;
            state.adjustment.active = false;
        }
        state.control_variable = sub(state.control_variable, decay)?;
    }

    let price = debt_price(state.control_variable, decayed, market.scale, market.min_price)?;
    let payout = mul_div(amount, market.scale, price)?;
    Ok(DecayOutcome { price, payout })
}

/// Add `payout` to debt already decayed to `now` by [`decay_and_get_price`].
///
/// `last_decay` moves forward by `ceil(D * payout / last_tune_debt)`, capped
/// at the end of the `u64` timeline, and the decayed debt is rescaled over the
/// longer window so the price stays continuous. One wei is added on top.
pub fn add_payout_to_debt(state: &mut SdaState, payout: U256, now: u64) -> Result<(), MathError> {
    let interval = state.metadata.debt_decay_interval;
    let d = U256::from(interval);
    let decayed = state.total_debt;
    let last_decay = state.metadata.last_decay;

    let headroom = U256::from(u64::MAX - last_decay);
    let increment = mul_div_up(d, payout, state.metadata.last_tune_debt)?.min(headroom);
    let decay_offset = if now >= last_decay {
        U256::from(interval.saturating_sub(now - last_decay))
    } else {
        add(d, U256::from(last_decay - now))?
    };

    state.total_debt = add(
        add(mul_div(decayed, d, add(decay_offset, increment)?)?, payout)?,
        U256::from(1u64),
    )?;
    state.metadata.last_decay = last_decay + to_u64(increment)?;
    Ok(())
}
