//! Market creation parameters: validation and derivation of initial state.
//!
//! Everything here is pure. [`build_market`] either returns the complete set
//! of records for a new market or an error; the engine writes nothing until
//! it succeeds.

use bond_core::config::AuctioneerConfig;
use bond_core::constants::{
    DEBT_DECAY_MULTIPLIER, MAX_DEBT_BUFFER, MAX_FIXED_TERM_VESTING, MAX_SCALE_ADJUSTMENT,
    MAX_TOKEN_DECIMALS, MIN_FIXED_TERM_VESTING, MIN_TOKEN_DECIMALS, ONE_HUNDRED_PERCENT,
    SCALE_BASE_EXPONENT,
};
use bond_core::error::{AuctionError, ParamsError};
use bond_core::math::{add, log10_floor, mul_div, mul_div_up, pow10, sub};
use bond_core::traits::PriceOracle;
use bond_core::types::{
    Adjustment, Market, Metadata, OracleTerms, PriceModel, SdaState, Terms, Token, Vesting,
};
use bond_core::{Address, U256};
use serde::{Deserialize, Serialize};

/// Everything a creator supplies for a new market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParams {
    pub payout_token: Token,
    pub quote_token: Token,
    pub callback: Option<Address>,
    /// Budget of the market, in quote tokens if `capacity_in_quote`.
    pub capacity: U256,
    pub capacity_in_quote: bool,
    pub vesting: Vesting,
    /// `None` or `Some(0)` starts the market immediately.
    pub start: Option<u64>,
    pub duration: u64,
    pub deposit_interval: u64,
    pub pricing: PricingParams,
}

/// Price-model specific creation inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingParams {
    Sda {
        /// Opening price, already scaled (see [`formatted_price`]).
        initial_price: U256,
        minimum_price: U256,
        /// Headroom above target debt before the circuit breaker trips.
        debt_buffer: u32,
        scale_adjustment: i8,
    },
    OracleFixedDiscount {
        oracle: Address,
        base_discount: u32,
        max_discount_from_current: u32,
    },
    OracleDynamicDiscount {
        oracle: Address,
        base_discount: u32,
        max_discount_from_current: u32,
        /// Price move per deposit interval of schedule deviation.
        target_interval_discount: u32,
    },
    FixedPrice {
        price: U256,
        scale_adjustment: i8,
    },
}

impl PricingParams {
    /// Oracle address for the oracle-priced variants.
    pub fn oracle(&self) -> Option<Address> {
        match self {
            Self::OracleFixedDiscount { oracle, .. } | Self::OracleDynamicDiscount { oracle, .. } => {
                Some(*oracle)
            }
            _ => None,
        }
    }
}

/// Validated, derived records for a market that does not have an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMarket {
    pub market: Market,
    pub terms: Terms,
    pub model: PriceModel,
    /// Price the market opens at.
    pub initial_price: U256,
}

/// Scale a raw price (`price / 10^price_decimals` quote per payout token) to
/// the engine's price units for a market with the given scale adjustment.
///
/// `formatted = raw * 10^(36 + scale_adjustment + quote_decimals - payout_decimals - price_decimals)`
pub fn formatted_price(
    raw_price: U256,
    price_decimals: u8,
    payout: &Token,
    quote: &Token,
    scale_adjustment: i32,
) -> Result<U256, ParamsError> {
    let exponent = SCALE_BASE_EXPONENT + scale_adjustment + quote.decimals as i32
        - payout.decimals as i32
        - price_decimals as i32;
    if exponent < 0 {
        return Err(ParamsError::OracleScale);
    }
    let factor = pow10(exponent)?;
    Ok(raw_price
        .checked_mul(factor)
        .ok_or(bond_core::error::MathError::ArithmeticOverflow)?)
}

/// Scale adjustment that keeps price, debt and control variable in a
/// comfortable range: `payout_decimals - quote_decimals - price_decimals / 2`,
/// where `price_decimals = floor(log10(raw_price)) - raw_decimals`.
pub fn recommended_scale_adjustment(
    raw_price: U256,
    raw_decimals: u8,
    payout: &Token,
    quote: &Token,
) -> Result<i32, ParamsError> {
    let digits = log10_floor(raw_price).ok_or(ParamsError::ZeroPrice)?;
    let price_decimals = digits - raw_decimals as i32;
    Ok(payout.decimals as i32 - quote.decimals as i32 - price_decimals / 2)
}

fn check_decimals(token: &Token) -> Result<(), ParamsError> {
    if !(MIN_TOKEN_DECIMALS..=MAX_TOKEN_DECIMALS).contains(&token.decimals) {
        return Err(ParamsError::TokenDecimals(token.decimals));
    }
    Ok(())
}

fn check_scale_adjustment(adjustment: i32) -> Result<(), ParamsError> {
    let bound = MAX_SCALE_ADJUSTMENT as i32;
    if !(-bound..=bound).contains(&adjustment) {
        return Err(ParamsError::ScaleAdjustment(adjustment));
    }
    Ok(())
}

fn market_scale(adjustment: i32) -> Result<U256, ParamsError> {
    check_scale_adjustment(adjustment)?;
    Ok(pow10(SCALE_BASE_EXPONENT + adjustment)?)
}

fn check_vesting(vesting: Vesting, conclusion: u64) -> Result<Vesting, ParamsError> {
    match vesting.normalized() {
        Vesting::Instant => Ok(Vesting::Instant),
        Vesting::FixedTerm(term) => {
            if !(MIN_FIXED_TERM_VESTING..=MAX_FIXED_TERM_VESTING).contains(&term) {
                return Err(ParamsError::Vesting(format!(
                    "fixed term {term}s outside [{MIN_FIXED_TERM_VESTING}, {MAX_FIXED_TERM_VESTING}]"
                )));
            }
            Ok(Vesting::FixedTerm(term))
        }
        Vesting::FixedExpiry(expiry) => {
            if expiry < conclusion {
                return Err(ParamsError::Vesting(format!(
                    "expiry {expiry} before conclusion {conclusion}"
                )));
            }
            Ok(Vesting::FixedExpiry(expiry))
        }
    }
}

fn check_percentage(value: u32, inclusive: bool) -> Result<(), ParamsError> {
    let out_of_range = if inclusive {
        value > ONE_HUNDRED_PERCENT
    } else {
        value >= ONE_HUNDRED_PERCENT
    };
    if out_of_range {
        return Err(ParamsError::Discount(value));
    }
    Ok(())
}

/// Timing checks shared by every price model. Returns the resolved terms.
fn build_terms(
    params: &MarketParams,
    config: &AuctioneerConfig,
    now: u64,
) -> Result<Terms, ParamsError> {
    check_decimals(&params.payout_token)?;
    check_decimals(&params.quote_token)?;

    if params.duration < config.min_market_duration {
        return Err(ParamsError::DurationTooShort {
            duration: params.duration,
            min: config.min_market_duration,
        });
    }
    if params.deposit_interval < config.min_deposit_interval
        || params.deposit_interval > params.duration
    {
        return Err(ParamsError::DepositInterval {
            interval: params.deposit_interval,
            min: config.min_deposit_interval,
            max: params.duration,
        });
    }

    let start = match params.start {
        None | Some(0) => now,
        Some(start) if start < now => return Err(ParamsError::StartInPast { start, now }),
        Some(start) => start,
    };
    let conclusion = start
        .checked_add(params.duration)
        .ok_or(bond_core::error::MathError::ArithmeticOverflow)?;

    if params.capacity.is_zero() {
        return Err(ParamsError::ZeroCapacity);
    }

    let vesting = check_vesting(params.vesting, conclusion)?;

    Ok(Terms {
        start,
        conclusion,
        length: params.duration,
        deposit_interval: params.deposit_interval,
        vesting,
    })
}

fn base_market(params: &MarketParams, owner: Address, scale: U256, min_price: U256) -> Market {
    Market {
        owner,
        payout_token: params.payout_token,
        quote_token: params.quote_token,
        callback: params.callback,
        capacity_in_quote: params.capacity_in_quote,
        capacity: params.capacity,
        max_payout: U256::ZERO,
        sold: U256::ZERO,
        purchased: U256::ZERO,
        scale,
        min_price,
    }
}

/// Capacity expressed in payout tokens.
fn payout_capacity(params: &MarketParams, scale: U256, price: U256) -> Result<U256, ParamsError> {
    if params.capacity_in_quote {
        Ok(mul_div(params.capacity, scale, price)?)
    } else {
        Ok(params.capacity)
    }
}

/// Validate `params` and derive the records of a new market owned by `owner`.
///
/// `oracle` must be the oracle named by oracle-priced params; it is queried
/// by pair since the market has no identifier yet.
pub fn build_market(
    params: &MarketParams,
    owner: Address,
    config: &AuctioneerConfig,
    oracle: Option<&dyn PriceOracle>,
    now: u64,
) -> Result<NewMarket, AuctionError> {
    let terms = build_terms(params, config, now)?;

    match &params.pricing {
        PricingParams::Sda {
            initial_price,
            minimum_price,
            debt_buffer,
            scale_adjustment,
        } => Ok(build_sda(
            params,
            owner,
            config,
            terms,
            *initial_price,
            *minimum_price,
            *debt_buffer,
            *scale_adjustment,
        )?),
        PricingParams::OracleFixedDiscount {
            oracle: address,
            base_discount,
            max_discount_from_current,
        } => {
            let oracle = oracle.ok_or(ParamsError::UnknownOracle(*address))?;
            let (model, market, initial_price) = build_oracle(
                params,
                owner,
                terms.clone(),
                oracle,
                *address,
                *base_discount,
                *max_discount_from_current,
            )?;
            Ok(NewMarket {
                market,
                terms,
                model: PriceModel::OracleFixedDiscount(model),
                initial_price,
            })
        }
        PricingParams::OracleDynamicDiscount {
            oracle: address,
            base_discount,
            max_discount_from_current,
            target_interval_discount,
        } => {
            check_percentage(*target_interval_discount, true)?;
            let oracle = oracle.ok_or(ParamsError::UnknownOracle(*address))?;
            let (model, market, initial_price) = build_oracle(
                params,
                owner,
                terms.clone(),
                oracle,
                *address,
                *base_discount,
                *max_discount_from_current,
            )?;
            // k = L / I * d
            let decay_speed = mul_div(
                U256::from(terms.length),
                U256::from(*target_interval_discount),
                U256::from(terms.deposit_interval),
            )?;
            Ok(NewMarket {
                market,
                terms,
                model: PriceModel::OracleDynamicDiscount {
                    oracle: model,
                    decay_speed,
                },
                initial_price,
            })
        }
        PricingParams::FixedPrice {
            price,
            scale_adjustment,
        } => {
            let scale = market_scale(*scale_adjustment as i32)?;
            if price.is_zero() {
                return Err(ParamsError::ZeroPrice.into());
            }
            let capacity = payout_capacity(params, scale, *price)?;
            let mut market = base_market(params, owner, scale, *price);
            market.max_payout = mul_div(
                capacity,
                U256::from(terms.deposit_interval),
                U256::from(terms.length),
            )?;
            Ok(NewMarket {
                market,
                terms,
                model: PriceModel::FixedPrice { price: *price },
                initial_price: *price,
            })
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_sda(
    params: &MarketParams,
    owner: Address,
    config: &AuctioneerConfig,
    terms: Terms,
    initial_price: U256,
    minimum_price: U256,
    debt_buffer: u32,
    scale_adjustment: i8,
) -> Result<NewMarket, ParamsError> {
    let scale = market_scale(scale_adjustment as i32)?;

    if minimum_price.is_zero() || initial_price.is_zero() {
        return Err(ParamsError::ZeroPrice);
    }
    if initial_price < minimum_price {
        return Err(ParamsError::InitialBelowMinimum {
            initial: initial_price,
            minimum: minimum_price,
        });
    }
    if debt_buffer > MAX_DEBT_BUFFER {
        return Err(ParamsError::DebtBuffer(debt_buffer));
    }

    let length = U256::from(terms.length);
    let capacity = payout_capacity(params, scale, initial_price)?;

    let debt_decay_interval = config
        .min_debt_decay_interval
        .max(terms.deposit_interval.saturating_mul(DEBT_DECAY_MULTIPLIER));

    let target_debt = mul_div(capacity, U256::from(debt_decay_interval), length)?;
    if target_debt.is_zero() {
        return Err(ParamsError::ZeroTargetDebt);
    }
    let max_payout = mul_div(capacity, U256::from(terms.deposit_interval), length)?;

    // The buffer never lets a single max-size purchase trip the breaker.
    let percent = U256::from(ONE_HUNDRED_PERCENT);
    let payout_buffer = mul_div(max_payout, percent, target_debt)?;
    let buffer = U256::from(debt_buffer).max(payout_buffer);
    let max_debt = add(target_debt, mul_div(target_debt, buffer, percent)?)?;

    let control_variable = mul_div(initial_price, scale, target_debt)?;
    if control_variable.is_zero() {
        return Err(ParamsError::ZeroPrice);
    }

    let tune_interval = terms.deposit_interval.max(config.default_tune_interval);
    let tune_interval_capacity = mul_div(params.capacity, U256::from(tune_interval), length)?;
    let tune_below_capacity = params.capacity.saturating_sub(tune_interval_capacity);

    let mut market = base_market(params, owner, scale, minimum_price);
    market.max_payout = max_payout;

    let state = SdaState {
        control_variable,
        max_debt,
        total_debt: target_debt,
        metadata: Metadata {
            last_decay: terms.start,
            last_tune: terms.start,
            tune_interval,
            tune_adjustment_delay: config.default_tune_adjustment,
            debt_decay_interval,
            tune_interval_capacity,
            tune_below_capacity,
            last_tune_debt: target_debt,
        },
        adjustment: Adjustment::default(),
    };

    Ok(NewMarket {
        market,
        terms,
        model: PriceModel::Sda(state),
        initial_price,
    })
}

fn build_oracle(
    params: &MarketParams,
    owner: Address,
    terms: Terms,
    oracle: &dyn PriceOracle,
    address: Address,
    base_discount: u32,
    max_discount_from_current: u32,
) -> Result<(OracleTerms, Market, U256), AuctionError> {
    check_percentage(base_discount, false)?;
    check_percentage(max_discount_from_current, true)?;
    if base_discount > max_discount_from_current {
        return Err(ParamsError::DiscountOrder {
            base: base_discount,
            max: max_discount_from_current,
        }
        .into());
    }

    let payout = &params.payout_token;
    let quote = &params.quote_token;
    let oracle_decimals = oracle.pair_decimals(payout, quote)?;
    if !(MIN_TOKEN_DECIMALS..=MAX_TOKEN_DECIMALS).contains(&oracle_decimals) {
        return Err(ParamsError::OracleDecimals(oracle_decimals).into());
    }
    let raw_price = oracle.pair_price(payout, quote)?;
    if raw_price.is_zero() {
        return Err(ParamsError::ZeroPrice.into());
    }

    let scale_adjustment = recommended_scale_adjustment(raw_price, oracle_decimals, payout, quote)?;
    let scale = market_scale(scale_adjustment)?;
    let oracle_conversion = formatted_price(
        U256::from(1u64),
        oracle_decimals,
        payout,
        quote,
        scale_adjustment,
    )?;

    let price = raw_price
        .checked_mul(oracle_conversion)
        .ok_or(bond_core::error::MathError::ArithmeticOverflow)?;
    let percent = U256::from(ONE_HUNDRED_PERCENT);
    // A 100% maximum discount leaves the market without a floor.
    let min_price = mul_div_up(
        price,
        sub(percent, U256::from(max_discount_from_current))?,
        percent,
    )?;
    let initial_price = mul_div_up(price, sub(percent, U256::from(base_discount))?, percent)?;

    let capacity = payout_capacity(params, scale, initial_price)?;
    let mut market = base_market(params, owner, scale, min_price);
    market.max_payout = mul_div(
        capacity,
        U256::from(terms.deposit_interval),
        U256::from(terms.length),
    )?;

    let model = OracleTerms {
        oracle: address,
        oracle_conversion,
        base_discount,
    };
    Ok((model, market, initial_price))
}
