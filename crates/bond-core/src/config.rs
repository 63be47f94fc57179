//! Engine-wide tuning defaults and creation bounds.
//!
//! [`AuctioneerConfig`] is passed to the engine explicitly. Changes after
//! construction go through the engine's `set_defaults`, which journals them.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MIN_DEBT_DECAY_INTERVAL, DEFAULT_MIN_DEPOSIT_INTERVAL, DEFAULT_MIN_MARKET_DURATION,
    DEFAULT_TUNE_ADJUSTMENT, DEFAULT_TUNE_INTERVAL,
};
use crate::error::ParamsError;

/// Defaults applied to new markets and the bounds their parameters must respect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctioneerConfig {
    /// Minimum seconds between lagging-market tunes (raised to the deposit interval if shorter).
    pub default_tune_interval: u64,
    /// Seconds over which a control-variable decrease is applied.
    pub default_tune_adjustment: u64,
    /// Floor for a market's debt decay interval.
    pub min_debt_decay_interval: u64,
    /// Floor for a market's deposit interval.
    pub min_deposit_interval: u64,
    /// Floor for a market's duration.
    pub min_market_duration: u64,
    /// Whether `create_market` accepts new markets.
    pub allow_new_markets: bool,
}

impl Default for AuctioneerConfig {
    fn default() -> Self {
        Self {
            default_tune_interval: DEFAULT_TUNE_INTERVAL,
            default_tune_adjustment: DEFAULT_TUNE_ADJUSTMENT,
            min_debt_decay_interval: DEFAULT_MIN_DEBT_DECAY_INTERVAL,
            min_deposit_interval: DEFAULT_MIN_DEPOSIT_INTERVAL,
            min_market_duration: DEFAULT_MIN_MARKET_DURATION,
            allow_new_markets: true,
        }
    }
}

impl AuctioneerConfig {
    /// Reject configurations the engine cannot operate with.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let fields = [
            ("default_tune_interval", self.default_tune_interval),
            ("default_tune_adjustment", self.default_tune_adjustment),
            ("min_debt_decay_interval", self.min_debt_decay_interval),
            ("min_deposit_interval", self.min_deposit_interval),
            ("min_market_duration", self.min_market_duration),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| *v == 0) {
            return Err(ParamsError::Config(format!("{name} must be non-zero")));
        }
        if self.default_tune_adjustment > self.default_tune_interval {
            return Err(ParamsError::Config(
                "default_tune_adjustment exceeds default_tune_interval".to_string(),
            ));
        }
        if self.min_deposit_interval > self.min_market_duration {
            return Err(ParamsError::Config(
                "min_deposit_interval exceeds min_market_duration".to_string(),
            ));
        }
        Ok(())
    }
}
