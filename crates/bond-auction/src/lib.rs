//! # bond-auction: Sequential dutch auction engine for bond markets.
//!
//! All pricing uses checked `U256` integer arithmetic with explicit rounding,
//! so every result is deterministic.
//!
//! - **Debt decay**: buying pressure is tracked as a debt that decays linearly
//!   over the market's decay interval; price is control variable times debt.
//! - **Tuning**: after each purchase the control variable is re-derived from a
//!   linear sell-through schedule. Decreases glide in over a delay window.
//! - **Circuit breaker**: a purchase that pushes debt above the ceiling closes
//!   the market instead of failing.
//! - **Oracle pricing**: oracle-referenced markets replace the debt price with
//!   a discounted feed price, optionally scaled by schedule deviation.

pub mod aggregator;
pub mod debt;
pub mod engine;
pub mod events;
pub mod params;
pub mod pricing;
pub mod store;
pub mod tuning;

pub use aggregator::LocalAggregator;
pub use engine::AuctionEngine;
pub use events::{AuctionEvent, CloseReason};
pub use params::{MarketParams, PricingParams};
pub use store::{MarketStore, MemoryMarketStore};
