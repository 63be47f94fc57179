//! In-process [`Aggregator`] issuing sequential market ids.

use std::sync::atomic::{AtomicU64, Ordering};

use bond_core::error::AuctionError;
use bond_core::traits::Aggregator;
use bond_core::types::{MarketId, Token};
use parking_lot::Mutex;

/// Hands out ids `0, 1, 2, ...` and remembers which pair each was issued for.
///
/// Ids are never reused, including ids whose market creation later failed.
#[derive(Debug, Default)]
pub struct LocalAggregator {
    next_id: AtomicU64,
    registrations: Mutex<Vec<(MarketId, Token, Token)>>,
}

impl LocalAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ids issued so far.
    pub fn market_counter(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    /// Ids issued for a payout/quote pair, in issue order.
    pub fn markets_for_pair(&self, payout: &Token, quote: &Token) -> Vec<MarketId> {
        self.registrations
            .lock()
            .iter()
            .filter(|(_, p, q)| p == payout && q == quote)
            .map(|(id, _, _)| *id)
            .collect()
    }
}

impl Aggregator for LocalAggregator {
    fn register_market(&self, payout: &Token, quote: &Token) -> Result<MarketId, AuctionError> {
        let id = MarketId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.registrations.lock().push((id, *payout, *quote));
        Ok(id)
    }
}
