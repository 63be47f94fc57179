//! Market record storage.
//!
//! Provides the [`MarketStore`] trait, an arena of [`MarketRecord`]s keyed by
//! [`MarketId`], and the in-memory [`MemoryMarketStore`].
//!
//! Records are never removed. The engine reads a record, stages changes on a
//! clone and writes it back with [`MarketStore::replace`] only once the whole
//! operation has succeeded.

use std::collections::BTreeMap;

use bond_core::error::{AuctionError, ParamsError};
use bond_core::types::{MarketId, MarketRecord};
use serde::{Deserialize, Serialize};

/// Arena of market records.
///
/// Not synchronized. Callers that share a store across threads wrap the
/// owning engine in a lock.
pub trait MarketStore: Send + Sync {
    /// Store a new record under its own id.
    ///
    /// # Errors
    ///
    /// [`ParamsError::DuplicateMarket`] if the id is already taken.
    fn insert(&mut self, record: MarketRecord) -> Result<(), AuctionError>;

    /// Look up a record by id.
    fn get(&self, id: MarketId) -> Option<&MarketRecord>;

    /// Overwrite an existing record.
    ///
    /// # Errors
    ///
    /// [`AuctionError::UnknownMarket`] if no record has this id.
    fn replace(&mut self, record: MarketRecord) -> Result<(), AuctionError>;

    /// Number of stored markets.
    fn market_count(&self) -> usize;

    /// All stored ids, ascending.
    fn ids(&self) -> Vec<MarketId>;

    fn is_empty(&self) -> bool {
        self.market_count() == 0
    }
}

/// In-memory [`MarketStore`] backed by an ordered map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMarketStore {
    markets: BTreeMap<MarketId, MarketRecord>,
}

impl MemoryMarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize every record as JSON, for inspection and replay.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.markets.values().collect::<Vec<_>>())
    }

    /// Rebuild a store from [`to_json`](Self::to_json) output.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let records: Vec<MarketRecord> = serde_json::from_str(json)?;
        Ok(Self {
            markets: records.into_iter().map(|r| (r.id, r)).collect(),
        })
    }
}

impl MarketStore for MemoryMarketStore {
    fn insert(&mut self, record: MarketRecord) -> Result<(), AuctionError> {
        if self.markets.contains_key(&record.id) {
            return Err(ParamsError::DuplicateMarket(record.id).into());
        }
        self.markets.insert(record.id, record);
        Ok(())
    }

    fn get(&self, id: MarketId) -> Option<&MarketRecord> {
        self.markets.get(&id)
    }

    fn replace(&mut self, record: MarketRecord) -> Result<(), AuctionError> {
        match self.markets.get_mut(&record.id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(AuctionError::UnknownMarket(record.id)),
        }
    }

    fn market_count(&self) -> usize {
        self.markets.len()
    }

    fn ids(&self) -> Vec<MarketId> {
        self.markets.keys().copied().collect()
    }
}
