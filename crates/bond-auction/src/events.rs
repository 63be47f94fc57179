//! Journal of state changes made by the engine.
//!
//! Every successful mutation appends one or more [`AuctionEvent`]s. Admin
//! changes are journaled too, which makes the journal the audit log for
//! configuration.

use bond_core::config::AuctioneerConfig;
use bond_core::types::{Intervals, MarketId};
use bond_core::{Address, U256};
use serde::{Deserialize, Serialize};

/// Why a market stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    Owner,
    /// Debt exceeded the market's ceiling.
    CircuitBreaker,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuctionEvent {
    MarketCreated {
        id: MarketId,
        owner: Address,
        payout_token: Address,
        quote_token: Address,
        model: String,
        initial_price: U256,
    },
    Bonded {
        id: MarketId,
        amount: U256,
        payout: U256,
        price: U256,
        at: u64,
    },
    Tuned {
        id: MarketId,
        old_control_variable: U256,
        new_control_variable: U256,
        deferred: bool,
        at: u64,
    },
    MarketClosed {
        id: MarketId,
        reason: CloseReason,
        at: u64,
    },
    IntervalsUpdated {
        id: MarketId,
        intervals: Intervals,
    },
    OwnershipPushed {
        id: MarketId,
        new_owner: Address,
    },
    OwnershipPulled {
        id: MarketId,
        owner: Address,
    },
    DefaultsUpdated {
        by: Address,
        config: AuctioneerConfig,
    },
    NewMarketsToggled {
        by: Address,
        allowed: bool,
    },
    CallbackAuthUpdated {
        by: Address,
        account: Address,
        authorized: bool,
    },
}

impl AuctionEvent {
    /// Market the event concerns, if any.
    pub fn market(&self) -> Option<MarketId> {
        match self {
            Self::MarketCreated { id, .. }
            | Self::Bonded { id, .. }
            | Self::Tuned { id, .. }
            | Self::MarketClosed { id, .. }
            | Self::IntervalsUpdated { id, .. }
            | Self::OwnershipPushed { id, .. }
            | Self::OwnershipPulled { id, .. } => Some(*id),
            Self::DefaultsUpdated { .. }
            | Self::NewMarketsToggled { .. }
            | Self::CallbackAuthUpdated { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_id_extraction() {
        let closed = AuctionEvent::MarketClosed {
            id: MarketId(3),
            reason: CloseReason::CircuitBreaker,
            at: 10,
        };
        assert_eq!(closed.market(), Some(MarketId(3)));

        let toggled = AuctionEvent::NewMarketsToggled {
            by: Address::ZERO,
            allowed: false,
        };
        assert_eq!(toggled.market(), None);
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = AuctionEvent::MarketClosed {
            id: MarketId(1),
            reason: CloseReason::Owner,
            at: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "market_closed");
        assert_eq!(json["reason"], "Owner");
    }
}
