//! Scenario and adversarial test suite for the bond auction engine.
//!
//! Integration tests drive [`bond_auction::AuctionEngine`] through whole
//! market lifecycles with mock collaborators from [`helpers`], and try to
//! break pricing invariants under randomized purchase sequences.

pub mod helpers;
