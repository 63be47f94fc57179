//! # bond-core
//! Foundation types, fixed-point math and collaborator traits for the bond
//! auction engine.

pub mod config;
pub mod constants;
pub mod error;
pub mod math;
pub mod traits;
pub mod types;

pub use alloy_primitives::{Address, U256};
