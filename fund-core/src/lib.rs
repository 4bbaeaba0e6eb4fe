//! Fund Core
//!
//! Validation core of a tokenized fund ledger: decides whether a proposed
//! transaction is allowed to advance the fund's on-ledger state.
//!
//! # Architecture
//!
//! - **Asset groups**: Holdings are sharded into small groups with dense ids
//! - **Pointer chase**: Callers name the groups to visit by position; ids are checked, not searched
//! - **Resumable reductions**: Folds over every group span transactions, pinned to one tick
//! - **Vault reconciliation**: Declared counters must match what the vault actually moved
//!
//! # Invariants
//!
//! - Group ids are `0..n_groups`, with no gaps
//! - No group ever holds more than [`MAX_GROUP_SIZE`] records
//! - A reduction only advances in the tick it started in
//! - Asset group records change only in `count`, never in identity or order

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod asset_group;
pub mod config;
pub mod error;
pub mod metrics;
pub mod portfolio;
pub mod reduction;
pub mod traversal;
pub mod tx;
pub mod types;
pub mod validator;
pub mod vault;

#[cfg(test)]
mod fixtures;

/// Largest number of records one asset group may hold
pub const MAX_GROUP_SIZE: usize = 3;

// Re-exports
pub use config::{Config, MetricsConfig, ProtocolConfig};
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use traversal::ValueSummary;
pub use tx::{OutRef, PointerTable, Transaction, TxBuilder, TxInInfo, TxOut, ValidityRange};
pub use types::{
    Address, AssetClass, AssetGroup, AssetRecord, Datum, Portfolio, Price, Reduction,
    ReductionMode, ReductionState, Supply, Value,
};
pub use validator::Validator;
