//! Error types for fund validation

use thiserror::Error;

/// Result type for validation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Validation errors
///
/// Every variant is fatal to the enclosing validation call: the proposed
/// transaction is rejected and the caller has to build a new one.
#[derive(Error, Debug)]
pub enum Error {
    /// Expected record absent
    #[error("No matching record: {0}")]
    NoMatch(String),

    /// More than one record where exactly one was expected
    #[error("Expected a single {what}, found {count}")]
    NotASingleton {
        /// What was looked up
        what: String,
        /// How many candidates were found
        count: usize,
    },

    /// Record is not at its canonical address
    #[error("Wrong address: expected {expected}, found {found}")]
    WrongAddress {
        /// Canonical address
        expected: String,
        /// Address the record sits at
        found: String,
    },

    /// Record does not carry exactly one marker token
    #[error("Expected exactly one {marker} marker, found {found}")]
    MarkerCount {
        /// Marker asset class
        marker: String,
        /// Quantity carried
        found: i128,
    },

    /// Record carries the wrong payload
    #[error("Wrong datum: {0}")]
    WrongDatum(String),

    /// Pointer out of range of its lookup table
    #[error("Invalid pointer {pointer}: table holds {len} records")]
    InvalidPointer {
        /// Offending pointer
        pointer: usize,
        /// Table length
        len: usize,
    },

    /// Pointed shard has an unexpected id
    #[error("Wrong asset group id: expected {expected}, found {found}")]
    WrongId {
        /// Id required at this position
        expected: u64,
        /// Id of the pointed shard
        found: u64,
    },

    /// Pointers are not strictly increasing
    #[error("Out of order pointer: {current} follows {previous}")]
    OutOfOrderPointer {
        /// Previous pointer
        previous: usize,
        /// Current pointer
        current: usize,
    },

    /// A step that must make progress was given no pointers
    #[error("Pointer list is empty")]
    EmptyPointerList,

    /// Shard holds more records than its capacity
    #[error("Asset group {id} is overfull: {len} records, capacity {capacity}")]
    Overfull {
        /// Shard id
        id: u64,
        /// Record count
        len: usize,
        /// Capacity
        capacity: usize,
    },

    /// Shard must be empty but is not
    #[error("Asset group {id} is not empty: {len} records")]
    NotEmpty {
        /// Shard id
        id: u64,
        /// Record count
        len: usize,
    },

    /// Shard storage consumed by an operation that must only read it
    #[error("Asset group storage must not be spent")]
    ShardSpent,

    /// Shard record carries tokens besides its marker
    #[error("Asset group {id} carries extraneous tokens")]
    ExtraneousTokens {
        /// Shard id
        id: u64,
    },

    /// Reduction tick does not match the current global tick
    #[error("Stale reduction epoch: current tick {current}, reduction tick {found}")]
    StaleEpoch {
        /// Current global tick
        current: u64,
        /// Tick pinned by the reduction
        found: u64,
    },

    /// Continuation switched reduction purpose
    #[error("Reduction mode changed from {from} to {to}")]
    ModeChanged {
        /// Mode kind before
        from: String,
        /// Mode kind after
        to: String,
    },

    /// Declared reduction state differs from the computed one
    #[error("Reduction mismatch: expected {expected}, declared {declared}")]
    ReductionMismatch {
        /// Computed state
        expected: String,
        /// Declared state
        declared: String,
    },

    /// Reduction already reached its answer and cannot be stepped
    #[error("Reduction already finished")]
    ReductionFinished,

    /// Asset class found where it must be absent
    #[error("Asset class {0} is present")]
    AssetClassPresent(String),

    /// Invalid portfolio state transition
    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        /// State before
        from: String,
        /// State after
        to: String,
        /// Reason for rejection
        reason: String,
    },

    /// Field other than `count` changed under a count-only update
    #[error("Asset group {id} position {position}: {field} changed")]
    IdentityFieldChanged {
        /// Shard id
        id: u64,
        /// Record position
        position: usize,
        /// Changed field
        field: &'static str,
    },

    /// Shard gained or lost records under a count-only update
    #[error("Asset group {id} changed size from {before} to {after}")]
    AssetSetChanged {
        /// Shard id
        id: u64,
        /// Record count before
        before: usize,
        /// Record count after
        after: usize,
    },

    /// Asset count went below zero
    #[error("Asset group {id} position {position}: negative count")]
    NegativeCount {
        /// Shard id
        id: u64,
        /// Record position
        position: usize,
    },

    /// Declared counters do not reconcile with observed changes
    #[error("Counter mismatch: {0}")]
    CounterMismatch(String),

    /// Aggregate over zero records
    #[error("No price data in traversed asset groups")]
    NoPriceData,

    /// Price with a non-positive denominator
    #[error("Invalid price {numerator}/{denominator}")]
    InvalidPrice {
        /// Numerator
        numerator: i64,
        /// Denominator
        denominator: i64,
    },

    /// Minted value differs from what the operation requires
    #[error("Mint mismatch: expected {expected}, found {found}")]
    MintMismatch {
        /// Required quantity
        expected: i128,
        /// Minted quantity
        found: i128,
    },

    /// Transaction lacks a bounded validity window
    #[error("Transaction validity range must be bounded")]
    MissingValidityRange,

    /// Checked arithmetic overflowed
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Metrics(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(format!("Failed to parse config: {}", err))
    }
}
