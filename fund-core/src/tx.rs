//! Transaction snapshot
//!
//! An already-parsed, immutable view of one proposed transaction. Decision
//! functions only ever read it.

use crate::{
    types::{Address, AssetClass, Datum, Value},
    Error, Result,
};
use serde::{Deserialize, Serialize};

/// Reference to a previously produced record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutRef {
    /// Producing transaction
    pub tx_id: String,
    /// Output index within it
    pub index: u32,
}

/// A ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxOut {
    /// Address the record sits at
    pub address: Address,
    /// Tokens it carries
    pub value: Value,
    /// Payload
    pub datum: Datum,
}

impl TxOut {
    /// Create new record
    pub fn new(address: Address, value: Value, datum: Datum) -> Self {
        Self {
            address,
            value,
            datum,
        }
    }

    /// Quantity of `marker` carried
    pub fn marker_count(&self, marker: &AssetClass) -> i128 {
        self.value.quantity_of(marker)
    }
}

/// A consumed or referenced record with its origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxInInfo {
    /// Where it was produced
    pub out_ref: OutRef,
    /// The record itself
    pub resolved: TxOut,
}

/// Validity window in POSIX milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityRange {
    /// Inclusive lower bound
    pub lower: Option<i64>,
    /// Exclusive upper bound
    pub upper: Option<i64>,
}

impl ValidityRange {
    /// Window bounded on both sides
    pub fn bounded(lower: i64, upper: i64) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    /// Whether both bounds are finite
    pub fn is_bounded(&self) -> bool {
        self.lower.is_some() && self.upper.is_some()
    }
}

/// Parsed transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Consumed records
    pub inputs: Vec<TxInInfo>,
    /// Read-only records
    pub reference_inputs: Vec<TxInInfo>,
    /// Produced records
    pub outputs: Vec<TxOut>,
    /// Minted (positive) and burned (negative) tokens
    pub mint: Value,
    /// Validity window
    pub validity_range: ValidityRange,
}

impl Transaction {
    /// Consumed records
    pub fn consumed(&self) -> impl Iterator<Item = &TxOut> + '_ {
        self.inputs.iter().map(|i| &i.resolved)
    }

    /// Referenced records
    pub fn referenced(&self) -> impl Iterator<Item = &TxOut> + '_ {
        self.reference_inputs.iter().map(|i| &i.resolved)
    }

    /// Referenced then consumed records
    pub fn visible(&self) -> impl Iterator<Item = &TxOut> + '_ {
        self.referenced().chain(self.consumed())
    }
}

/// Lookup table that group pointers index into
///
/// Built once per call so each pointer resolves in constant time.
#[derive(Debug, Clone)]
pub struct PointerTable<'tx> {
    entries: Vec<&'tx TxOut>,
}

impl<'tx> PointerTable<'tx> {
    /// Table over the reference inputs
    pub fn references(tx: &'tx Transaction) -> Self {
        Self {
            entries: tx.referenced().collect(),
        }
    }

    /// Table over the outputs
    pub fn outputs(tx: &'tx Transaction) -> Self {
        Self {
            entries: tx.outputs.iter().collect(),
        }
    }

    /// Record at `pointer`
    pub fn resolve(&self, pointer: usize) -> Result<&'tx TxOut> {
        self.entries
            .get(pointer)
            .copied()
            .ok_or(Error::InvalidPointer {
                pointer,
                len: self.entries.len(),
            })
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Assembles transaction snapshots
#[derive(Debug, Default)]
pub struct TxBuilder {
    tx: Transaction,
    next_index: u32,
}

impl TxBuilder {
    /// Empty transaction
    pub fn new() -> Self {
        Self::default()
    }

    fn out_ref(&mut self) -> OutRef {
        let index = self.next_index;
        self.next_index += 1;
        OutRef {
            tx_id: "prior".to_string(),
            index,
        }
    }

    /// Consume `record`
    pub fn input(mut self, record: TxOut) -> Self {
        let out_ref = self.out_ref();
        self.tx.inputs.push(TxInInfo {
            out_ref,
            resolved: record,
        });
        self
    }

    /// Reference `record`
    pub fn reference(mut self, record: TxOut) -> Self {
        let out_ref = self.out_ref();
        self.tx.reference_inputs.push(TxInInfo {
            out_ref,
            resolved: record,
        });
        self
    }

    /// Produce `record`
    pub fn output(mut self, record: TxOut) -> Self {
        self.tx.outputs.push(record);
        self
    }

    /// Mint (or burn, when negative) `quantity` of `asset_class`
    pub fn mint(mut self, asset_class: &AssetClass, quantity: i128) -> Result<Self> {
        self.tx.mint.add_quantity(asset_class, quantity)?;
        Ok(self)
    }

    /// Set the validity window
    pub fn valid_between(mut self, lower: i64, upper: i64) -> Self {
        self.tx.validity_range = ValidityRange::bounded(lower, upper);
        self
    }

    /// Finish
    pub fn build(self) -> Transaction {
        self.tx
    }
}
