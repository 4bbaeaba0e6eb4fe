//! Core types for fund validation
//!
//! All types are designed for:
//! - Exact arithmetic (checked `i128` quantities, `Ratio` prices)
//! - Deterministic ordering (`BTreeMap` keyed values)
//! - Structural comparison (mapping equality, no stored zeros)

use crate::{Error, Result, MAX_GROUP_SIZE};
use num_rational::Ratio;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ledger address a record sits at
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Create new address
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque asset identifier (minting policy + token name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetClass {
    /// Minting policy
    pub policy_id: String,
    /// Token name under the policy
    pub token_name: String,
}

impl AssetClass {
    /// Create new asset class
    pub fn new(policy_id: impl Into<String>, token_name: impl Into<String>) -> Self {
        Self {
            policy_id: policy_id.into(),
            token_name: token_name.into(),
        }
    }

    /// The base currency
    pub fn lovelace() -> Self {
        Self::new("", "")
    }

    /// Whether this is the base currency
    pub fn is_lovelace(&self) -> bool {
        self.policy_id.is_empty() && self.token_name.is_empty()
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_lovelace() {
            write!(f, "lovelace")
        } else {
            write!(f, "{}.{}", self.policy_id, self.token_name)
        }
    }
}

/// Multi-asset quantity
///
/// Zero quantities are never stored, so `==` is a mapping comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(AssetClass, i128)>", into = "Vec<(AssetClass, i128)>")]
pub struct Value(BTreeMap<AssetClass, i128>);

impl Value {
    /// Empty value
    pub fn new() -> Self {
        Self::default()
    }

    /// Base currency only
    pub fn lovelace(amount: i128) -> Self {
        Self::singleton(AssetClass::lovelace(), amount)
    }

    /// Single asset class
    pub fn singleton(asset_class: AssetClass, quantity: i128) -> Self {
        let mut entries = BTreeMap::new();
        if quantity != 0 {
            entries.insert(asset_class, quantity);
        }
        Self(entries)
    }

    /// Quantity of one asset class (zero when absent)
    pub fn quantity_of(&self, asset_class: &AssetClass) -> i128 {
        self.0.get(asset_class).copied().unwrap_or(0)
    }

    /// Base currency quantity
    pub fn lovelace_of(&self) -> i128 {
        self.quantity_of(&AssetClass::lovelace())
    }

    /// Add `quantity` of `asset_class`
    pub fn add_quantity(&mut self, asset_class: &AssetClass, quantity: i128) -> Result<()> {
        if quantity == 0 {
            return Ok(());
        }
        let current = self.quantity_of(asset_class);
        let updated = current
            .checked_add(quantity)
            .ok_or(Error::ArithmeticOverflow)?;
        if updated == 0 {
            self.0.remove(asset_class);
        } else {
            self.0.insert(asset_class.clone(), updated);
        }
        Ok(())
    }

    /// Add every quantity of `other`
    pub fn merge(&mut self, other: &Value) -> Result<()> {
        for (asset_class, quantity) in other.iter() {
            self.add_quantity(asset_class, quantity)?;
        }
        Ok(())
    }

    /// Subtract every quantity of `other`
    pub fn subtract(&mut self, other: &Value) -> Result<()> {
        for (asset_class, quantity) in other.iter() {
            let negated = quantity.checked_neg().ok_or(Error::ArithmeticOverflow)?;
            self.add_quantity(asset_class, negated)?;
        }
        Ok(())
    }

    /// Copy without the base currency component
    pub fn without_lovelace(&self) -> Value {
        Self(
            self.0
                .iter()
                .filter(|(asset_class, _)| !asset_class.is_lovelace())
                .map(|(asset_class, quantity)| (asset_class.clone(), *quantity))
                .collect(),
        )
    }

    /// Whether no asset class has a non-zero quantity
    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    /// Non-zero entries in asset class order
    pub fn iter(&self) -> impl Iterator<Item = (&AssetClass, i128)> + '_ {
        self.0.iter().map(|(asset_class, quantity)| (asset_class, *quantity))
    }
}

impl TryFrom<Vec<(AssetClass, i128)>> for Value {
    type Error = Error;

    fn try_from(entries: Vec<(AssetClass, i128)>) -> Result<Self> {
        let mut value = Value::new();
        for (asset_class, quantity) in &entries {
            value.add_quantity(asset_class, *quantity)?;
        }
        Ok(value)
    }
}

impl From<Value> for Vec<(AssetClass, i128)> {
    fn from(value: Value) -> Self {
        value.0.into_iter().collect()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (asset_class, quantity)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", asset_class, quantity)?;
        }
        write!(f, "}}")
    }
}

/// Rational price of one unit, in base currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Numerator
    pub numerator: i64,
    /// Denominator (must be positive)
    pub denominator: i64,
}

impl Price {
    /// Create new price
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Exact value of `count` units
    pub fn value_of(&self, count: i64) -> Result<Ratio<i128>> {
        if self.denominator <= 0 {
            return Err(Error::InvalidPrice {
                numerator: self.numerator,
                denominator: self.denominator,
            });
        }
        let numerator = i128::from(count) * i128::from(self.numerator);
        Ok(Ratio::new(numerator, i128::from(self.denominator)))
    }
}

/// One tracked asset within an asset group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Identity of the record
    pub asset_class: AssetClass,
    /// Quantity held by the fund
    pub count: i64,
    /// Unit price
    pub price: Price,
    /// When `price` was observed
    pub price_timestamp: i64,
}

impl AssetRecord {
    /// Create new record
    pub fn new(asset_class: AssetClass, count: i64, price: Price, price_timestamp: i64) -> Self {
        Self {
            asset_class,
            count,
            price,
            price_timestamp,
        }
    }

    /// Exact value of the held quantity
    pub fn value(&self) -> Result<Ratio<i128>> {
        self.price.value_of(self.count)
    }

    /// First field other than `count` that differs from `other`
    pub fn changed_identity_field(&self, other: &AssetRecord) -> Option<&'static str> {
        if self.asset_class != other.asset_class {
            Some("asset_class")
        } else if self.price != other.price {
            Some("price")
        } else if self.price_timestamp != other.price_timestamp {
            Some("price_timestamp")
        } else {
            None
        }
    }
}

/// Fixed-capacity shard of the fund's assets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetGroup {
    /// Dense shard id
    pub id: u64,
    /// Records, at most `MAX_GROUP_SIZE`
    pub assets: Vec<AssetRecord>,
}

impl AssetGroup {
    /// Empty group
    pub fn new(id: u64) -> Self {
        Self {
            id,
            assets: Vec::new(),
        }
    }

    /// Group holding `assets`
    pub fn with_assets(id: u64, assets: Vec<AssetRecord>) -> Self {
        Self { id, assets }
    }

    /// First record of `asset_class`
    pub fn find_asset(&self, asset_class: &AssetClass) -> Option<&AssetRecord> {
        self.assets.iter().find(|a| &a.asset_class == asset_class)
    }

    /// Whether the group holds `asset_class`
    pub fn has_asset(&self, asset_class: &AssetClass) -> bool {
        self.find_asset(asset_class).is_some()
    }

    /// No records
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Within capacity
    pub fn is_not_overfull(&self) -> bool {
        self.assets.len() <= MAX_GROUP_SIZE
    }

    /// Fail with [`Error::Overfull`] beyond capacity
    pub fn ensure_not_overfull(&self) -> Result<()> {
        if self.is_not_overfull() {
            Ok(())
        } else {
            Err(Error::Overfull {
                id: self.id,
                len: self.assets.len(),
                capacity: MAX_GROUP_SIZE,
            })
        }
    }

    /// Fail with [`Error::NotEmpty`] unless empty
    pub fn ensure_empty(&self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::NotEmpty {
                id: self.id,
                len: self.assets.len(),
            })
        }
    }
}

/// Purpose and partial accumulator of a reduction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReductionMode {
    /// Sum of all asset values and the oldest price among them
    TotalAssetValue {
        /// Running total
        total: Ratio<i128>,
        /// Oldest price timestamp seen so far
        oldest_timestamp: i64,
    },
    /// Search that stops at the first group holding the class
    Exists {
        /// Class searched for
        asset_class: AssetClass,
        /// Whether a holder was found
        found: bool,
    },
    /// Proof that no group holds the class
    DoesNotExist {
        /// Class searched for
        asset_class: AssetClass,
    },
}

/// Variant of a [`ReductionMode`] without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionKind {
    /// [`ReductionMode::TotalAssetValue`]
    TotalAssetValue,
    /// [`ReductionMode::Exists`]
    Exists,
    /// [`ReductionMode::DoesNotExist`]
    DoesNotExist,
}

impl fmt::Display for ReductionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReductionKind::TotalAssetValue => "TotalAssetValue",
            ReductionKind::Exists => "Exists",
            ReductionKind::DoesNotExist => "DoesNotExist",
        };
        write!(f, "{}", name)
    }
}

impl ReductionMode {
    /// Variant of this mode
    pub fn kind(&self) -> ReductionKind {
        match self {
            ReductionMode::TotalAssetValue { .. } => ReductionKind::TotalAssetValue,
            ReductionMode::Exists { .. } => ReductionKind::Exists,
            ReductionMode::DoesNotExist { .. } => ReductionKind::DoesNotExist,
        }
    }

    /// Accumulator before any group is visited
    pub fn seed(&self) -> ReductionMode {
        match self {
            ReductionMode::TotalAssetValue { .. } => ReductionMode::TotalAssetValue {
                total: Ratio::from_integer(0),
                oldest_timestamp: i64::MAX,
            },
            ReductionMode::Exists { asset_class, .. } => ReductionMode::Exists {
                asset_class: asset_class.clone(),
                found: false,
            },
            ReductionMode::DoesNotExist { asset_class } => ReductionMode::DoesNotExist {
                asset_class: asset_class.clone(),
            },
        }
    }

    /// Total value rounded into a [`Decimal`], for reporting
    pub fn total_as_decimal(&self) -> Option<Decimal> {
        match self {
            ReductionMode::TotalAssetValue { total, .. } => {
                let numer = Decimal::try_from_i128_with_scale(*total.numer(), 0).ok()?;
                let denom = Decimal::try_from_i128_with_scale(*total.denom(), 0).ok()?;
                numer.checked_div(denom)
            }
            _ => None,
        }
    }
}

/// In-flight reduction: progress, epoch and partial accumulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reduction {
    /// Id of the next group to visit
    pub group_iter: u64,
    /// Global tick the reduction is pinned to
    pub start_tick: u64,
    /// Purpose and accumulator
    pub mode: ReductionMode,
}

/// Reduction progress of the portfolio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReductionState {
    /// No reduction running
    Idle,
    /// Reduction in flight
    Reducing(Reduction),
}

impl ReductionState {
    /// Short label for logs and errors
    pub fn label(&self) -> String {
        match self {
            ReductionState::Idle => "Idle".to_string(),
            ReductionState::Reducing(r) => format!("Reducing({})", r.mode.kind()),
        }
    }
}

/// Singleton directory tracking group count and reduction progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Number of asset groups; ids are `0..n_groups`
    pub n_groups: u64,
    /// Reduction progress
    pub state: ReductionState,
}

impl Portfolio {
    /// Fresh directory
    pub fn new() -> Self {
        Self {
            n_groups: 0,
            state: ReductionState::Idle,
        }
    }

    /// Whether no reduction is running
    pub fn is_idle(&self) -> bool {
        matches!(self.state, ReductionState::Idle)
    }

    /// Aggregate of a reduction that visited every group at `tick`
    pub fn completed_reduction(&self, tick: u64) -> Option<&ReductionMode> {
        match &self.state {
            ReductionState::Reducing(r)
                if r.start_tick == tick && r.group_iter == self.n_groups =>
            {
                Some(&r.mode)
            }
            ReductionState::Reducing(Reduction {
                start_tick,
                mode: mode @ ReductionMode::Exists { found: true, .. },
                ..
            }) if *start_tick == tick => Some(mode),
            _ => None,
        }
    }
}

impl Default for Portfolio {
    fn default() -> Self {
        Self::new()
    }
}

/// Supply record exposing the global tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supply {
    /// Global fund tick
    pub tick: u64,
}

/// Payload attached to a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    /// No payload
    None,
    /// Fixed payload every vault record carries
    VaultSentinel,
    /// Asset group
    AssetGroup(AssetGroup),
    /// Portfolio directory
    Portfolio(Portfolio),
    /// Supply record
    Supply(Supply),
    /// Fund configuration, opaque here
    Config(serde_json::Value),
    /// Anything else
    Opaque(Vec<u8>),
}

impl Datum {
    /// Short label for errors
    pub fn label(&self) -> &'static str {
        match self {
            Datum::None => "None",
            Datum::VaultSentinel => "VaultSentinel",
            Datum::AssetGroup(_) => "AssetGroup",
            Datum::Portfolio(_) => "Portfolio",
            Datum::Supply(_) => "Supply",
            Datum::Config(_) => "Config",
            Datum::Opaque(_) => "Opaque",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(count: i64) -> AssetRecord {
        AssetRecord::new(AssetClass::new("policy", "token"), count, Price::new(100, 1), 123)
    }

    #[test]
    fn test_value_drops_zero_entries() {
        let token = AssetClass::new("policy", "token");
        let mut value = Value::singleton(token.clone(), 10);
        value.add_quantity(&token, -10).unwrap();
        assert!(value.is_zero());
        assert_eq!(value, Value::new());
    }

    #[test]
    fn test_value_subtract_goes_negative() {
        let mut value = Value::lovelace(1_000);
        value.subtract(&Value::lovelace(4_000)).unwrap();
        assert_eq!(value.lovelace_of(), -3_000);
    }

    #[test]
    fn test_value_overflow() {
        let mut value = Value::lovelace(i128::MAX);
        assert!(matches!(
            value.add_quantity(&AssetClass::lovelace(), 1),
            Err(Error::ArithmeticOverflow)
        ));
    }

    #[test]
    fn test_without_lovelace() {
        let token = AssetClass::new("policy", "token");
        let value = Value::try_from(vec![
            (AssetClass::lovelace(), 5),
            (token.clone(), 7),
        ])
        .unwrap();
        assert_eq!(value.without_lovelace(), Value::singleton(token, 7));
    }

    #[test]
    fn test_value_serde_round_trip() {
        let value = Value::try_from(vec![
            (AssetClass::lovelace(), 5),
            (AssetClass::new("policy", "token"), -7),
        ])
        .unwrap();
        let json = serde_json::to_string(&value).unwrap();
        let decoded: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_price_rejects_zero_denominator() {
        assert!(matches!(
            Price::new(1, 0).value_of(10),
            Err(Error::InvalidPrice { .. })
        ));
    }

    #[test]
    fn test_price_is_exact() {
        let value = Price::new(1, 3).value_of(2).unwrap();
        assert_eq!(value, Ratio::new(2, 3));
    }

    #[test]
    fn test_is_not_overfull_capacity() {
        let mut group = AssetGroup::new(0);
        for n in 0..=MAX_GROUP_SIZE {
            assert!(group.is_not_overfull(), "{} records", n);
            group.assets.push(record(1));
        }
        assert_eq!(group.assets.len(), 4);
        assert!(!group.is_not_overfull());
        assert!(matches!(group.ensure_not_overfull(), Err(Error::Overfull { len: 4, .. })));
    }

    #[test]
    fn test_changed_identity_field() {
        let before = record(10);
        let mut after = record(20);
        assert_eq!(before.changed_identity_field(&after), None);
        after.price_timestamp = 124;
        assert_eq!(before.changed_identity_field(&after), Some("price_timestamp"));
        after.price = Price::new(101, 1);
        assert_eq!(before.changed_identity_field(&after), Some("price"));
    }

    #[test]
    fn test_total_as_decimal() {
        let mode = ReductionMode::TotalAssetValue {
            total: Ratio::new(5, 2),
            oldest_timestamp: 1,
        };
        assert_eq!(mode.total_as_decimal(), Some(Decimal::new(25, 1)));
    }

    #[test]
    fn test_completed_reduction_requires_full_progress() {
        let mut portfolio = Portfolio {
            n_groups: 3,
            state: ReductionState::Reducing(Reduction {
                group_iter: 2,
                start_tick: 7,
                mode: ReductionMode::TotalAssetValue {
                    total: Ratio::from_integer(10),
                    oldest_timestamp: 1,
                },
            }),
        };
        assert!(portfolio.completed_reduction(7).is_none());

        if let ReductionState::Reducing(r) = &mut portfolio.state {
            r.group_iter = 3;
        }
        assert!(portfolio.completed_reduction(7).is_some());
        assert!(portfolio.completed_reduction(8).is_none());
    }
}
