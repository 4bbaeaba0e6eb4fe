//! Record builders shared by unit tests

pub use crate::tx::TxBuilder;

use crate::{
    config::ProtocolConfig,
    tx::TxOut,
    types::{Address, AssetClass, AssetGroup, AssetRecord, Datum, Portfolio, Price, Supply, Value},
};

/// Minimum base currency every record carries
pub const MIN_ADA: i128 = 2_000_000;

pub fn params() -> ProtocolConfig {
    ProtocolConfig::default()
}

pub fn token(name: &str) -> AssetClass {
    AssetClass::new("fund_assets", name)
}

/// Record priced at 100/1 as of tick 123
pub fn asset(name: &str, count: i64) -> AssetRecord {
    priced(name, count, 100, 1, 123)
}

pub fn priced(
    name: &str,
    count: i64,
    numerator: i64,
    denominator: i64,
    timestamp: i64,
) -> AssetRecord {
    AssetRecord::new(token(name), count, Price::new(numerator, denominator), timestamp)
}

pub fn group(id: u64, assets: Vec<AssetRecord>) -> AssetGroup {
    AssetGroup::with_assets(id, assets)
}

pub fn group_out(params: &ProtocolConfig, group: AssetGroup) -> TxOut {
    let value = Value::try_from(vec![
        (AssetClass::lovelace(), MIN_ADA),
        (params.asset_group_marker.clone(), 1),
    ])
    .unwrap();
    TxOut::new(params.asset_group_address.clone(), value, Datum::AssetGroup(group))
}

pub fn portfolio_out(params: &ProtocolConfig, portfolio: Portfolio) -> TxOut {
    let value = Value::try_from(vec![
        (AssetClass::lovelace(), MIN_ADA),
        (params.portfolio_marker.clone(), 1),
    ])
    .unwrap();
    TxOut::new(params.portfolio_address.clone(), value, Datum::Portfolio(portfolio))
}

pub fn supply_out(params: &ProtocolConfig, tick: u64) -> TxOut {
    let value = Value::try_from(vec![
        (AssetClass::lovelace(), MIN_ADA),
        (params.supply_marker.clone(), 1),
    ])
    .unwrap();
    TxOut::new(Address::new("script_supply"), value, Datum::Supply(Supply { tick }))
}

pub fn config_out(params: &ProtocolConfig) -> TxOut {
    let value = Value::try_from(vec![
        (AssetClass::lovelace(), MIN_ADA),
        (params.config_marker.clone(), 1),
    ])
    .unwrap();
    TxOut::new(
        Address::new("script_config"),
        value,
        Datum::Config(serde_json::json!({ "max_group_size": 3 })),
    )
}

pub fn vault_out(params: &ProtocolConfig, value: Value) -> TxOut {
    TxOut::new(params.vault_address.clone(), value, Datum::VaultSentinel)
}

pub fn plain_out(address: &str, lovelace: i128) -> TxOut {
    TxOut::new(Address::new(address), Value::lovelace(lovelace), Datum::None)
}
