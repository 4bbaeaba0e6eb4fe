//! Asset group lookups over a transaction
//!
//! Every lookup that accepts a record as an asset group goes through
//! [`shard_of`], so the address/marker/datum checks live in one place.

use crate::{
    config::ProtocolConfig,
    tx::{Transaction, TxOut},
    types::{AssetClass, AssetGroup, AssetRecord, Datum},
    Error, Result,
};

/// The single record among `records` carrying `marker`
///
/// Zero carriers is [`Error::NoMatch`], several is [`Error::NotASingleton`],
/// and the carrier must hold exactly one marker.
pub fn find_unique_marked<'a, I>(records: I, marker: &AssetClass) -> Result<&'a TxOut>
where
    I: IntoIterator<Item = &'a TxOut>,
{
    let mut found: Option<&'a TxOut> = None;
    let mut count = 0usize;
    for record in records {
        if record.marker_count(marker) != 0 {
            count += 1;
            found.get_or_insert(record);
        }
    }

    match found {
        None => Err(Error::NoMatch(format!("no record carries {}", marker))),
        Some(_) if count > 1 => Err(Error::NotASingleton {
            what: marker.to_string(),
            count,
        }),
        Some(record) => {
            ensure_single_marker(record, marker)?;
            Ok(record)
        }
    }
}

fn ensure_single_marker(record: &TxOut, marker: &AssetClass) -> Result<()> {
    let found = record.marker_count(marker);
    if found == 1 {
        Ok(())
    } else {
        Err(Error::MarkerCount {
            marker: marker.to_string(),
            found,
        })
    }
}

/// Accept `record` as an asset group
///
/// It must sit at the canonical address, carry exactly one marker and hold an
/// asset group datum.
pub fn shard_of<'a>(record: &'a TxOut, params: &ProtocolConfig) -> Result<&'a AssetGroup> {
    if record.address != params.asset_group_address {
        return Err(Error::WrongAddress {
            expected: params.asset_group_address.to_string(),
            found: record.address.to_string(),
        });
    }
    ensure_single_marker(record, &params.asset_group_marker)?;
    match &record.datum {
        Datum::AssetGroup(group) => Ok(group),
        other => Err(Error::WrongDatum(format!(
            "expected AssetGroup, found {}",
            other.label()
        ))),
    }
}

/// Whether a scan over asset groups has to inspect `record`
pub(crate) fn in_scope(record: &TxOut, params: &ProtocolConfig) -> bool {
    record.address == params.asset_group_address
        || record.marker_count(&params.asset_group_marker) != 0
}

/// First in-scope group satisfying `pred`, after validating every in-scope record
fn scan<'a, I, P>(
    records: I,
    params: &ProtocolConfig,
    mut pred: P,
) -> Result<Option<&'a AssetGroup>>
where
    I: IntoIterator<Item = &'a TxOut>,
    P: FnMut(&AssetGroup) -> bool,
{
    let mut hit = None;
    for record in records.into_iter().filter(|r| in_scope(r, params)) {
        let group = shard_of(record, params)?;
        if hit.is_none() && pred(group) {
            hit = Some(group);
        }
    }
    Ok(hit)
}

/// The asset group consumed by this transaction, with its id
pub fn find_current<'a>(
    tx: &'a Transaction,
    params: &ProtocolConfig,
) -> Result<(u64, &'a AssetGroup)> {
    let record = tx
        .consumed()
        .find(|r| r.marker_count(&params.asset_group_marker) != 0)
        .ok_or_else(|| Error::NoMatch("no asset group is consumed".to_string()))?;
    let group = shard_of(record, params)?;
    Ok((group.id, group))
}

/// Consumed asset group with `id`
pub fn find_input<'a>(
    tx: &'a Transaction,
    params: &ProtocolConfig,
    id: u64,
) -> Result<&'a AssetGroup> {
    scan(tx.consumed(), params, |g| g.id == id)?
        .ok_or_else(|| Error::NoMatch(format!("no consumed asset group {}", id)))
}

/// Produced asset group with `id`
pub fn find_output<'a>(
    tx: &'a Transaction,
    params: &ProtocolConfig,
    id: u64,
) -> Result<&'a AssetGroup> {
    scan(tx.outputs.iter(), params, |g| g.id == id)?
        .ok_or_else(|| Error::NoMatch(format!("no produced asset group {}", id)))
}

/// Consumed asset group holding `asset_class`, with the record
pub fn find_input_asset<'a>(
    tx: &'a Transaction,
    params: &ProtocolConfig,
    asset_class: &AssetClass,
) -> Result<(&'a AssetGroup, &'a AssetRecord)> {
    let group = scan(tx.consumed(), params, |g| g.has_asset(asset_class))?
        .ok_or_else(|| Error::NoMatch(format!("no consumed asset group holds {}", asset_class)))?;
    with_record(group, asset_class)
}

/// Produced asset group holding `asset_class`, with the record
pub fn find_output_asset<'a>(
    tx: &'a Transaction,
    params: &ProtocolConfig,
    asset_class: &AssetClass,
) -> Result<(&'a AssetGroup, &'a AssetRecord)> {
    let group = scan(tx.outputs.iter(), params, |g| g.has_asset(asset_class))?
        .ok_or_else(|| Error::NoMatch(format!("no produced asset group holds {}", asset_class)))?;
    with_record(group, asset_class)
}

fn with_record<'a>(
    group: &'a AssetGroup,
    asset_class: &AssetClass,
) -> Result<(&'a AssetGroup, &'a AssetRecord)> {
    group
        .find_asset(asset_class)
        .map(|record| (group, record))
        .ok_or_else(|| Error::NoMatch(format!("{} vanished from group {}", asset_class, group.id)))
}

/// The only asset group consumed at the canonical address
pub fn find_single_input<'a>(
    tx: &'a Transaction,
    params: &ProtocolConfig,
) -> Result<&'a AssetGroup> {
    let at_address = tx
        .consumed()
        .filter(|r| r.address == params.asset_group_address);
    let record = find_unique_marked(at_address, &params.asset_group_marker)?;
    shard_of(record, params)
}

/// No record at the asset group address is consumed
pub fn nothing_spent(tx: &Transaction, params: &ProtocolConfig) -> bool {
    !tx
        .consumed()
        .any(|r| r.address == params.asset_group_address)
}

/// Fail with [`Error::ShardSpent`] unless [`nothing_spent`]
pub fn ensure_nothing_spent(tx: &Transaction, params: &ProtocolConfig) -> Result<()> {
    if nothing_spent(tx, params) {
        Ok(())
    } else {
        Err(Error::ShardSpent)
    }
}

/// Fail unless `record` carries only its marker and base currency
pub fn ensure_no_extraneous_tokens(
    record: &TxOut,
    group: &AssetGroup,
    params: &ProtocolConfig,
) -> Result<()> {
    let extraneous = record
        .value
        .without_lovelace()
        .iter()
        .any(|(asset_class, _)| asset_class != &params.asset_group_marker);
    if extraneous {
        Err(Error::ExtraneousTokens { id: group.id })
    } else {
        Ok(())
    }
}
