//! Pointer-chase traversal over asset groups
//!
//! A caller names the groups to visit with pointers into a [`PointerTable`].
//! Pointer `k` must resolve to the group with id `first_id + k`, so the ids
//! visited are contiguous and increasing. Reversed, duplicated or gapped
//! pointer lists all fail the id check.

use crate::{
    asset_group::shard_of,
    config::ProtocolConfig,
    tx::PointerTable,
    types::{AssetClass, AssetGroup},
    Error, Result,
};
use num_rational::Ratio;
use num_traits::CheckedAdd;

/// Fold `f` over the groups named by `group_ptrs`
///
/// Every pointer is resolved and checked before its group is folded; the
/// first failure aborts the whole traversal.
pub fn traverse<'tx, A, F>(
    table: &PointerTable<'tx>,
    params: &ProtocolConfig,
    group_ptrs: &[usize],
    first_id: u64,
    init: A,
    mut f: F,
) -> Result<A>
where
    F: FnMut(A, usize, &'tx AssetGroup) -> Result<A>,
{
    let mut acc = init;
    for (position, &pointer) in group_ptrs.iter().enumerate() {
        let record = table.resolve(pointer)?;
        let group = shard_of(record, params)?;
        let expected = first_id
            .checked_add(position as u64)
            .ok_or(Error::ArithmeticOverflow)?;
        if group.id != expected {
            return Err(Error::WrongId {
                expected,
                found: group.id,
            });
        }
        acc = f(acc, position, group)?;
    }
    Ok(acc)
}

/// Position of the first visited group holding `asset_class`
///
/// Pointers after the hit are still validated.
pub fn find_first_holder(
    table: &PointerTable<'_>,
    params: &ProtocolConfig,
    asset_class: &AssetClass,
    group_ptrs: &[usize],
    first_id: u64,
) -> Result<Option<usize>> {
    traverse(table, params, group_ptrs, first_id, None, |hit, position, group| {
        Ok(hit.or_else(|| group.has_asset(asset_class).then_some(position)))
    })
}

/// Whether any visited group holds `asset_class`
pub fn search_for_asset_class(
    table: &PointerTable<'_>,
    params: &ProtocolConfig,
    asset_class: &AssetClass,
    group_ptrs: &[usize],
    first_id: u64,
) -> Result<bool> {
    Ok(find_first_holder(table, params, asset_class, group_ptrs, first_id)?.is_some())
}

/// Aggregate over the visited groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSummary {
    /// Oldest price timestamp among the visited records
    pub oldest_timestamp: i64,
    /// Exact sum of `count * price`
    pub total: Ratio<i128>,
}

/// Sum of every visited record's value, with the oldest price timestamp
///
/// Fails with [`Error::NoPriceData`] when the visited groups hold no records.
pub fn sum_total_asset_value(
    table: &PointerTable<'_>,
    params: &ProtocolConfig,
    group_ptrs: &[usize],
    first_id: u64,
) -> Result<ValueSummary> {
    let summary = traverse(
        table,
        params,
        group_ptrs,
        first_id,
        None::<ValueSummary>,
        |acc, _, group| {
            group
                .assets
                .iter()
                .try_fold(acc, |acc, record| -> Result<Option<ValueSummary>> {
                    let value = record.value()?;
                    Ok(Some(match acc {
                        None => ValueSummary {
                            oldest_timestamp: record.price_timestamp,
                            total: value,
                        },
                        Some(s) => ValueSummary {
                            oldest_timestamp: s.oldest_timestamp.min(record.price_timestamp),
                            total: s
                                .total
                                .checked_add(&value)
                                .ok_or(Error::ArithmeticOverflow)?,
                        },
                    }))
                })
        },
    )?;

    let summary = summary.ok_or(Error::NoPriceData)?;
    tracing::debug!(
        groups = group_ptrs.len(),
        first_id,
        total = %summary.total,
        oldest = summary.oldest_timestamp,
        "summed asset group values"
    );
    Ok(summary)
}
