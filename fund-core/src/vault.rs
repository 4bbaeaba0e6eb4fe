//! Vault reconciliation
//!
//! A transaction that moves value in or out of the fund declares its change
//! up front: a base currency delta (`d_lovelace`) and, through the asset
//! groups it rewrites, a per-asset delta. This module checks those counters
//! against what the vault actually gained or lost.
//!
//! Asset groups are matched up as threads: each pointed output group is
//! paired with the consumed group of the same id, and records are paired by
//! position. Only `count` may differ between paired records.

use crate::{
    asset_group::{
        ensure_no_extraneous_tokens, find_input, find_unique_marked, in_scope, shard_of,
    },
    config::ProtocolConfig,
    tx::{PointerTable, Transaction, TxOut},
    types::{AssetGroup, Datum, Value},
    Error, Result,
};
use std::collections::BTreeSet;

/// Net value the vault gained in this transaction
///
/// Produced vault records must carry the sentinel datum.
pub fn diff(tx: &Transaction, params: &ProtocolConfig) -> Result<Value> {
    let mut delta = Value::new();
    for record in tx.outputs.iter().filter(|r| r.address == params.vault_address) {
        if record.datum != Datum::VaultSentinel {
            return Err(Error::WrongDatum(format!(
                "vault output carries {}",
                record.datum.label()
            )));
        }
        delta.merge(&record.value)?;
    }
    for record in tx.consumed().filter(|r| r.address == params.vault_address) {
        delta.subtract(&record.value)?;
    }
    tracing::debug!(delta = %delta, "vault diff");
    Ok(delta)
}

fn ensure_lovelace_preconditions(tx: &Transaction, params: &ProtocolConfig) -> Result<()> {
    find_unique_marked(tx.visible(), &params.config_marker)?;
    if !tx.validity_range.is_bounded() {
        return Err(Error::MissingValidityRange);
    }
    Ok(())
}

/// Base currency the vault gained
///
/// Requires the fund configuration record to be visible and a bounded
/// validity window.
pub fn diff_lovelace(tx: &Transaction, params: &ProtocolConfig) -> Result<i128> {
    ensure_lovelace_preconditions(tx, params)?;
    Ok(diff(tx, params)?.lovelace_of())
}

fn thread_delta(before: &AssetGroup, after: &AssetGroup, counted: &mut Value) -> Result<()> {
    if before.assets.len() != after.assets.len() {
        return Err(Error::AssetSetChanged {
            id: after.id,
            before: before.assets.len(),
            after: after.assets.len(),
        });
    }
    for (position, (old, new)) in before.assets.iter().zip(&after.assets).enumerate() {
        if let Some(field) = old.changed_identity_field(new) {
            return Err(Error::IdentityFieldChanged {
                id: after.id,
                position,
                field,
            });
        }
        if new.count < 0 {
            return Err(Error::NegativeCount {
                id: after.id,
                position,
            });
        }
        let delta = i128::from(new.count) - i128::from(old.count);
        counted.add_quantity(&new.asset_class, delta)?;
    }
    Ok(())
}

/// Asset groups outside every thread cannot hold anything
fn ensure_unthreaded_empty<'a, I>(
    records: I,
    side: &str,
    params: &ProtocolConfig,
    threaded: &BTreeSet<u64>,
) -> Result<()>
where
    I: IntoIterator<Item = &'a TxOut>,
{
    for record in records.into_iter().filter(|r| in_scope(r, params)) {
        let group = shard_of(record, params)?;
        if !threaded.contains(&group.id) && !group.is_empty() {
            return Err(Error::CounterMismatch(format!(
                "{} asset group {} is not threaded",
                side, group.id
            )));
        }
    }
    Ok(())
}

/// Value the declared counters account for
///
/// `d_lovelace` as base currency plus, for every asset group thread named by
/// `asset_group_output_ptrs`, the change in each record's count.
pub fn diff_counted(
    tx: &Transaction,
    params: &ProtocolConfig,
    d_lovelace: i128,
    asset_group_output_ptrs: &[usize],
) -> Result<Value> {
    let outputs = PointerTable::outputs(tx);
    let mut counted = Value::lovelace(d_lovelace);
    let mut threaded = BTreeSet::new();
    let mut previous: Option<usize> = None;

    for &pointer in asset_group_output_ptrs {
        if let Some(previous) = previous {
            if pointer <= previous {
                return Err(Error::OutOfOrderPointer {
                    previous,
                    current: pointer,
                });
            }
        }
        previous = Some(pointer);

        let record = outputs.resolve(pointer)?;
        let after = shard_of(record, params)?;
        ensure_no_extraneous_tokens(record, after, params)?;
        after.ensure_not_overfull()?;

        if !threaded.insert(after.id) {
            return Err(Error::CounterMismatch(format!(
                "asset group {} threaded twice",
                after.id
            )));
        }
        let before = find_input(tx, params, after.id)?;
        thread_delta(before, after, &mut counted)?;
    }

    ensure_unthreaded_empty(tx.consumed(), "consumed", params, &threaded)?;
    ensure_unthreaded_empty(tx.outputs.iter(), "produced", params, &threaded)?;

    tracing::debug!(counted = %counted, threads = threaded.len(), "counted diff");
    Ok(counted)
}

/// Fail unless the declared counters reconcile with the vault
///
/// The base currency the vault gained must equal `d_lovelace`, and every other
/// asset class must have moved exactly as the asset group threads say.
pub fn check_counters(
    tx: &Transaction,
    params: &ProtocolConfig,
    d_lovelace: i128,
    asset_group_output_ptrs: &[usize],
) -> Result<()> {
    ensure_lovelace_preconditions(tx, params)?;
    let actual = diff(tx, params)?;
    if actual.lovelace_of() != d_lovelace {
        return Err(Error::CounterMismatch(format!(
            "vault lovelace moved by {}, declared {}",
            actual.lovelace_of(),
            d_lovelace
        )));
    }

    let counted = diff_counted(tx, params, d_lovelace, asset_group_output_ptrs)?;
    let (actual, counted) = (actual.without_lovelace(), counted.without_lovelace());
    if actual != counted {
        return Err(Error::CounterMismatch(format!(
            "vault moved {}, asset groups account for {}",
            actual, counted
        )));
    }
    Ok(())
}

/// Whether the declared counters reconcile with the vault
pub fn counters_are_consistent(
    tx: &Transaction,
    params: &ProtocolConfig,
    d_lovelace: i128,
    asset_group_output_ptrs: &[usize],
) -> bool {
    match check_counters(tx, params, d_lovelace, asset_group_output_ptrs) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "counters rejected");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::types::{AssetClass, AssetRecord};

    fn lovelace_tx(inputs: &[i128], outputs: &[i128]) -> Transaction {
        let params = params();
        let builder = inputs
            .iter()
            .fold(TxBuilder::new(), |b, v| b.input(vault_out(&params, Value::lovelace(*v))));
        outputs
            .iter()
            .fold(builder, |b, v| b.output(vault_out(&params, Value::lovelace(*v))))
            .reference(config_out(&params))
            .valid_between(0, 1_000)
            .build()
    }

    #[test]
    fn test_diff_conservation() {
        let tx = lovelace_tx(&[1_000_000, 2_000_000, 10_000_000], &[15_000_000, 2_000_000]);
        assert_eq!(diff(&tx, &params()).unwrap(), Value::lovelace(4_000_000));
        assert_eq!(diff_lovelace(&tx, &params()).unwrap(), 4_000_000);
    }

    #[test]
    fn test_diff_net_outflow() {
        let tx = lovelace_tx(&[5_000_000], &[1_000_000]);
        assert_eq!(diff(&tx, &params()).unwrap().lovelace_of(), -4_000_000);
    }

    #[test]
    fn test_diff_ignores_other_addresses() {
        let params = params();
        let tx = TxBuilder::new()
            .input(plain_out("wallet", 9_000_000))
            .output(vault_out(&params, Value::lovelace(3_000_000)))
            .build();
        assert_eq!(diff(&tx, &params).unwrap(), Value::lovelace(3_000_000));
    }

    #[test]
    fn test_diff_rejects_wrong_datum() {
        let params = params();
        let mut output = vault_out(&params, Value::lovelace(1));
        output.datum = Datum::None;
        let tx = TxBuilder::new().output(output).build();
        assert!(matches!(diff(&tx, &params), Err(Error::WrongDatum(_))));
    }

    #[test]
    fn test_diff_lovelace_preconditions() {
        let params = params();
        let no_config = TxBuilder::new().valid_between(0, 1).build();
        assert!(matches!(diff_lovelace(&no_config, &params), Err(Error::NoMatch(_))));

        let unbounded = TxBuilder::new().reference(config_out(&params)).build();
        assert!(matches!(
            diff_lovelace(&unbounded, &params),
            Err(Error::MissingValidityRange)
        ));

        let consumed_config = TxBuilder::new()
            .input(config_out(&params))
            .valid_between(0, 1)
            .build();
        assert_eq!(diff_lovelace(&consumed_config, &params).unwrap(), 0);
    }

    /// Rewrite group 0 from `before` to `after` while the vault moves from
    /// `vault_in` to `vault_out_value`
    fn deposit_tx(
        before: Vec<AssetRecord>,
        after: Vec<AssetRecord>,
        vault_in: Value,
        vault_out_value: Value,
    ) -> Transaction {
        let params = params();
        TxBuilder::new()
            .input(group_out(&params, group(0, before)))
            .input(vault_out(&params, vault_in))
            .output(group_out(&params, group(0, after)))
            .output(vault_out(&params, vault_out_value))
            .reference(config_out(&params))
            .valid_between(0, 1_000)
            .build()
    }

    fn holding(entries: Vec<(AssetClass, i128)>) -> Value {
        Value::try_from(entries).unwrap()
    }

    #[test]
    fn test_diff_counted() {
        let tx = deposit_tx(
            vec![asset("a", 10), asset("b", 5)],
            vec![asset("a", 15), asset("b", 2)],
            Value::new(),
            Value::new(),
        );
        let counted = diff_counted(&tx, &params(), 100, &[0]).unwrap();
        assert_eq!(
            counted,
            holding(vec![
                (AssetClass::lovelace(), 100),
                (token("a"), 5),
                (token("b"), -3),
            ])
        );
    }

    #[test]
    fn test_diff_counted_rejects_price_change() {
        let mut repriced = asset("a", 10);
        repriced.price.numerator = 101;
        let tx = deposit_tx(vec![asset("a", 10)], vec![repriced], Value::new(), Value::new());
        assert!(matches!(
            diff_counted(&tx, &params(), 0, &[0]),
            Err(Error::IdentityFieldChanged { field: "price", .. })
        ));
    }

    #[test]
    fn test_diff_counted_rejects_reordered_output() {
        let tx = deposit_tx(
            vec![asset("a", 10), asset("b", 5)],
            vec![asset("b", 5), asset("a", 10)],
            Value::new(),
            Value::new(),
        );
        assert!(matches!(
            diff_counted(&tx, &params(), 0, &[0]),
            Err(Error::IdentityFieldChanged { field: "asset_class", position: 0, .. })
        ));
    }

    #[test]
    fn test_diff_counted_rejects_new_asset_class() {
        let tx = deposit_tx(
            vec![asset("a", 10)],
            vec![asset("a", 10), asset("b", 1)],
            Value::new(),
            Value::new(),
        );
        assert!(matches!(
            diff_counted(&tx, &params(), 0, &[0]),
            Err(Error::AssetSetChanged { before: 1, after: 2, .. })
        ));
    }

    #[test]
    fn test_diff_counted_rejects_negative_count() {
        let tx = deposit_tx(vec![asset("a", 1)], vec![asset("a", -1)], Value::new(), Value::new());
        assert!(matches!(
            diff_counted(&tx, &params(), 0, &[0]),
            Err(Error::NegativeCount { id: 0, position: 0 })
        ));
    }

    #[test]
    fn test_diff_counted_rejects_unthreaded_group() {
        let tx = deposit_tx(vec![asset("a", 1)], vec![asset("a", 1)], Value::new(), Value::new());
        assert!(matches!(
            diff_counted(&tx, &params(), 0, &[]),
            Err(Error::CounterMismatch(_))
        ));
    }

    #[test]
    fn test_diff_counted_rejects_repeated_pointer() {
        let tx = deposit_tx(vec![asset("a", 1)], vec![asset("a", 1)], Value::new(), Value::new());
        assert!(matches!(
            diff_counted(&tx, &params(), 0, &[0, 0]),
            Err(Error::OutOfOrderPointer { previous: 0, current: 0 })
        ));
    }

    #[test]
    fn test_counters_consistent_deposit() {
        let tx = deposit_tx(
            vec![asset("a", 10)],
            vec![asset("a", 15)],
            holding(vec![(AssetClass::lovelace(), 1_000_000), (token("a"), 10)]),
            holding(vec![(AssetClass::lovelace(), 3_000_000), (token("a"), 15)]),
        );
        assert!(counters_are_consistent(&tx, &params(), 2_000_000, &[0]));
        assert!(!counters_are_consistent(&tx, &params(), 1_999_999, &[0]));
    }

    #[test]
    fn test_counters_reject_unexplained_token() {
        let tx = deposit_tx(
            vec![asset("a", 10)],
            vec![asset("a", 15)],
            holding(vec![(token("a"), 10)]),
            holding(vec![(token("a"), 15), (token("stray"), 1)]),
        );
        assert!(matches!(
            check_counters(&tx, &params(), 0, &[0]),
            Err(Error::CounterMismatch(_))
        ));
    }

    #[test]
    fn test_counters_tolerate_consistently_reversed_records() {
        let tx = deposit_tx(
            vec![asset("b", 5), asset("a", 10)],
            vec![asset("b", 4), asset("a", 12)],
            holding(vec![(token("a"), 10), (token("b"), 5)]),
            holding(vec![(token("a"), 12), (token("b"), 4)]),
        );
        assert!(counters_are_consistent(&tx, &params(), 0, &[0]));
    }

    #[test]
    fn test_counters_reject_unthreaded_produced_holdings() {
        let params = params();
        let tx = TxBuilder::new()
            .input(group_out(&params, group(0, vec![])))
            .output(group_out(&params, group(0, vec![asset("a", 1_000)])))
            .reference(config_out(&params))
            .valid_between(0, 1_000)
            .build();
        assert!(matches!(
            check_counters(&tx, &params, 0, &[]),
            Err(Error::CounterMismatch(_))
        ));
        assert!(!counters_are_consistent(&tx, &params, 0, &[]));
    }

    #[test]
    fn test_counters_accept_unthreaded_empty_group() {
        let params = params();
        let tx = TxBuilder::new()
            .input(group_out(&params, group(0, vec![])))
            .output(group_out(&params, group(0, vec![])))
            .reference(config_out(&params))
            .valid_between(0, 1_000)
            .build();
        check_counters(&tx, &params, 0, &[]).unwrap();
    }

    #[test]
    fn test_diff_counted_rejects_overfull_output() {
        let four = || vec![asset("a", 1), asset("b", 1), asset("c", 1), asset("d", 1)];
        let tx = deposit_tx(four(), four(), Value::new(), Value::new());
        assert!(matches!(
            diff_counted(&tx, &params(), 0, &[0]),
            Err(Error::Overfull { id: 0, len: 4, .. })
        ));
    }
}
