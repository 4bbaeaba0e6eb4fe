//! Portfolio directory lookups and asset group lifecycle
//!
//! Group ids stay dense: a new group always gets id `n_groups`, and only the
//! group with the highest id may be removed, and only when empty.

use crate::{
    asset_group::{
        ensure_no_extraneous_tokens, ensure_nothing_spent, find_single_input, find_unique_marked,
        in_scope, shard_of,
    },
    config::ProtocolConfig,
    tx::{Transaction, TxOut},
    types::{Datum, Portfolio},
    Error, Result,
};

/// Portfolio directory before and after a transaction
#[derive(Debug, Clone, Copy)]
pub struct PortfolioTransition<'tx> {
    /// Consumed directory
    pub before: &'tx Portfolio,
    /// Produced directory
    pub after: &'tx Portfolio,
}

impl PortfolioTransition<'_> {
    /// Rejection error for this transition
    pub fn rejected(&self, reason: impl Into<String>) -> Error {
        Error::InvalidStateTransition {
            from: self.before.state.label(),
            to: self.after.state.label(),
            reason: reason.into(),
        }
    }

    /// Fail unless the group count is unchanged
    pub fn ensure_same_group_count(&self) -> Result<()> {
        if self.before.n_groups == self.after.n_groups {
            Ok(())
        } else {
            Err(self.rejected(format!(
                "group count changed from {} to {}",
                self.before.n_groups, self.after.n_groups
            )))
        }
    }

    fn ensure_idle_to_idle(&self) -> Result<()> {
        if self.before.is_idle() && self.after.is_idle() {
            Ok(())
        } else {
            Err(self.rejected("asset groups change only while idle"))
        }
    }
}

fn portfolio_of<'a>(record: &'a TxOut, params: &ProtocolConfig) -> Result<&'a Portfolio> {
    if record.address != params.portfolio_address {
        return Err(Error::WrongAddress {
            expected: params.portfolio_address.to_string(),
            found: record.address.to_string(),
        });
    }
    match &record.datum {
        Datum::Portfolio(portfolio) => Ok(portfolio),
        other => Err(Error::WrongDatum(format!(
            "expected Portfolio, found {}",
            other.label()
        ))),
    }
}

/// The consumed and produced portfolio directory
pub fn find_transition<'a>(
    tx: &'a Transaction,
    params: &ProtocolConfig,
) -> Result<PortfolioTransition<'a>> {
    let input = find_unique_marked(tx.consumed(), &params.portfolio_marker)?;
    let output = find_unique_marked(tx.outputs.iter(), &params.portfolio_marker)?;
    Ok(PortfolioTransition {
        before: portfolio_of(input, params)?,
        after: portfolio_of(output, params)?,
    })
}

/// Global tick from the referenced supply record
pub fn current_tick(tx: &Transaction, params: &ProtocolConfig) -> Result<u64> {
    let record = find_unique_marked(tx.referenced(), &params.supply_marker)?;
    match &record.datum {
        Datum::Supply(supply) => Ok(supply.tick),
        other => Err(Error::WrongDatum(format!(
            "expected Supply, found {}",
            other.label()
        ))),
    }
}

fn ensure_minted(tx: &Transaction, params: &ProtocolConfig, expected: i128) -> Result<()> {
    let found = tx.mint.quantity_of(&params.asset_group_marker);
    if found == expected {
        Ok(())
    } else {
        Err(Error::MintMismatch { expected, found })
    }
}

/// Create an empty asset group with id `n_groups`
pub fn validate_add_asset_group(
    tx: &Transaction,
    params: &ProtocolConfig,
    transition: &PortfolioTransition<'_>,
) -> Result<()> {
    transition.ensure_idle_to_idle()?;
    let n_groups = transition.before.n_groups;
    let expected = n_groups.checked_add(1).ok_or(Error::ArithmeticOverflow)?;
    if transition.after.n_groups != expected {
        return Err(transition.rejected(format!(
            "adding a group must yield {} groups, declared {}",
            expected, transition.after.n_groups
        )));
    }
    ensure_minted(tx, params, 1)?;
    ensure_nothing_spent(tx, params)?;

    let record = find_unique_marked(tx.outputs.iter(), &params.asset_group_marker)?;
    let group = shard_of(record, params)?;
    if group.id != n_groups {
        return Err(Error::WrongId {
            expected: n_groups,
            found: group.id,
        });
    }
    group.ensure_empty()?;
    ensure_no_extraneous_tokens(record, group, params)?;

    tracing::debug!(id = group.id, "asset group added");
    Ok(())
}

/// Destroy the empty asset group with the highest id
pub fn validate_remove_asset_group(
    tx: &Transaction,
    params: &ProtocolConfig,
    transition: &PortfolioTransition<'_>,
) -> Result<()> {
    transition.ensure_idle_to_idle()?;
    let n_groups = transition.before.n_groups;
    if n_groups == 0 || transition.after.n_groups + 1 != n_groups {
        return Err(transition.rejected(format!(
            "removing a group from {} groups, declared {}",
            n_groups, transition.after.n_groups
        )));
    }
    ensure_minted(tx, params, -1)?;

    let group = find_single_input(tx, params)?;
    let last = n_groups - 1;
    if group.id != last {
        return Err(Error::WrongId {
            expected: last,
            found: group.id,
        });
    }
    group.ensure_empty()?;

    if tx.outputs.iter().any(|r| in_scope(r, params)) {
        return Err(transition.rejected("removing a group must not produce one"));
    }

    tracing::debug!(id = group.id, "asset group removed");
    Ok(())
}
