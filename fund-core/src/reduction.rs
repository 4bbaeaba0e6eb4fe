//! Multi-transaction reductions over every asset group
//!
//! A reduction is a fold that cannot finish in one transaction. Its state
//! ([`Reduction`]) is stored in the portfolio directory and stepped by one
//! chunk of groups per transaction:
//!
//! ```text
//! Idle ──start──▶ Reducing ──continue──▶ Reducing ──reset──▶ Idle
//! ```
//!
//! Every step is pinned to the global tick the reduction started at. A step
//! computed against another tick is stale and rejected.

use crate::{
    asset_group::ensure_nothing_spent,
    config::ProtocolConfig,
    portfolio::{current_tick, PortfolioTransition},
    traversal::{find_first_holder, search_for_asset_class, sum_total_asset_value},
    tx::{PointerTable, Transaction},
    types::{Reduction, ReductionMode, ReductionState},
    Error, Result,
};
use num_traits::CheckedAdd;

impl Reduction {
    /// Reduction at `start_tick` that has visited nothing yet
    pub fn seed(start_tick: u64, mode: &ReductionMode) -> Self {
        Self {
            group_iter: 0,
            start_tick,
            mode: mode.seed(),
        }
    }

    /// Fold the groups named by `group_ptrs` into this reduction
    ///
    /// Traversal starts at id `group_iter`. An `Exists` search stops at the
    /// first group holding its class, so its progress ends right after that
    /// group even when more pointers follow.
    pub fn step(
        &self,
        table: &PointerTable<'_>,
        params: &ProtocolConfig,
        group_ptrs: &[usize],
    ) -> Result<Reduction> {
        let first_id = self.group_iter;
        let advanced = first_id
            .checked_add(group_ptrs.len() as u64)
            .ok_or(Error::ArithmeticOverflow)?;

        let (group_iter, mode) = match &self.mode {
            ReductionMode::TotalAssetValue {
                total,
                oldest_timestamp,
            } => {
                let chunk = sum_total_asset_value(table, params, group_ptrs, first_id)?;
                let total = total
                    .checked_add(&chunk.total)
                    .ok_or(Error::ArithmeticOverflow)?;
                (
                    advanced,
                    ReductionMode::TotalAssetValue {
                        total,
                        oldest_timestamp: (*oldest_timestamp).min(chunk.oldest_timestamp),
                    },
                )
            }
            ReductionMode::Exists { asset_class, found } => {
                if *found {
                    return Err(Error::ReductionFinished);
                }
                match find_first_holder(table, params, asset_class, group_ptrs, first_id)? {
                    Some(position) => (
                        first_id + position as u64 + 1,
                        ReductionMode::Exists {
                            asset_class: asset_class.clone(),
                            found: true,
                        },
                    ),
                    None => (advanced, self.mode.clone()),
                }
            }
            ReductionMode::DoesNotExist { asset_class } => {
                if search_for_asset_class(table, params, asset_class, group_ptrs, first_id)? {
                    return Err(Error::AssetClassPresent(asset_class.to_string()));
                }
                (advanced, self.mode.clone())
            }
        };

        Ok(Reduction {
            group_iter,
            start_tick: self.start_tick,
            mode,
        })
    }
}

fn reducing<'a>(state: &'a ReductionState) -> Option<&'a Reduction> {
    match state {
        ReductionState::Reducing(r) => Some(r),
        ReductionState::Idle => None,
    }
}

fn ensure_current(tick: u64, reduction: &Reduction) -> Result<()> {
    if reduction.start_tick == tick {
        Ok(())
    } else {
        Err(Error::StaleEpoch {
            current: tick,
            found: reduction.start_tick,
        })
    }
}

fn ensure_matches(
    transition: &PortfolioTransition<'_>,
    expected: &Reduction,
    declared: &Reduction,
) -> Result<()> {
    if expected != declared {
        return Err(Error::ReductionMismatch {
            expected: format!("{:?}", expected),
            declared: format!("{:?}", declared),
        });
    }
    if declared.group_iter > transition.after.n_groups {
        return Err(transition.rejected(format!(
            "progress {} beyond {} groups",
            declared.group_iter, transition.after.n_groups
        )));
    }
    Ok(())
}

/// Idle → Reducing, visiting the first chunk of groups
pub fn validate_start_reduction(
    tx: &Transaction,
    params: &ProtocolConfig,
    transition: &PortfolioTransition<'_>,
    group_ptrs: &[usize],
) -> Result<()> {
    if !transition.before.is_idle() {
        return Err(transition.rejected("a reduction is already running"));
    }
    let declared = reducing(&transition.after.state)
        .ok_or_else(|| transition.rejected("start must produce a running reduction"))?;
    transition.ensure_same_group_count()?;

    let tick = current_tick(tx, params)?;
    ensure_current(tick, declared)?;
    ensure_nothing_spent(tx, params)?;

    let table = PointerTable::references(tx);
    let expected = Reduction::seed(tick, &declared.mode).step(&table, params, group_ptrs)?;
    ensure_matches(transition, &expected, declared)?;

    tracing::debug!(
        tick,
        group_iter = declared.group_iter,
        mode = %declared.mode.kind(),
        "reduction started"
    );
    Ok(())
}

/// Reducing → Reducing, visiting the next chunk of groups in the same epoch
pub fn validate_continue_reduction(
    tx: &Transaction,
    params: &ProtocolConfig,
    transition: &PortfolioTransition<'_>,
    group_ptrs: &[usize],
) -> Result<()> {
    let previous = reducing(&transition.before.state)
        .ok_or_else(|| transition.rejected("no reduction to continue"))?;
    let declared = reducing(&transition.after.state)
        .ok_or_else(|| transition.rejected("continue must keep the reduction running"))?;
    transition.ensure_same_group_count()?;

    let tick = current_tick(tx, params)?;
    ensure_current(tick, previous)?;
    ensure_current(tick, declared)?;

    let (from, to) = (previous.mode.kind(), declared.mode.kind());
    if from != to {
        return Err(Error::ModeChanged {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    if group_ptrs.is_empty() {
        return Err(Error::EmptyPointerList);
    }
    ensure_nothing_spent(tx, params)?;

    let table = PointerTable::references(tx);
    let expected = previous.step(&table, params, group_ptrs)?;
    ensure_matches(transition, &expected, declared)?;

    tracing::debug!(
        tick,
        from = previous.group_iter,
        to = declared.group_iter,
        "reduction continued"
    );
    Ok(())
}

/// Reducing → Idle, abandoning the running reduction
pub fn validate_reset_reduction(
    tx: &Transaction,
    params: &ProtocolConfig,
    transition: &PortfolioTransition<'_>,
) -> Result<()> {
    if transition.before.is_idle() {
        return Err(transition.rejected("nothing to reset"));
    }
    if !transition.after.is_idle() {
        return Err(transition.rejected("reset must return to Idle"));
    }
    transition.ensure_same_group_count()?;
    ensure_nothing_spent(tx, params)?;
    Ok(())
}
