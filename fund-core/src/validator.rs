//! Instrumented entry point for the decision functions
//!
//! # Example
//!
//! ```
//! use fund_core::{Config, TxBuilder, Validator};
//!
//! let validator = Validator::new(Config::default())?;
//! let tx = TxBuilder::new().build();
//! assert!(validator.start_reduction(&tx, &[]).is_err());
//! # Ok::<(), fund_core::Error>(())
//! ```

use crate::{
    config::ProtocolConfig,
    metrics::Metrics,
    portfolio::{self, current_tick, find_transition},
    reduction,
    traversal::{sum_total_asset_value, ValueSummary},
    tx::{PointerTable, Transaction},
    vault, Config, Result,
};

/// Validator bound to one fund configuration
#[derive(Debug, Clone)]
pub struct Validator {
    config: Config,
    metrics: Option<Metrics>,
}

impl Validator {
    /// Create a validator, with metrics when enabled in `config`
    pub fn new(config: Config) -> Result<Self> {
        let metrics = if config.metrics.enabled {
            Some(Metrics::new(&config.metrics.namespace)?)
        } else {
            None
        };
        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            metrics = metrics.is_some(),
            "validator ready"
        );
        Ok(Self { config, metrics })
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Metrics collector, if enabled
    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    fn params(&self) -> &ProtocolConfig {
        &self.config.protocol
    }

    fn observe<T>(
        &self,
        operation: &'static str,
        pointers: Option<usize>,
        result: Result<T>,
    ) -> Result<T> {
        if let Err(e) = &result {
            tracing::warn!(operation, error = %e, "validation rejected");
        }
        if let Some(metrics) = &self.metrics {
            metrics.record(operation, result.is_ok());
            if let Some(pointers) = pointers {
                metrics.observe_pointers(operation, pointers);
            }
        }
        result
    }

    fn report_completion(&self, tx: &Transaction) -> Result<()> {
        let transition = find_transition(tx, self.params())?;
        let tick = current_tick(tx, self.params())?;
        if let Some(mode) = transition.after.completed_reduction(tick) {
            tracing::info!(
                tick,
                mode = %mode.kind(),
                total = ?mode.total_as_decimal(),
                "reduction complete"
            );
        }
        Ok(())
    }

    /// Validate Idle → Reducing over the first chunk of groups
    pub fn start_reduction(&self, tx: &Transaction, group_ptrs: &[usize]) -> Result<()> {
        let result = find_transition(tx, self.params()).and_then(|transition| {
            reduction::validate_start_reduction(tx, self.params(), &transition, group_ptrs)
        });
        self.observe("start_reduction", Some(group_ptrs.len()), result)?;
        self.report_completion(tx)
    }

    /// Validate Reducing → Reducing over the next chunk of groups
    pub fn continue_reduction(&self, tx: &Transaction, group_ptrs: &[usize]) -> Result<()> {
        let result = find_transition(tx, self.params()).and_then(|transition| {
            reduction::validate_continue_reduction(tx, self.params(), &transition, group_ptrs)
        });
        self.observe("continue_reduction", Some(group_ptrs.len()), result)?;
        self.report_completion(tx)
    }

    /// Validate Reducing → Idle
    pub fn reset_reduction(&self, tx: &Transaction) -> Result<()> {
        let result = find_transition(tx, self.params()).and_then(|transition| {
            reduction::validate_reset_reduction(tx, self.params(), &transition)
        });
        self.observe("reset_reduction", None, result)
    }

    /// Validate creation of the next asset group
    pub fn add_asset_group(&self, tx: &Transaction) -> Result<()> {
        let result = find_transition(tx, self.params()).and_then(|transition| {
            portfolio::validate_add_asset_group(tx, self.params(), &transition)
        });
        self.observe("add_asset_group", None, result)
    }

    /// Validate removal of the last asset group
    pub fn remove_asset_group(&self, tx: &Transaction) -> Result<()> {
        let result = find_transition(tx, self.params()).and_then(|transition| {
            portfolio::validate_remove_asset_group(tx, self.params(), &transition)
        });
        self.observe("remove_asset_group", None, result)
    }

    /// Fail unless the declared counters reconcile with the vault
    pub fn check_counters(
        &self,
        tx: &Transaction,
        d_lovelace: i128,
        asset_group_output_ptrs: &[usize],
    ) -> Result<()> {
        let result = vault::check_counters(tx, self.params(), d_lovelace, asset_group_output_ptrs);
        self.observe("check_counters", Some(asset_group_output_ptrs.len()), result)
    }

    /// Whether the declared counters reconcile with the vault
    pub fn counters_are_consistent(
        &self,
        tx: &Transaction,
        d_lovelace: i128,
        asset_group_output_ptrs: &[usize],
    ) -> bool {
        self.check_counters(tx, d_lovelace, asset_group_output_ptrs).is_ok()
    }

    /// Value of the referenced groups starting at `first_id`
    pub fn total_asset_value(
        &self,
        tx: &Transaction,
        group_ptrs: &[usize],
        first_id: u64,
    ) -> Result<ValueSummary> {
        let table = PointerTable::references(tx);
        let result = sum_total_asset_value(&table, self.params(), group_ptrs, first_id);
        self.observe("total_asset_value", Some(group_ptrs.len()), result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::types::{Portfolio, Reduction, ReductionMode, ReductionState, Value};
    use num_rational::Ratio;

    fn validator() -> Validator {
        Validator::new(Config::default()).unwrap()
    }

    fn accepted(validator: &Validator, operation: &str) -> u64 {
        validator.metrics().unwrap().count(operation, "accepted")
    }

    fn rejected(validator: &Validator, operation: &str) -> u64 {
        validator.metrics().unwrap().count(operation, "rejected")
    }

    #[test]
    fn test_metrics_disabled() {
        let mut config = Config::default();
        config.metrics.enabled = false;
        let validator = Validator::new(config).unwrap();
        assert!(validator.metrics().is_none());
        assert!(validator.reset_reduction(&TxBuilder::new().build()).is_err());
    }

    #[test]
    fn test_start_reduction_single_pass() {
        let params = params();
        let after = Portfolio {
            n_groups: 1,
            state: ReductionState::Reducing(Reduction {
                group_iter: 1,
                start_tick: 3,
                mode: ReductionMode::TotalAssetValue {
                    total: Ratio::from_integer(1_000_000),
                    oldest_timestamp: 123,
                },
            }),
        };
        let tx = TxBuilder::new()
            .input(portfolio_out(&params, Portfolio { n_groups: 1, state: ReductionState::Idle }))
            .output(portfolio_out(&params, after))
            .reference(supply_out(&params, 3))
            .reference(group_out(&params, group(0, vec![priced("a", 10_000, 100, 1, 123)])))
            .build();

        let validator = validator();
        validator.start_reduction(&tx, &[1]).unwrap();
        assert_eq!(accepted(&validator, "start_reduction"), 1);

        assert!(validator.start_reduction(&tx, &[]).is_err());
        assert_eq!(rejected(&validator, "start_reduction"), 1);
    }

    #[test]
    fn test_total_asset_value() {
        let params = params();
        let tx = TxBuilder::new()
            .reference(group_out(&params, group(0, vec![priced("a", 10_000, 100, 1, 123)])))
            .build();
        let validator = validator();
        let summary = validator.total_asset_value(&tx, &[0], 0).unwrap();
        assert_eq!(summary.total, Ratio::from_integer(1_000_000));
        assert!(validator.total_asset_value(&tx, &[0], 1).is_err());
        assert_eq!(rejected(&validator, "total_asset_value"), 1);
    }

    #[test]
    fn test_counters_are_consistent_records_outcome() {
        let params = params();
        let tx = TxBuilder::new()
            .input(vault_out(&params, Value::lovelace(1_000_000)))
            .output(vault_out(&params, Value::lovelace(3_000_000)))
            .reference(config_out(&params))
            .valid_between(0, 10)
            .build();
        let validator = validator();
        assert!(validator.counters_are_consistent(&tx, 2_000_000, &[]));
        assert!(!validator.counters_are_consistent(&tx, 0, &[]));
        assert_eq!(accepted(&validator, "check_counters"), 1);
        assert_eq!(rejected(&validator, "check_counters"), 1);
    }

    #[test]
    fn test_encoded_metrics_name_operations() {
        let validator = validator();
        let _ = validator.add_asset_group(&TxBuilder::new().build());
        let text = validator.metrics().unwrap().encode().unwrap();
        assert!(text.contains("operation=\"add_asset_group\""));
    }
}
