//! The state transfer engine.

use super::registry::HandlerRegistry;
use super::schema::Stateful;
use super::value::StateValue;
use super::{MergeStrategy, StateTransferError};
use std::any::Any;

/// Counters describing one transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Fields visited, nested fields included.
    pub fields: usize,
    /// Fields replaced wholesale because a side was absent.
    pub replaced: usize,
    /// Fields merged by a registered handler.
    pub handled: usize,
}

/// Merges the state of one instance into another of the same type.
#[derive(Debug, Default, Clone)]
pub struct StateTransfer {
    registry: HandlerRegistry,
    report: std::cell::Cell<TransferReport>,
}

impl StateTransfer {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry,
            report: std::cell::Cell::new(TransferReport::default()),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    /// Merge every eligible field of `source` into `target`.
    pub fn transfer<S: Stateful>(
        &self,
        target: &mut S,
        source: &S,
    ) -> Result<TransferReport, StateTransferError> {
        self.report.set(TransferReport::default());
        self.transfer_fields(target, source)?;
        let report = self.report.get();
        tracing::debug!(
            "state transfer into {}: {} fields, {} replaced, {} by handler",
            std::any::type_name::<S>(),
            report.fields,
            report.replaced,
            report.handled
        );
        Ok(report)
    }

    /// Merge `source` into `target` and discard `source`. A state is
    /// consumed by exactly one transfer.
    pub fn transfer_and_discard<S: Stateful>(
        &self,
        target: &mut S,
        source: S,
    ) -> Result<TransferReport, StateTransferError> {
        self.transfer(target, &source)
    }

    fn transfer_fields<S: Stateful>(
        &self,
        target: &mut S,
        source: &S,
    ) -> Result<(), StateTransferError> {
        let schema = S::schema();
        for field in schema.eligible_fields() {
            tracing::trace!("transferring field '{}' ({})", field.name(), field.strategy());
            field.apply(self, target, source)?;
        }
        Ok(())
    }

    fn bump(&self, f: impl FnOnce(&mut TransferReport)) {
        let mut report = self.report.get();
        f(&mut report);
        self.report.set(report);
    }

    pub(crate) fn merge_value<O: Any, V: StateValue>(
        &self,
        field: &str,
        strategy: MergeStrategy,
        target: &mut V,
        source: &V,
    ) -> Result<(), StateTransferError> {
        self.bump(|r| r.fields += 1);

        if target.is_absent() || source.is_absent() {
            self.bump(|r| r.replaced += 1);
            *target = source.clone();
            return Ok(());
        }

        if let Some(handler) = self.registry.resolve::<O, V>(field) {
            self.bump(|r| r.handled += 1);
            return handler.merge(field, target, source, strategy);
        }

        target.merge_from(source, strategy);
        Ok(())
    }

    pub(crate) fn merge_nested<O: Any, N: Stateful + Clone>(
        &self,
        field: &str,
        strategy: MergeStrategy,
        target: &mut N,
        source: &N,
    ) -> Result<(), StateTransferError> {
        self.bump(|r| r.fields += 1);

        if let Some(handler) = self.registry.resolve::<O, N>(field) {
            self.bump(|r| r.handled += 1);
            return handler.merge(field, target, source, strategy);
        }

        match strategy {
            MergeStrategy::ClearAndFill => {
                *target = source.clone();
                Ok(())
            }
            _ => self.transfer_fields(target, source),
        }
    }
}
