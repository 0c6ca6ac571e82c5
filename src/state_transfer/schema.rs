//! Declared state layout of stateful types.

use super::engine::StateTransfer;
use super::value::{ContainerKind, StateValue};
use super::{MergeStrategy, StateTransferError};
use std::any::Any;

/// Which fields of a type take part in a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InclusionMode {
    /// Every field that is not marked transient
    #[default]
    AllFields,
    /// Only fields marked as part of the state
    Explicit,
}

/// A type whose instances carry algorithm state that survives a cutover.
pub trait Stateful: Any + Send {
    /// Declared fields and how each one merges.
    fn schema() -> StateSchema<Self>
    where
        Self: Sized;
}

type ApplyFn<S> = Box<
    dyn Fn(&StateTransfer, MergeStrategy, &mut S, &S) -> Result<(), StateTransferError>
        + Send
        + Sync,
>;

/// One declared field of a stateful type.
pub struct StateField<S> {
    name: &'static str,
    kind: ContainerKind,
    strategy: MergeStrategy,
    transient: bool,
    part_of_state: bool,
    apply: ApplyFn<S>,
}

impl<S: Stateful> StateField<S> {
    /// A field holding a [`StateValue`] (plain value or collection).
    pub fn value<V: StateValue>(
        name: &'static str,
        get: fn(&S) -> &V,
        get_mut: fn(&mut S) -> &mut V,
    ) -> Self {
        Self {
            name,
            kind: V::kind(),
            strategy: MergeStrategy::Default,
            transient: false,
            part_of_state: false,
            apply: Box::new(
                move |engine: &StateTransfer, strategy: MergeStrategy, target: &mut S, source: &S| {
                    engine.merge_value::<S, V>(name, strategy, get_mut(target), get(source))
                },
            ),
        }
    }

    /// A field holding another stateful object, merged recursively.
    pub fn nested<N: Stateful + Clone + Sync>(
        name: &'static str,
        get: fn(&S) -> &N,
        get_mut: fn(&mut S) -> &mut N,
    ) -> Self {
        Self {
            name,
            kind: ContainerKind::Plain,
            strategy: MergeStrategy::Default,
            transient: false,
            part_of_state: false,
            apply: Box::new(
                move |engine: &StateTransfer, strategy: MergeStrategy, target: &mut S, source: &S| {
                    engine.merge_nested::<S, N>(name, strategy, get_mut(target), get(source))
                },
            ),
        }
    }

    /// An optional nested stateful object. `None` on either side counts as absent.
    pub fn optional_nested<N: Stateful + Clone + Sync>(
        name: &'static str,
        get: fn(&S) -> &Option<N>,
        get_mut: fn(&mut S) -> &mut Option<N>,
    ) -> Self {
        Self {
            name,
            kind: ContainerKind::Plain,
            strategy: MergeStrategy::Default,
            transient: false,
            part_of_state: false,
            apply: Box::new(
                move |engine: &StateTransfer, strategy: MergeStrategy, target: &mut S, source: &S| {
                    let source = get(source);
                    match (get_mut(target), source) {
                        (Some(t), Some(s)) => engine.merge_nested::<S, N>(name, strategy, t, s),
                        (slot, _) => {
                            *slot = source.clone();
                            Ok(())
                        }
                    }
                },
            ),
        }
    }

    /// Set the merge strategy.
    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Exclude the field when the schema includes all fields.
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Include the field when the schema is explicit.
    pub fn part_of_state(mut self) -> Self {
        self.part_of_state = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// Whether the field takes part in a transfer under `mode`.
    pub fn is_eligible(&self, mode: InclusionMode) -> bool {
        match mode {
            InclusionMode::AllFields => !self.transient,
            InclusionMode::Explicit => self.part_of_state,
        }
    }

    pub(crate) fn apply(
        &self,
        engine: &StateTransfer,
        target: &mut S,
        source: &S,
    ) -> Result<(), StateTransferError> {
        (self.apply)(engine, self.strategy, target, source)
    }
}

impl<S> std::fmt::Debug for StateField<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateField")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("strategy", &self.strategy)
            .field("transient", &self.transient)
            .field("part_of_state", &self.part_of_state)
            .finish()
    }
}

/// Ordered field list of a stateful type.
#[derive(Debug)]
pub struct StateSchema<S> {
    mode: InclusionMode,
    fields: Vec<StateField<S>>,
}

impl<S: Stateful> StateSchema<S> {
    /// Schema where every non-transient field is transferred.
    pub fn all_fields() -> Self {
        Self {
            mode: InclusionMode::AllFields,
            fields: Vec::new(),
        }
    }

    /// Schema where only fields marked [`StateField::part_of_state`] are transferred.
    pub fn explicit() -> Self {
        Self {
            mode: InclusionMode::Explicit,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: StateField<S>) -> Self {
        self.fields.push(field);
        self
    }

    pub fn mode(&self) -> InclusionMode {
        self.mode
    }

    pub fn fields(&self) -> &[StateField<S>] {
        &self.fields
    }

    /// Fields that take part in a transfer, in declaration order.
    pub fn eligible_fields(&self) -> impl Iterator<Item = &StateField<S>> {
        let mode = self.mode;
        self.fields.iter().filter(move |f| f.is_eligible(mode))
    }
}
