//! Pluggable merge handlers for state transfer.

use super::{MergeStrategy, StateTransferError};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Custom merge logic for a field or a value type.
///
/// Values arrive type-erased; handlers built with
/// [`HandlerRegistry::register_type`] or [`HandlerRegistry::register_field`]
/// downcast them for you.
pub trait FieldHandler: Send + Sync {
    fn merge(
        &self,
        field: &str,
        target: &mut dyn Any,
        source: &dyn Any,
        strategy: MergeStrategy,
    ) -> Result<(), StateTransferError>;
}

/// Adapter turning a typed closure into a [`FieldHandler`].
struct TypedHandler<V, F> {
    merge: F,
    _marker: std::marker::PhantomData<fn(&mut V)>,
}

impl<V, F> FieldHandler for TypedHandler<V, F>
where
    V: Any,
    F: Fn(&mut V, &V, MergeStrategy) -> Result<(), StateTransferError> + Send + Sync,
{
    fn merge(
        &self,
        field: &str,
        target: &mut dyn Any,
        source: &dyn Any,
        strategy: MergeStrategy,
    ) -> Result<(), StateTransferError> {
        let mismatch = || StateTransferError::TypeMismatch {
            field: field.to_string(),
            expected: std::any::type_name::<V>(),
        };
        let source = source.downcast_ref::<V>().ok_or_else(mismatch)?;
        let target = target.downcast_mut::<V>().ok_or_else(mismatch)?;
        (self.merge)(target, source, strategy)
    }
}

/// Explicit registry of merge handlers, owned by a
/// [`StateTransfer`](super::StateTransfer) engine.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    by_field: HashMap<(TypeId, String), Arc<dyn FieldHandler>>,
    by_type: HashMap<TypeId, Arc<dyn FieldHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler for field `field` of owner type `O`. Takes precedence over
    /// type-wide handlers.
    pub fn register_field<O, V, F>(&mut self, field: &str, merge: F) -> &mut Self
    where
        O: Any,
        V: Any,
        F: Fn(&mut V, &V, MergeStrategy) -> Result<(), StateTransferError> + Send + Sync + 'static,
    {
        self.by_field.insert(
            (TypeId::of::<O>(), field.to_string()),
            Arc::new(TypedHandler {
                merge,
                _marker: std::marker::PhantomData,
            }),
        );
        self
    }

    /// Handler for every field whose value type is `V`.
    pub fn register_type<V, F>(&mut self, merge: F) -> &mut Self
    where
        V: Any,
        F: Fn(&mut V, &V, MergeStrategy) -> Result<(), StateTransferError> + Send + Sync + 'static,
    {
        self.by_type.insert(
            TypeId::of::<V>(),
            Arc::new(TypedHandler {
                merge,
                _marker: std::marker::PhantomData,
            }),
        );
        self
    }

    /// Register an already type-erased handler for a field.
    pub fn register_field_handler(
        &mut self,
        owner: TypeId,
        field: &str,
        handler: Arc<dyn FieldHandler>,
    ) -> &mut Self {
        self.by_field.insert((owner, field.to_string()), handler);
        self
    }

    /// Register an already type-erased handler for a value type.
    pub fn register_type_handler(
        &mut self,
        value: TypeId,
        handler: Arc<dyn FieldHandler>,
    ) -> &mut Self {
        self.by_type.insert(value, handler);
        self
    }

    /// Most specific handler for field `field` of `O` holding a `V`, if any.
    pub fn resolve<O: Any, V: Any>(&self, field: &str) -> Option<Arc<dyn FieldHandler>> {
        self.by_field
            .get(&(TypeId::of::<O>(), field.to_string()))
            .or_else(|| self.by_type.get(&TypeId::of::<V>()))
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.by_field.is_empty() && self.by_type.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("field_handlers", &self.by_field.len())
            .field("type_handlers", &self.by_type.len())
            .finish()
    }
}
