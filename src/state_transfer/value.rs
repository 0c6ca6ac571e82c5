//! Mergeable field values.

use super::MergeStrategy;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;

/// Shape of a field value, used to pick merge semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    List,
    Set,
    Map,
    Plain,
}

/// A field value that can take part in a state transfer.
pub trait StateValue: Any + Clone + Send + Sync {
    /// Shape of this value.
    fn kind() -> ContainerKind
    where
        Self: Sized;

    /// Whether the value counts as "not set". An absent value on either side
    /// makes the source value replace the target value outright.
    fn is_absent(&self) -> bool {
        false
    }

    /// Merge `source` into `self` following `strategy`.
    fn merge_from(&mut self, source: &Self, strategy: MergeStrategy);
}

macro_rules! plain_state_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl StateValue for $ty {
                fn kind() -> ContainerKind {
                    ContainerKind::Plain
                }

                fn merge_from(&mut self, source: &Self, _strategy: MergeStrategy) {
                    *self = source.clone();
                }
            }
        )*
    };
}

plain_state_value!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String
);

impl StateValue for chrono::DateTime<chrono::Utc> {
    fn kind() -> ContainerKind {
        ContainerKind::Plain
    }

    fn merge_from(&mut self, source: &Self, _strategy: MergeStrategy) {
        *self = source.clone();
    }
}

impl<V: StateValue> StateValue for Option<V> {
    fn kind() -> ContainerKind {
        V::kind()
    }

    fn is_absent(&self) -> bool {
        self.is_none()
    }

    fn merge_from(&mut self, source: &Self, strategy: MergeStrategy) {
        match (self.as_mut(), source) {
            (Some(target), Some(source)) => target.merge_from(source, strategy),
            _ => *self = source.clone(),
        }
    }
}

fn merge_sequence<T, C>(target: &mut C, source: &C, strategy: MergeStrategy)
where
    T: Clone + PartialEq,
    C: Clone + Extend<T>,
    for<'a> &'a C: IntoIterator<Item = &'a T>,
{
    match strategy {
        MergeStrategy::Default | MergeStrategy::ClearAndFill => *target = source.clone(),
        MergeStrategy::Merge => target.extend(source.into_iter().cloned()),
        MergeStrategy::MergeAndKeepOld => {
            let missing: Vec<T> = source
                .into_iter()
                .filter(|item| !(&*target).into_iter().any(|existing| existing == *item))
                .cloned()
                .collect();
            target.extend(missing);
        }
    }
}

impl<T> StateValue for Vec<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn kind() -> ContainerKind {
        ContainerKind::List
    }

    fn merge_from(&mut self, source: &Self, strategy: MergeStrategy) {
        merge_sequence(self, source, strategy);
    }
}

impl<T> StateValue for VecDeque<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn kind() -> ContainerKind {
        ContainerKind::List
    }

    fn merge_from(&mut self, source: &Self, strategy: MergeStrategy) {
        merge_sequence(self, source, strategy);
    }
}

impl<T> StateValue for HashSet<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn kind() -> ContainerKind {
        ContainerKind::Set
    }

    fn merge_from(&mut self, source: &Self, strategy: MergeStrategy) {
        match strategy {
            MergeStrategy::Default | MergeStrategy::ClearAndFill => *self = source.clone(),
            MergeStrategy::Merge => {
                for item in source {
                    self.replace(item.clone());
                }
            }
            MergeStrategy::MergeAndKeepOld => {
                for item in source {
                    if !self.contains(item) {
                        self.insert(item.clone());
                    }
                }
            }
        }
    }
}

impl<T> StateValue for BTreeSet<T>
where
    T: Clone + Ord + Send + Sync + 'static,
{
    fn kind() -> ContainerKind {
        ContainerKind::Set
    }

    fn merge_from(&mut self, source: &Self, strategy: MergeStrategy) {
        match strategy {
            MergeStrategy::Default | MergeStrategy::ClearAndFill => *self = source.clone(),
            MergeStrategy::Merge => {
                for item in source {
                    self.replace(item.clone());
                }
            }
            MergeStrategy::MergeAndKeepOld => {
                for item in source {
                    if !self.contains(item) {
                        self.insert(item.clone());
                    }
                }
            }
        }
    }
}

impl<K, V> StateValue for HashMap<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn kind() -> ContainerKind {
        ContainerKind::Map
    }

    fn merge_from(&mut self, source: &Self, strategy: MergeStrategy) {
        match strategy {
            MergeStrategy::Default | MergeStrategy::ClearAndFill => *self = source.clone(),
            MergeStrategy::Merge => {
                self.extend(source.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            MergeStrategy::MergeAndKeepOld => {
                for (k, v) in source {
                    self.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
        }
    }
}

impl<K, V> StateValue for BTreeMap<K, V>
where
    K: Clone + Ord + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn kind() -> ContainerKind {
        ContainerKind::Map
    }

    fn merge_from(&mut self, source: &Self, strategy: MergeStrategy) {
        match strategy {
            MergeStrategy::Default | MergeStrategy::ClearAndFill => *self = source.clone(),
            MergeStrategy::Merge => {
                self.extend(source.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            MergeStrategy::MergeAndKeepOld => {
                for (k, v) in source {
                    self.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
        }
    }
}
