//! The per-key state store: a keyed map of lazily-created, namespace-scoped cells.

use crate::cell::{BagCell, CombiningCell, MapCell, SetCell, ValueCell};
use ahash::AHashMap;
use std::any::{type_name, Any};
use std::hash::Hash;
use streambed_types::{CoreError, Result, StateNamespace};

type CellSlot = (Box<dyn Any + Send>, &'static str);

/// Owns every state cell for one key. There is no concurrent access and no locking: a
/// `StateStore` is created fresh per key, driven synchronously by that key's runner, and dropped
/// once the key's processing finishes.
#[derive(Default)]
pub struct StateStore {
    cells: AHashMap<(StateNamespace, String), CellSlot>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot<T: Any + Send + Default>(
        &mut self,
        namespace: StateNamespace,
        id: &str,
    ) -> Result<&mut T> {
        let wanted = type_name::<T>();
        let key = (namespace, id.to_string());
        let slot = self
            .cells
            .entry(key)
            .or_insert_with(|| (Box::new(T::default()) as Box<dyn Any + Send>, wanted));
        if slot.1 != wanted {
            return Err(CoreError::StateTypeMismatch {
                cell_id: id.to_string(),
                expected: wanted,
                actual: slot.1,
            });
        }
        Ok(slot
            .0
            .downcast_mut::<T>()
            .expect("type tag matched the stored cell's type but downcast failed"))
    }

    pub fn value_cell<T: Any + Send + Default>(
        &mut self,
        namespace: StateNamespace,
        id: &str,
    ) -> Result<&mut ValueCell<T>> {
        self.slot(namespace, id)
    }

    pub fn bag_cell<T: Any + Send>(
        &mut self,
        namespace: StateNamespace,
        id: &str,
    ) -> Result<&mut BagCell<T>> {
        self.slot(namespace, id)
    }

    pub fn set_cell<T: Any + Send + Eq + Hash>(
        &mut self,
        namespace: StateNamespace,
        id: &str,
    ) -> Result<&mut SetCell<T>> {
        self.slot(namespace, id)
    }

    pub fn combining_cell<Acc: Any + Send>(
        &mut self,
        namespace: StateNamespace,
        id: &str,
    ) -> Result<&mut CombiningCell<Acc>> {
        self.slot(namespace, id)
    }

    pub fn map_cell<K: Any + Send + Eq + Hash, V: Any + Send>(
        &mut self,
        namespace: StateNamespace,
        id: &str,
    ) -> Result<&mut MapCell<K, V>> {
        self.slot(namespace, id)
    }

    /// Drops every cell scoped to `namespace`. This is the GC path: once a window's allowed
    /// lateness has fully elapsed, its namespace is cleared wholesale rather than cell by cell.
    pub fn clear_namespace(&mut self, namespace: StateNamespace) {
        self.cells.retain(|(ns, _), _| *ns != namespace);
    }

    /// True when no cell exists under `namespace`, or every cell under it reports empty via the
    /// given predicate. Used by tests that want to assert a window's state was actually GC'd.
    pub fn namespace_is_empty(&self, namespace: StateNamespace) -> bool {
        !self.cells.keys().any(|(ns, _)| *ns == namespace)
    }

    /// Merges combining-cell accumulators from several source namespaces into one destination
    /// namespace, then clears the sources entirely (not just the one cell) — matching the
    /// reduce-fn runner's window-merge step, which relocates every piece of a source window's
    /// state to the target in one pass.
    pub fn merge_combining<Acc, In, Out>(
        &mut self,
        cell_id: &str,
        from: &[StateNamespace],
        to: StateNamespace,
        combine: &dyn crate::cell::CombineFn<In, Acc, Out>,
    ) -> Result<()>
    where
        Acc: Any + Send,
    {
        let mut collected = Vec::new();
        for ns in from {
            if let Some((boxed, tag)) = self.cells.get_mut(&(*ns, cell_id.to_string())) {
                let wanted = type_name::<CombiningCell<Acc>>();
                if *tag != wanted {
                    return Err(CoreError::StateTypeMismatch {
                        cell_id: cell_id.to_string(),
                        expected: wanted,
                        actual: tag,
                    });
                }
                let cell = boxed
                    .downcast_mut::<CombiningCell<Acc>>()
                    .expect("type tag matched the stored cell's type but downcast failed");
                if let Some(acc) = cell.take_accumulator() {
                    collected.push(acc);
                }
            }
            self.cells.retain(|(ns2, _), _| ns2 != ns);
        }
        if collected.is_empty() {
            return Ok(());
        }
        let dest: &mut CombiningCell<Acc> = self.slot(to, cell_id)?;
        dest.merge_in(collected, combine);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CombineFn;
    use streambed_types::Window;

    #[test]
    fn cells_are_created_lazily_and_scoped_by_namespace() {
        let mut store = StateStore::new();
        let ns_a = StateNamespace::window(Window::new(0, 10));
        let ns_b = StateNamespace::window(Window::new(10, 20));

        store.bag_cell::<i32>(ns_a, "buf").unwrap().add(1);
        store.bag_cell::<i32>(ns_b, "buf").unwrap().add(2);

        assert_eq!(store.bag_cell::<i32>(ns_a, "buf").unwrap().read(), &[1]);
        assert_eq!(store.bag_cell::<i32>(ns_b, "buf").unwrap().read(), &[2]);
    }

    #[test]
    fn clear_namespace_drops_every_cell_in_it() {
        let mut store = StateStore::new();
        let ns = StateNamespace::window(Window::new(0, 10));
        store.bag_cell::<i32>(ns, "buf").unwrap().add(1);
        store.value_cell::<i32>(ns, "count").unwrap().write(7);

        assert!(!store.namespace_is_empty(ns));
        store.clear_namespace(ns);
        assert!(store.namespace_is_empty(ns));
        assert!(store.bag_cell::<i32>(ns, "buf").unwrap().is_empty());
    }

    #[test]
    fn accessing_a_cell_with_the_wrong_variant_is_a_type_mismatch() {
        let mut store = StateStore::new();
        let ns = StateNamespace::window(Window::new(0, 10));
        store.value_cell::<i32>(ns, "x").unwrap().write(1);

        let err = store.bag_cell::<i32>(ns, "x").unwrap_err();
        assert!(matches!(err, CoreError::StateTypeMismatch { .. }));
    }

    struct Sum;
    impl CombineFn<i64, i64, i64> for Sum {
        fn create_accumulator(&self) -> i64 {
            0
        }
        fn add_input(&self, acc: i64, input: i64) -> i64 {
            acc + input
        }
        fn merge_accumulators(&self, accs: Vec<i64>) -> i64 {
            accs.into_iter().sum()
        }
        fn extract_output(&self, acc: &i64) -> i64 {
            *acc
        }
    }

    #[test]
    fn merge_combining_folds_sources_into_destination_and_clears_them() {
        let mut store = StateStore::new();
        let sum = Sum;
        let a = StateNamespace::window(Window::new(0, 10));
        let b = StateNamespace::window(Window::new(10, 20));
        let merged = StateNamespace::window(Window::new(0, 20));

        store.combining_cell::<i64>(a, "total").unwrap().add_input(3, &sum);
        store.combining_cell::<i64>(b, "total").unwrap().add_input(4, &sum);

        store
            .merge_combining::<i64, i64, i64>("total", &[a, b], merged, &sum)
            .unwrap();

        assert!(store.namespace_is_empty(a));
        assert!(store.namespace_is_empty(b));
        assert_eq!(store.combining_cell::<i64>(merged, "total").unwrap().read(&sum), 7);
    }
}
