//! The five state-cell variants. Every cell type implements `is_empty`, since the
//! namespace-level GC path only needs to know whether a cell has anything worth clearing.

use ahash::AHashSet;
use std::collections::HashMap;
use std::hash::Hash;

/// A single replaceable value. Reads `None` until the first write, and again after `clear`.
#[derive(Debug)]
pub struct ValueCell<T> {
    value: Option<T>,
}

impl<T> Default for ValueCell<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T> ValueCell<T> {
    pub fn read(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn write(&mut self, value: T) {
        self.value = Some(value);
    }

    pub fn clear(&mut self) {
        self.value = None;
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }
}

/// An append-only list. Used for buffering the raw elements assigned to a window until a pane
/// fires or the sort-flush timer drains them.
#[derive(Debug)]
pub struct BagCell<T> {
    items: Vec<T>,
}

impl<T> Default for BagCell<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> BagCell<T> {
    pub fn add(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn read(&self) -> &[T] {
        &self.items
    }

    pub fn take(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// A deduplicating collection, used for tracking things like which windows a key has touched.
#[derive(Debug)]
pub struct SetCell<T: Eq + Hash> {
    items: AHashSet<T>,
}

impl<T: Eq + Hash> Default for SetCell<T> {
    fn default() -> Self {
        Self {
            items: AHashSet::default(),
        }
    }
}

impl<T: Eq + Hash> SetCell<T> {
    pub fn add(&mut self, item: T) -> bool {
        self.items.insert(item)
    }

    pub fn remove(&mut self, item: &T) -> bool {
        self.items.remove(item)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// How a combining cell folds inputs into an accumulator and extracts the final output. Supplied
/// by the caller at each access point rather than stored alongside the accumulator, since the
/// accumulator is the only part of the combine that needs to survive across calls.
pub trait CombineFn<In, Acc, Out> {
    fn create_accumulator(&self) -> Acc;
    fn add_input(&self, acc: Acc, input: In) -> Acc;
    fn merge_accumulators(&self, accs: Vec<Acc>) -> Acc;
    fn extract_output(&self, acc: &Acc) -> Out;
}

/// An incrementally-updated accumulator, e.g. a running sum or a top-k heap. Merging across
/// namespaces (used when session windows merge) folds every source accumulator into one.
#[derive(Debug)]
pub struct CombiningCell<Acc> {
    acc: Option<Acc>,
}

impl<Acc> Default for CombiningCell<Acc> {
    fn default() -> Self {
        Self { acc: None }
    }
}

impl<Acc> CombiningCell<Acc> {
    pub fn add_input<In, Out>(&mut self, input: In, combine: &dyn CombineFn<In, Acc, Out>) {
        let acc = self.acc.take().unwrap_or_else(|| combine.create_accumulator());
        self.acc = Some(combine.add_input(acc, input));
    }

    pub fn read<In, Out>(&self, combine: &dyn CombineFn<In, Acc, Out>) -> Out {
        match &self.acc {
            Some(acc) => combine.extract_output(acc),
            None => combine.extract_output(&combine.create_accumulator()),
        }
    }

    /// Folds `others` (accumulators pulled from the windows being merged away) into this cell,
    /// in addition to whatever this cell already held.
    pub fn merge_in<In, Out>(&mut self, others: Vec<Acc>, combine: &dyn CombineFn<In, Acc, Out>) {
        if others.is_empty() {
            return;
        }
        let mut all = others;
        if let Some(acc) = self.acc.take() {
            all.push(acc);
        }
        self.acc = Some(combine.merge_accumulators(all));
    }

    pub fn take_accumulator(&mut self) -> Option<Acc> {
        self.acc.take()
    }

    pub fn clear(&mut self) {
        self.acc = None;
    }

    pub fn is_empty(&self) -> bool {
        self.acc.is_none()
    }
}

/// A keyed map, for DoFns that need arbitrary per-key-within-window lookups.
#[derive(Debug)]
pub struct MapCell<K: Eq + Hash, V> {
    entries: HashMap<K, V>,
}

impl<K: Eq + Hash, V> Default for MapCell<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> MapCell<K, V> {
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_cell_clears_to_empty() {
        let mut cell = ValueCell::default();
        assert!(cell.is_empty());
        cell.write(42);
        assert_eq!(cell.read(), Some(&42));
        cell.clear();
        assert!(cell.is_empty());
        assert_eq!(cell.read(), None);
    }

    #[test]
    fn bag_cell_accumulates_and_takes() {
        let mut cell = BagCell::default();
        cell.add(1);
        cell.add(2);
        assert_eq!(cell.read(), &[1, 2]);
        assert_eq!(cell.take(), vec![1, 2]);
        assert!(cell.is_empty());
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
    fn combining_cell_sums_inputs() {
        let sum = Sum;
        let mut cell: CombiningCell<i64> = CombiningCell::default();
        cell.add_input(1, &sum);
        cell.add_input(2, &sum);
        assert_eq!(cell.read(&sum), 3);
    }

    #[test]
    fn combining_cell_merges_other_accumulators() {
        let sum = Sum;
        let mut target: CombiningCell<i64> = CombiningCell::default();
        target.add_input(1, &sum);
        target.merge_in(vec![2, 3], &sum);
        assert_eq!(target.read(&sum), 6);
    }
}
