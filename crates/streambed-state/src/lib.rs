//! Per-(key, namespace) state cells and the store that owns them.

pub mod cell;
pub mod store;

pub use cell::{BagCell, CombineFn, CombiningCell, MapCell, SetCell, ValueCell};
pub use store::StateStore;
