// mod.rs - Iterator exports

mod typed;
mod variable;

pub use typed::{layout_of, Attribute, DataSetIterator, DataSetIteratorMut, INDEX_NONE};
pub use variable::{DataSetVariableIterator, DataSetVariableIteratorMut};
