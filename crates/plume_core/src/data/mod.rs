//! Particle data sets.
//!
//! A [`DataSet`] stores per-instance attributes ([`Variable`]s) as a
//! structure of arrays: every variable is flattened into 4-byte scalar
//! components and each component gets its own vector-aligned column.
//! Two [`DataBuffer`]s alternate as current and previous frame.
//!
//! Typical frame:
//! 1. `allocate(n)` the current buffer
//! 2. run a batch pass through a [`RegisterTable`] (previous -> current)
//! 3. `kill_instance` dead particles
//! 4. renderers read the current buffer through [`DataSetIterator`]s
//! 5. `tick()` to swap buffers

mod buffer;
mod column;
mod data_set;
mod dump;
mod error;
pub mod iter;
mod register;
mod types;
mod value;
mod variable;

pub use buffer::DataBuffer;
pub use column::{padded_len, ColumnDesc, ColumnMut, ColumnRef, ColumnView, VECTOR_WIDTH_BYTES};
pub use data_set::{BufferSelect, BufferSlot, DataSet, DataSetId, DataSetKind};
pub use error::DataSetError;
pub use iter::{
    Attribute, DataSetIterator, DataSetIteratorMut, DataSetVariableIterator,
    DataSetVariableIteratorMut,
};
pub use register::RegisterTable;
pub use types::{
    register_type, type_of, FieldDef, FieldType, ScalarKind, StructDef, TypeDefinition,
    TypeLayoutInfo, SCALAR_SIZE,
};
pub use value::{format_g, BoolState, EncodedBool, Value};
pub use variable::{Variable, VariableLayoutInfo};
