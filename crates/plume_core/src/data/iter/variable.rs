// variable.rs - Reflection iterators: any variable, any type, slow
//
// Used for diagnostics and tooling. Values are decoded through the
// variable's `TypeDefinition` into a `Value` tree.

use crate::data::buffer::DataBuffer;
use crate::data::data_set::{BufferSelect, DataSet};
use crate::data::error::DataSetError;
use crate::data::value::Value;
use crate::data::variable::{Variable, VariableLayoutInfo};
use std::collections::HashMap;

fn read_value(
    buffer: &DataBuffer,
    variable: &Variable,
    info: &VariableLayoutInfo,
    instance: usize,
) -> Value {
    let mut components = info
        .component_range()
        .map(|c| bytemuck::pod_read_unaligned::<[u8; 4]>(buffer.instance_bytes(c, instance)));
    Value::decode(variable.type_def(), &mut components)
}

/// Read-only reflection iterator over a chosen set of variables.
pub struct DataSetVariableIterator<'a> {
    data_set: &'a DataSet,
    buffer: &'a DataBuffer,
    variables: Vec<(Variable, &'a VariableLayoutInfo)>,
    curr: usize,
}

impl<'a> DataSetVariableIterator<'a> {
    pub fn new(data_set: &'a DataSet, start: usize, select: BufferSelect) -> Self {
        Self {
            data_set,
            buffer: data_set.buffer(select),
            variables: Vec::new(),
            curr: start,
        }
    }

    /// Track a variable. Returns `false` if it is not in the data set.
    pub fn add_variable(&mut self, variable: &Variable) -> bool {
        match self.data_set.variable_layout(variable) {
            Some(info) => {
                self.variables.push((variable.clone(), info));
                true
            }
            None => false,
        }
    }

    pub fn add_variables<'v>(&mut self, variables: impl IntoIterator<Item = &'v Variable>) {
        for variable in variables {
            self.add_variable(variable);
        }
    }

    /// Tracked variables, in the order they were added.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().map(|(v, _)| v)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.curr < self.buffer.num_instances()
    }

    #[inline]
    pub fn advance(&mut self) {
        self.curr += 1;
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.curr
    }

    /// Value of a tracked variable at the cursor.
    pub fn get(&self, variable: &Variable) -> Option<Value> {
        let (_, info) = self.variables.iter().find(|(v, _)| v == variable)?;
        Some(read_value(self.buffer, variable, info, self.curr))
    }

    /// Values of every tracked variable at the cursor.
    pub fn values(&self) -> Vec<Value> {
        self.variables
            .iter()
            .map(|(variable, info)| read_value(self.buffer, variable, info, self.curr))
            .collect()
    }
}

/// Reflection iterator that can also write values.
pub struct DataSetVariableIteratorMut<'a> {
    layouts: &'a HashMap<Variable, VariableLayoutInfo>,
    buffer: &'a mut DataBuffer,
    curr: usize,
}

impl<'a> DataSetVariableIteratorMut<'a> {
    pub fn new(data_set: &'a mut DataSet, start: usize, select: BufferSelect) -> Self {
        let (layouts, buffer) = data_set.layouts_and_buffer_mut(select);
        Self {
            layouts,
            buffer,
            curr: start,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.curr < self.buffer.num_instances()
    }

    #[inline]
    pub fn advance(&mut self) {
        self.curr += 1;
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.curr
    }

    pub fn get(&self, variable: &Variable) -> Option<Value> {
        let info = self.layouts.get(variable)?;
        Some(read_value(self.buffer, variable, info, self.curr))
    }

    /// Write a value at the cursor. The value's shape must match the
    /// variable's type.
    pub fn set(&mut self, variable: &Variable, value: &Value) -> Result<(), DataSetError> {
        let info = self
            .layouts
            .get(variable)
            .ok_or_else(|| DataSetError::UnknownVariable {
                name: variable.name().to_string(),
            })?;
        let mut components = Vec::with_capacity(info.num_components());
        value.encode(variable.type_def(), &mut components)?;
        for (c, raw) in info.component_range().zip(components) {
            self.buffer.instance_bytes_mut(c, self.curr).copy_from_slice(&raw);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::iter::{DataSetIterator, DataSetIteratorMut};
    use crate::data::value::EncodedBool;
    use crate::math::Vec3;

    fn data_set() -> DataSet {
        let mut ds = DataSet::new();
        ds.add_variables([
            Variable::vec3("Position"),
            Variable::bool("Alive"),
            Variable::int("Id"),
        ]);
        ds.finalize();
        ds.allocate(3);
        ds.set_num_instances(3);
        ds
    }

    #[test]
    fn reads_what_typed_iterators_wrote() {
        let mut ds = data_set();
        {
            let mut it = DataSetIteratorMut::<Vec3>::named(&mut ds, "Position");
            it.set_at(1, Vec3::new(1.0, 2.0, 3.0));
        }
        let mut it = DataSetVariableIterator::new(&ds, 0, BufferSelect::Current);
        assert!(it.add_variable(&Variable::vec3("Position")));
        assert!(!it.add_variable(&Variable::float("Mass")));
        it.advance();
        let pos = it.get(&Variable::vec3("Position")).unwrap();
        assert_eq!(pos.field("Z").and_then(Value::as_f32), Some(3.0));
        assert!(it.get(&Variable::int("Id")).is_none());
        assert_eq!(it.values().len(), 1);
    }

    #[test]
    fn writes_are_visible_to_typed_iterators() {
        let mut ds = data_set();
        {
            let mut it = DataSetVariableIteratorMut::new(&mut ds, 0, BufferSelect::Current);
            while it.is_valid() {
                let i = it.index() as i32;
                it.set(&Variable::int("Id"), &Value::Int(i * 10)).unwrap();
                it.set(&Variable::bool("Alive"), &Value::Bool(EncodedBool(i))).unwrap();
                it.advance();
            }
        }
        let ids: Vec<i32> = DataSetIterator::<i32>::named(&ds, "Id").collect();
        assert_eq!(ids, vec![0, 10, 20]);
        let alive: Vec<EncodedBool> = DataSetIterator::<EncodedBool>::named(&ds, "Alive").collect();
        assert_eq!(alive, vec![EncodedBool(0), EncodedBool(1), EncodedBool(2)]);
    }

    #[test]
    fn set_rejects_unknown_and_mismatched() {
        let mut ds = data_set();
        let mut it = DataSetVariableIteratorMut::new(&mut ds, 0, BufferSelect::Current);
        assert!(matches!(
            it.set(&Variable::float("Mass"), &Value::Float(1.0)),
            Err(DataSetError::UnknownVariable { .. })
        ));
        assert!(matches!(
            it.set(&Variable::int("Id"), &Value::Float(1.0)),
            Err(DataSetError::ValueTypeMismatch { .. })
        ));
    }
}
