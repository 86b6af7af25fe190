// register.rs - Register tables for batch (VM) processing
//
// A register table is the flat list of per-component column pointers
// handed to a vectorized processing engine: inputs point into the
// previous buffer, outputs into the current buffer. One register per
// scalar component, each a contiguous run of elements starting at the
// batch's first instance.

use super::data_set::DataSet;
use super::variable::Variable;
use bytemuck::Pod;

#[derive(Debug, Default)]
pub struct RegisterTable {
    inputs: Vec<*const u8>,
    input_sizes: Vec<u8>,
    outputs: Vec<*mut u8>,
    output_sizes: Vec<u8>,
}

impl RegisterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(registers: usize) -> Self {
        Self {
            inputs: Vec::with_capacity(registers),
            input_sizes: Vec::with_capacity(registers),
            outputs: Vec::with_capacity(registers),
            output_sizes: Vec::with_capacity(registers),
        }
    }

    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    #[inline]
    pub fn inputs(&self) -> &[*const u8] {
        &self.inputs
    }

    #[inline]
    pub fn input_sizes(&self) -> &[u8] {
        &self.input_sizes
    }

    #[inline]
    pub fn outputs(&self) -> &[*mut u8] {
        &self.outputs
    }

    #[inline]
    pub fn output_sizes(&self) -> &[u8] {
        &self.output_sizes
    }

    pub fn clear(&mut self) {
        self.inputs.clear();
        self.input_sizes.clear();
        self.outputs.clear();
        self.output_sizes.clear();
    }

    /// Typed view of an input register.
    ///
    /// # Safety
    /// - the data set the register came from must not have been
    ///   reallocated, reset, ticked or dropped since it was appended
    /// - `len` elements must lie within the allocated column
    /// - `T` must match the register's element size
    pub unsafe fn input<T: Pod>(&self, register: usize, len: usize) -> &[T] {
        debug_assert_eq!(self.input_sizes[register] as usize, std::mem::size_of::<T>());
        if len == 0 {
            return &[];
        }
        std::slice::from_raw_parts(self.inputs[register] as *const T, len)
    }

    /// Typed view of an output register.
    ///
    /// # Safety
    /// Same as [`input`](Self::input), and no other live reference may
    /// alias the same register.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn output<T: Pod>(&self, register: usize, len: usize) -> &mut [T] {
        debug_assert_eq!(self.output_sizes[register] as usize, std::mem::size_of::<T>());
        if len == 0 {
            return &mut [];
        }
        std::slice::from_raw_parts_mut(self.outputs[register] as *mut T, len)
    }
}

impl DataSet {
    /// Append one input register (previous buffer) and, unless `no_output`,
    /// one output register (current buffer) per scalar component of
    /// `variable`, offset to `start_instance`.
    ///
    /// Returns `false` if the variable is not in this data set; the caller
    /// skips it.
    pub fn append_to_register_table(
        &mut self,
        variable: &Variable,
        table: &mut RegisterTable,
        start_instance: usize,
        no_output: bool,
    ) -> bool {
        let Some(range) = self.variable_layout(variable).map(|info| info.component_range()) else {
            return false;
        };
        let sizes: Vec<u8> = self.component_sizes()[range.clone()]
            .iter()
            .map(|&s| s as u8)
            .collect();

        let (prev, curr) = self.split_buffers_mut();
        for (component, size) in range.zip(sizes) {
            table.inputs.push(prev.instance_ptr(component, start_instance));
            table.input_sizes.push(size);
            if !no_output {
                table.outputs.push(curr.instance_ptr_mut(component, start_instance));
                table.output_sizes.push(size);
            }
        }
        true
    }
}
