// buffer.rs - One frame of particle data as a padded SoA byte arena
//
// The arena holds one column per scalar component, in component order.
// Columns start on vector-width boundaries and are padded so that a
// vectorized write past the last instance never lands in the next column.
//
// The buffer does not know its owner: component sizes are passed in by
// the data set on `allocate`, and strides are kept in the column table.

use super::column::{
    access_assert, split_columns, split_columns_mut, ColumnDesc, ColumnMut, ColumnRef,
    ColumnView, Lane,
};
use super::error::DataSetError;
use super::variable::VariableLayoutInfo;
use bytemuck::Zeroable;

/// A single frame's worth of per-instance data.
#[derive(Default)]
pub struct DataBuffer {
    columns: Vec<ColumnDesc>,
    data: Vec<Lane>,
    num_instances: usize,
    num_instances_allocated: usize,
    initialized: bool,
}

impl DataBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare an offset table for `num_components` columns. Allocates no data.
    ///
    /// A repeated call with the same count keeps the current allocation; a
    /// different count drops it.
    pub fn init(&mut self, num_components: usize) {
        if self.initialized && self.columns.len() == num_components {
            return;
        }
        self.columns = vec![ColumnDesc::default(); num_components];
        self.data = Vec::new();
        self.num_instances = 0;
        self.num_instances_allocated = 0;
        self.initialized = true;
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Size the arena for `num_instances` and lay out every column.
    ///
    /// Existing instance data is *not* preserved in place.
    pub fn allocate(&mut self, num_instances: usize, component_sizes: &[usize]) {
        assert!(self.initialized, "DataBuffer::allocate called before init");
        assert_eq!(
            component_sizes.len(),
            self.columns.len(),
            "component size table does not match the offset table"
        );

        let mut offset = 0;
        for (col, &stride) in self.columns.iter_mut().zip(component_sizes) {
            *col = ColumnDesc {
                offset,
                stride,
                capacity: num_instances,
            };
            offset += col.span();
        }
        debug_assert_eq!(offset % std::mem::size_of::<Lane>(), 0);

        self.data
            .resize(offset / std::mem::size_of::<Lane>(), Lane::zeroed());
        self.num_instances_allocated = num_instances;
        self.num_instances = self.num_instances.min(num_instances);
    }

    /// Column table (the offset table plus strides and capacity).
    #[inline]
    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    /// Byte offsets of every column start.
    pub fn offset_table(&self) -> Vec<usize> {
        self.columns.iter().map(|c| c.offset).collect()
    }

    #[inline]
    pub fn num_components(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn num_instances(&self) -> usize {
        self.num_instances
    }

    #[inline]
    pub fn num_instances_allocated(&self) -> usize {
        self.num_instances_allocated
    }

    /// Set the live count without reallocating.
    pub fn set_num_instances(&mut self, num_instances: usize) {
        assert!(
            num_instances <= self.num_instances_allocated,
            "cannot set {} live instances with only {} allocated",
            num_instances,
            self.num_instances_allocated
        );
        self.num_instances = num_instances;
    }

    /// Total arena footprint in bytes, including unused slack.
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<Lane>()
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.data)
    }

    /// Start of a component column, or `None` if nothing is allocated.
    pub fn component_bytes(&self, component: usize) -> Option<&[u8]> {
        if self.data.is_empty() {
            return None;
        }
        let range = self.columns[component].byte_range();
        Some(&self.bytes()[range])
    }

    pub fn component_bytes_mut(&mut self, component: usize) -> Option<&mut [u8]> {
        if self.data.is_empty() {
            return None;
        }
        let range = self.columns[component].byte_range();
        Some(&mut self.bytes_mut()[range])
    }

    /// Checked form of [`component_bytes`](Self::component_bytes).
    pub fn try_component_bytes(&self, component: usize) -> Result<&[u8], DataSetError> {
        if component >= self.columns.len() {
            return Err(DataSetError::ComponentOutOfRange {
                component,
                num_components: self.columns.len(),
            });
        }
        self.component_bytes(component)
            .ok_or(DataSetError::NotAllocated)
    }

    /// Raw column pointer for batch processing; null if nothing is allocated.
    pub fn component_ptr(&self, component: usize) -> *const u8 {
        if self.data.is_empty() {
            return std::ptr::null();
        }
        let offset = self.columns[component].offset;
        // SAFETY: column offsets lie within the allocated arena.
        unsafe { self.data.as_ptr().cast::<u8>().add(offset) }
    }

    /// Mutable column pointer. Derived from the arena base without going
    /// through a slice, so earlier pointers into other columns stay usable.
    pub fn component_ptr_mut(&mut self, component: usize) -> *mut u8 {
        if self.data.is_empty() {
            return std::ptr::null_mut();
        }
        let offset = self.columns[component].offset;
        // SAFETY: as in `component_ptr`; `Vec::as_mut_ptr` creates no
        // intermediate reference to the arena.
        unsafe { self.data.as_mut_ptr().cast::<u8>().add(offset) }
    }

    /// One instance's element of a component column.
    ///
    /// Only the allocated capacity is asserted, and only in debug builds
    /// (or with `checked-access`).
    #[inline]
    pub fn instance_bytes(&self, component: usize, instance: usize) -> &[u8] {
        self.assert_instance(instance);
        let range = self.columns[component].instance_range(instance);
        &self.bytes()[range]
    }

    #[inline]
    pub fn instance_bytes_mut(&mut self, component: usize, instance: usize) -> &mut [u8] {
        self.assert_instance(instance);
        let range = self.columns[component].instance_range(instance);
        &mut self.bytes_mut()[range]
    }

    /// Checked form of [`instance_bytes`](Self::instance_bytes).
    pub fn try_instance_bytes(
        &self,
        component: usize,
        instance: usize,
    ) -> Result<&[u8], DataSetError> {
        self.try_component_bytes(component)?;
        if instance >= self.num_instances_allocated {
            return Err(DataSetError::InstanceOutOfRange {
                instance,
                allocated: self.num_instances_allocated,
            });
        }
        Ok(self.instance_bytes(component, instance))
    }

    /// Pointer to `instance` within a column; null if nothing is allocated.
    pub fn instance_ptr(&self, component: usize, instance: usize) -> *const u8 {
        if self.data.is_empty() {
            return std::ptr::null();
        }
        self.assert_instance(instance);
        let col = &self.columns[component];
        let offset = col.offset + instance * col.stride;
        // SAFETY: `instance` is within the column's capacity.
        unsafe { self.data.as_ptr().cast::<u8>().add(offset) }
    }

    pub fn instance_ptr_mut(&mut self, component: usize, instance: usize) -> *mut u8 {
        if self.data.is_empty() {
            return std::ptr::null_mut();
        }
        self.assert_instance(instance);
        let col = &self.columns[component];
        let offset = col.offset + instance * col.stride;
        // SAFETY: as in `instance_ptr`.
        unsafe { self.data.as_mut_ptr().cast::<u8>().add(offset) }
    }

    #[inline]
    #[cfg_attr(
        not(any(debug_assertions, feature = "checked-access")),
        allow(unused_variables)
    )]
    fn assert_instance(&self, instance: usize) {
        access_assert!(
            instance < self.num_instances_allocated,
            "instance {} out of range (allocated {})",
            instance,
            self.num_instances_allocated
        );
    }

    /// Remove an instance by moving the last live instance into its slot.
    ///
    /// Surviving instances are reordered.
    pub fn kill_instance(&mut self, instance: usize) {
        assert!(
            instance < self.num_instances,
            "kill_instance({}) with {} live instances",
            instance,
            self.num_instances
        );
        let last = self.num_instances - 1;
        if instance != last {
            let columns = std::mem::take(&mut self.columns);
            let bytes = self.bytes_mut();
            for col in &columns {
                bytes.copy_within(col.instance_range(last), col.instance_range(instance).start);
            }
            self.columns = columns;
        }
        self.num_instances = last;
    }

    /// Copy another buffer's live instances (same layout) into this one.
    pub(crate) fn copy_live_from(&mut self, src: &DataBuffer, component_sizes: &[usize]) {
        let live = src.num_instances;
        self.allocate(live, component_sizes);
        self.num_instances = live;
        if self.size_bytes() == src.size_bytes() && self.columns == src.columns {
            self.data.copy_from_slice(&src.data);
            return;
        }
        let columns = self.columns.clone();
        let dst = self.bytes_mut();
        for (dst_col, src_col) in columns.iter().zip(&src.columns) {
            let len = live * src_col.stride;
            dst[dst_col.offset..dst_col.offset + len]
                .copy_from_slice(&src.bytes()[src_col.offset..src_col.offset + len]);
        }
    }

    /// Read view over one variable's columns.
    pub fn view(&self, info: &VariableLayoutInfo) -> ColumnRef<'_> {
        let field_offsets = info.layout().component_offsets();
        if self.data.is_empty() {
            return ColumnView::unallocated(field_offsets);
        }
        let arena: &[u32] = bytemuck::cast_slice(&self.data);
        let columns = split_columns(arena, &self.columns[info.component_range()]);
        ColumnView::new(columns, field_offsets, self.num_instances_allocated)
    }

    /// Write view over one variable's columns.
    pub fn view_mut(&mut self, info: &VariableLayoutInfo) -> ColumnMut<'_> {
        let field_offsets = info.layout().component_offsets();
        if self.data.is_empty() {
            return ColumnView::unallocated(field_offsets);
        }
        let capacity = self.num_instances_allocated;
        let arena: &mut [u32] = bytemuck::cast_slice_mut(&mut self.data);
        let columns = split_columns_mut(arena, &self.columns[info.component_range()]);
        ColumnView::new(columns, field_offsets, capacity)
    }

    /// Drop the arena but keep the (zeroed) offset table.
    pub(crate) fn release(&mut self) {
        self.data = Vec::new();
        self.columns.iter_mut().for_each(|c| *c = ColumnDesc::default());
        self.num_instances = 0;
        self.num_instances_allocated = 0;
    }

    /// Drop everything; `init` must be called again before reuse.
    pub fn reset(&mut self) {
        self.columns = Vec::new();
        self.data = Vec::new();
        self.num_instances = 0;
        self.num_instances_allocated = 0;
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::column::{padded_len, VECTOR_WIDTH_BYTES};

    fn filled(sizes: &[usize], n: usize) -> DataBuffer {
        let mut buf = DataBuffer::new();
        buf.init(sizes.len());
        buf.allocate(n, sizes);
        buf.set_num_instances(n);
        for c in 0..sizes.len() {
            for i in 0..n {
                let v = (c * 100 + i) as f32;
                buf.instance_bytes_mut(c, i).copy_from_slice(&v.to_ne_bytes());
            }
        }
        buf
    }

    fn read(buf: &DataBuffer, c: usize, i: usize) -> f32 {
        bytemuck::pod_read_unaligned(buf.instance_bytes(c, i))
    }

    #[test]
    fn unallocated_buffer_has_no_columns() {
        let mut buf = DataBuffer::new();
        buf.init(2);
        assert!(buf.component_bytes(0).is_none());
        assert!(buf.component_ptr(1).is_null());
        assert_eq!(buf.offset_table(), vec![0, 0]);
        assert!(matches!(buf.try_component_bytes(0), Err(DataSetError::NotAllocated)));
        assert!(matches!(
            buf.try_component_bytes(9),
            Err(DataSetError::ComponentOutOfRange { .. })
        ));
    }

    #[test]
    fn columns_are_vector_aligned_and_padded() {
        let sizes = [4, 4, 4];
        let mut buf = DataBuffer::new();
        buf.init(sizes.len());
        buf.allocate(5, &sizes);
        let offsets = buf.offset_table();
        for w in offsets.windows(2) {
            assert_eq!(w[0] % VECTOR_WIDTH_BYTES, 0);
            assert!(w[1] - w[0] >= padded_len(4 * 5));
        }
        assert_eq!(buf.size_bytes(), 3 * padded_len(20));
        assert_eq!(buf.component_ptr(0) as usize % VECTOR_WIDTH_BYTES, 0);
    }

    #[test]
    fn allocate_is_deterministic() {
        let sizes = [4, 4, 4, 4];
        let mut buf = DataBuffer::new();
        buf.init(sizes.len());
        buf.allocate(37, &sizes);
        let first = buf.offset_table();
        buf.allocate(37, &sizes);
        assert_eq!(first, buf.offset_table());
    }

    #[test]
    fn kill_swaps_last_into_slot() {
        let mut buf = filled(&[4, 4], 5);
        buf.kill_instance(1);
        assert_eq!(buf.num_instances(), 4);
        assert_eq!(read(&buf, 0, 1), 4.0);
        assert_eq!(read(&buf, 1, 1), 104.0);
        buf.kill_instance(3);
        assert_eq!(buf.num_instances(), 3);
        assert_eq!(read(&buf, 0, 2), 2.0);
    }

    #[test]
    #[should_panic(expected = "kill_instance")]
    fn kill_out_of_range_asserts() {
        let mut buf = filled(&[4], 2);
        buf.kill_instance(2);
    }

    #[test]
    fn checked_instance_access() {
        let buf = filled(&[4], 3);
        assert!(buf.try_instance_bytes(0, 2).is_ok());
        assert!(matches!(
            buf.try_instance_bytes(0, 3),
            Err(DataSetError::InstanceOutOfRange { instance: 3, allocated: 3 })
        ));
    }

    #[test]
    fn instance_ptr_steps_by_stride() {
        let buf = filled(&[4, 4], 4);
        let base = buf.component_ptr(1);
        assert_eq!(buf.instance_ptr(1, 3), base.wrapping_add(12));
    }

    #[test]
    fn mut_pointers_to_different_columns_coexist() {
        let mut buf = filled(&[4, 4, 4], 4);
        let a = buf.instance_ptr_mut(0, 1);
        let b = buf.instance_ptr_mut(1, 2);
        let c = buf.component_ptr_mut(2);
        // SAFETY: distinct elements inside the allocated arena, buffer untouched meanwhile.
        unsafe {
            a.cast::<f32>().write_unaligned(-1.0);
            b.cast::<f32>().write_unaligned(-2.0);
            c.cast::<f32>().write_unaligned(-3.0);
            a.cast::<f32>().write_unaligned(-4.0);
        }
        assert_eq!(read(&buf, 0, 1), -4.0);
        assert_eq!(read(&buf, 1, 2), -2.0);
        assert_eq!(read(&buf, 2, 0), -3.0);
        assert_eq!(read(&buf, 0, 0), 0.0);
    }

    #[test]
    fn unallocated_instance_ptr_is_null() {
        let mut buf = DataBuffer::new();
        buf.init(1);
        assert!(buf.instance_ptr(0, 3).is_null());
        assert!(buf.instance_ptr_mut(0, 3).is_null());
    }

    #[test]
    #[cfg(any(debug_assertions, feature = "checked-access"))]
    #[should_panic(expected = "out of range")]
    fn instance_ptr_past_capacity_asserts() {
        let buf = filled(&[4], 3);
        let _ = buf.instance_ptr(0, 3);
    }

    #[test]
    #[cfg(any(debug_assertions, feature = "checked-access"))]
    #[should_panic(expected = "out of range")]
    fn instance_ptr_mut_past_capacity_asserts() {
        let mut buf = filled(&[4, 4], 2);
        let _ = buf.instance_ptr_mut(1, 5);
    }

    #[test]
    #[should_panic(expected = "before init")]
    fn allocate_before_init_panics() {
        let mut buf = DataBuffer::new();
        buf.allocate(4, &[4]);
    }

    #[test]
    fn init_is_idempotent_for_same_size() {
        let mut buf = filled(&[4, 4], 3);
        let columns = buf.columns().to_vec();
        buf.init(2);
        assert_eq!(buf.columns(), &columns[..]);
        assert_eq!(read(&buf, 1, 2), 102.0);

        buf.init(3);
        assert_eq!(buf.num_components(), 3);
        assert!(buf.columns().iter().all(|c| *c == ColumnDesc::default()));
        assert_eq!(buf.size_bytes(), 0);
        assert_eq!(buf.num_instances_allocated(), 0);
    }

    #[test]
    fn reset_requires_init() {
        let mut buf = filled(&[4], 2);
        buf.reset();
        assert!(!buf.is_initialized());
        assert_eq!(buf.size_bytes(), 0);
        assert_eq!(buf.num_instances(), 0);
    }
}
