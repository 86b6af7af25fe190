// column.rs - Column descriptors and typed views over a byte arena
//
// Column placement math over a buffer's arena lives here. Typed iterators
// wrap a `ColumnView` instead of computing offsets themselves.

use super::types::SCALAR_SIZE;
use bytemuck::{Pod, Zeroable};
use std::ops::{Deref, DerefMut, Range};

/// SIMD vector width in bytes. Every column starts on, and is padded to,
/// a multiple of this.
pub const VECTOR_WIDTH_BYTES: usize = 16;

/// Instance bounds assertion for hot accessors.
///
/// Active in debug builds, or in any build with the `checked-access` feature.
macro_rules! access_assert {
    ($($arg:tt)*) => {
        #[cfg(any(debug_assertions, feature = "checked-access"))]
        {
            assert!($($arg)*);
        }
    };
}
pub(crate) use access_assert;

/// One vector-width chunk of arena storage; keeps the arena base aligned.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub(crate) struct Lane([u8; VECTOR_WIDTH_BYTES]);

// SAFETY: `Lane` is a 16-byte array with 16-byte alignment: no padding,
// every bit pattern valid.
unsafe impl Zeroable for Lane {}
unsafe impl Pod for Lane {}

/// Round a byte length up to the next multiple of the vector width.
#[inline]
pub fn padded_len(bytes: usize) -> usize {
    bytes.div_ceil(VECTOR_WIDTH_BYTES) * VECTOR_WIDTH_BYTES
}

/// Placement of one scalar component column inside a buffer's arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColumnDesc {
    /// Byte offset of the column start within the arena.
    pub offset: usize,
    /// Element stride in bytes (the component's scalar size).
    pub stride: usize,
    /// Number of elements the column has room for.
    pub capacity: usize,
}

impl ColumnDesc {
    /// Padded byte length of the column.
    #[inline]
    pub fn span(&self) -> usize {
        padded_len(self.stride * self.capacity)
    }

    #[inline]
    pub fn byte_range(&self) -> Range<usize> {
        self.offset..self.offset + self.span()
    }

    /// Arena byte range of one instance's element.
    #[inline]
    pub fn instance_range(&self, instance: usize) -> Range<usize> {
        let start = self.offset + instance * self.stride;
        start..start + self.stride
    }
}

/// View over the consecutive columns of one variable.
///
/// Each column is cut to exactly `capacity` scalars when the view is built,
/// so a per-instance access is one slice index. `C` is `&[u32]` for reads
/// or `&mut [u32]` for writes. Every component is one 4-byte scalar held by
/// its bit pattern, so ints and bools never pass through a float.
pub struct ColumnView<C> {
    columns: Vec<C>,
    /// Byte offset of each component inside one packed value of the type.
    field_offsets: Vec<usize>,
    capacity: usize,
}

pub type ColumnRef<'a> = ColumnView<&'a [u32]>;
pub type ColumnMut<'a> = ColumnView<&'a mut [u32]>;

/// Scalar columns of `columns` inside `arena`, each trimmed to its capacity.
pub(crate) fn split_columns<'a>(arena: &'a [u32], columns: &[ColumnDesc]) -> Vec<&'a [u32]> {
    columns
        .iter()
        .map(|col| {
            debug_assert_eq!(col.stride, SCALAR_SIZE);
            let start = col.offset / SCALAR_SIZE;
            &arena[start..start + col.capacity]
        })
        .collect()
}

/// Mutable form of [`split_columns`]. `columns` must be in arena order.
pub(crate) fn split_columns_mut<'a>(
    mut arena: &'a mut [u32],
    columns: &[ColumnDesc],
) -> Vec<&'a mut [u32]> {
    let mut base = 0;
    let mut out = Vec::with_capacity(columns.len());
    for col in columns {
        debug_assert_eq!(col.stride, SCALAR_SIZE);
        let start = col.offset / SCALAR_SIZE;
        let (_, tail) = std::mem::take(&mut arena).split_at_mut(start - base);
        let (column, rest) = tail.split_at_mut(col.capacity);
        out.push(column);
        arena = rest;
        base = start + col.capacity;
    }
    out
}

impl<C: Deref<Target = [u32]>> ColumnView<C> {
    pub(crate) fn new(columns: Vec<C>, field_offsets: &[u32], capacity: usize) -> Self {
        debug_assert_eq!(columns.len(), field_offsets.len());
        Self {
            columns,
            field_offsets: field_offsets.iter().map(|&f| f as usize).collect(),
            capacity,
        }
    }

    /// A view with no storage behind it; every access is out of range.
    pub(crate) fn unallocated(field_offsets: &[u32]) -> Self
    where
        C: Default,
    {
        let columns = field_offsets.iter().map(|_| C::default()).collect();
        Self::new(columns, field_offsets, 0)
    }

    /// Number of component columns in the view.
    #[inline]
    pub fn num_components(&self) -> usize {
        self.columns.len()
    }

    /// Instances each column has room for.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn check(&self, instance: usize) {
        access_assert!(
            instance < self.capacity,
            "instance {} out of range (allocated {})",
            instance,
            self.capacity
        );
    }

    /// Raw scalar bits of one component column.
    #[inline]
    pub fn column(&self, component: usize) -> &[u32] {
        &self.columns[component]
    }

    #[inline]
    pub fn read_bits(&self, component: usize, instance: usize) -> u32 {
        self.check(instance);
        self.columns[component][instance]
    }

    #[inline]
    pub fn read_f32(&self, component: usize, instance: usize) -> f32 {
        f32::from_bits(self.read_bits(component, instance))
    }

    #[inline]
    pub fn read_i32(&self, component: usize, instance: usize) -> i32 {
        self.read_bits(component, instance) as i32
    }

    /// Gather every component of one instance into a packed value's bytes.
    pub fn read_packed(&self, instance: usize, out: &mut [u8]) {
        self.check(instance);
        for (column, &field) in self.columns.iter().zip(&self.field_offsets) {
            out[field..field + SCALAR_SIZE].copy_from_slice(bytemuck::bytes_of(&column[instance]));
        }
    }
}

impl<C: DerefMut<Target = [u32]>> ColumnView<C> {
    #[inline]
    pub fn write_bits(&mut self, component: usize, instance: usize, bits: u32) {
        self.check(instance);
        self.columns[component][instance] = bits;
    }

    #[inline]
    pub fn write_f32(&mut self, component: usize, instance: usize, value: f32) {
        self.write_bits(component, instance, value.to_bits());
    }

    #[inline]
    pub fn write_i32(&mut self, component: usize, instance: usize, value: i32) {
        self.write_bits(component, instance, value as u32);
    }

    /// Scatter a packed value's bytes into every component column.
    pub fn write_packed(&mut self, instance: usize, src: &[u8]) {
        self.check(instance);
        for (column, &field) in self.columns.iter_mut().zip(&self.field_offsets) {
            column[instance] = bytemuck::pod_read_unaligned(&src[field..field + SCALAR_SIZE]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_rounds_to_vector_width() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), VECTOR_WIDTH_BYTES);
        assert_eq!(padded_len(16), 16);
        assert_eq!(padded_len(20), 32);
    }

    #[test]
    fn desc_ranges() {
        let desc = ColumnDesc {
            offset: 32,
            stride: 4,
            capacity: 5,
        };
        assert_eq!(desc.span(), 32);
        assert_eq!(desc.byte_range(), 32..64);
        assert_eq!(desc.instance_range(2), 40..44);
    }

    fn two_float_columns() -> [ColumnDesc; 2] {
        [
            ColumnDesc {
                offset: 0,
                stride: 4,
                capacity: 2,
            },
            ColumnDesc {
                offset: 16,
                stride: 4,
                capacity: 2,
            },
        ]
    }

    #[test]
    fn packed_gather_scatter() {
        let columns = two_float_columns();
        let mut arena = vec![0u32; 8];
        let mut view = ColumnView::new(split_columns_mut(&mut arena, &columns), &[0, 4], 2);
        view.write_packed(1, bytemuck::bytes_of(&[1.5f32, -2.0f32]));
        view.write_f32(0, 0, 7.0);
        assert_eq!(view.read_f32(1, 1), -2.0);

        let view = ColumnView::new(split_columns(&arena, &columns), &[0, 4], 2);
        let mut out = [0f32; 2];
        view.read_packed(1, bytemuck::bytes_of_mut(&mut out));
        assert_eq!(out, [1.5, -2.0]);
        assert_eq!(view.read_f32(0, 0), 7.0);
        assert_eq!(view.column(1).len(), 2);
        assert_eq!(arena[5], (-2.0f32).to_bits());
    }

    #[test]
    fn mutable_split_skips_padding() {
        let columns = [
            ColumnDesc {
                offset: 16,
                stride: 4,
                capacity: 3,
            },
            ColumnDesc {
                offset: 48,
                stride: 4,
                capacity: 3,
            },
        ];
        let mut arena = vec![0u32; 16];
        let cols = split_columns_mut(&mut arena, &columns);
        assert_eq!(cols.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![3, 3]);
        let mut view = ColumnView::new(cols, &[0, 4], 3);
        view.write_i32(1, 2, -7);
        view.write_i32(0, 0, 9);
        assert_eq!(arena[14], -7i32 as u32);
        assert_eq!(arena[4], 9);
    }

    #[test]
    fn unallocated_view_has_empty_columns() {
        let view = ColumnRef::unallocated(&[0, 4, 8]);
        assert_eq!(view.num_components(), 3);
        assert_eq!(view.capacity(), 0);
        assert!(view.column(2).is_empty());
    }
}
