// typed.rs - Strongly-typed iterators over one variable's columns
//
// `Attribute::load`/`store` default to a layout-driven gather/scatter that
// works for any packed `Pod` struct. The common scalar, vector and color
// types override them with direct reads from the view's column slices,
// which are cut once when the iterator is built.

use crate::data::column::{ColumnMut, ColumnRef, ColumnView};
use crate::data::data_set::{BufferSelect, DataSet};
use crate::data::error::DataSetError;
use crate::data::types::{TypeDefinition, TypeLayoutInfo};
use crate::data::value::EncodedBool;
use crate::data::variable::{Variable, VariableLayoutInfo};
use crate::math::{LinearColor, Vec2, Vec3, Vec4};
use bytemuck::Pod;
use std::marker::PhantomData;
use std::ops::Deref;

/// Cursor value of an iterator built for a missing variable.
pub const INDEX_NONE: usize = usize::MAX;

/// A Rust type that can be read from and written to data set columns.
///
/// Implementors must be tightly packed: `size_of::<Self>()` equals the
/// flattened size of `type_def()`, with fields in declaration order.
pub trait Attribute: Pod {
    fn type_def() -> TypeDefinition;

    fn load<B: Deref<Target = [u32]>>(view: &ColumnView<B>, instance: usize) -> Self {
        let mut value = <Self as bytemuck::Zeroable>::zeroed();
        view.read_packed(instance, bytemuck::bytes_of_mut(&mut value));
        value
    }

    fn store(&self, view: &mut ColumnMut<'_>, instance: usize) {
        view.write_packed(instance, bytemuck::bytes_of(self));
    }
}

impl Attribute for f32 {
    fn type_def() -> TypeDefinition {
        TypeDefinition::float()
    }

    #[inline]
    fn load<B: Deref<Target = [u32]>>(view: &ColumnView<B>, instance: usize) -> Self {
        view.read_f32(0, instance)
    }

    #[inline]
    fn store(&self, view: &mut ColumnMut<'_>, instance: usize) {
        view.write_f32(0, instance, *self);
    }
}

impl Attribute for i32 {
    fn type_def() -> TypeDefinition {
        TypeDefinition::int()
    }

    #[inline]
    fn load<B: Deref<Target = [u32]>>(view: &ColumnView<B>, instance: usize) -> Self {
        view.read_i32(0, instance)
    }

    #[inline]
    fn store(&self, view: &mut ColumnMut<'_>, instance: usize) {
        view.write_i32(0, instance, *self);
    }
}

// Bools take the generic path; the raw bits round-trip untouched.
impl Attribute for EncodedBool {
    fn type_def() -> TypeDefinition {
        TypeDefinition::bool()
    }
}

impl Attribute for Vec2 {
    fn type_def() -> TypeDefinition {
        TypeDefinition::vec2()
    }

    #[inline]
    fn load<B: Deref<Target = [u32]>>(view: &ColumnView<B>, instance: usize) -> Self {
        Vec2::new(view.read_f32(0, instance), view.read_f32(1, instance))
    }

    #[inline]
    fn store(&self, view: &mut ColumnMut<'_>, instance: usize) {
        view.write_f32(0, instance, self.x);
        view.write_f32(1, instance, self.y);
    }
}

impl Attribute for Vec3 {
    fn type_def() -> TypeDefinition {
        TypeDefinition::vec3()
    }

    #[inline]
    fn load<B: Deref<Target = [u32]>>(view: &ColumnView<B>, instance: usize) -> Self {
        Vec3::new(
            view.read_f32(0, instance),
            view.read_f32(1, instance),
            view.read_f32(2, instance),
        )
    }

    #[inline]
    fn store(&self, view: &mut ColumnMut<'_>, instance: usize) {
        view.write_f32(0, instance, self.x);
        view.write_f32(1, instance, self.y);
        view.write_f32(2, instance, self.z);
    }
}

impl Attribute for Vec4 {
    fn type_def() -> TypeDefinition {
        TypeDefinition::vec4()
    }

    #[inline]
    fn load<B: Deref<Target = [u32]>>(view: &ColumnView<B>, instance: usize) -> Self {
        Vec4::new(
            view.read_f32(0, instance),
            view.read_f32(1, instance),
            view.read_f32(2, instance),
            view.read_f32(3, instance),
        )
    }

    #[inline]
    fn store(&self, view: &mut ColumnMut<'_>, instance: usize) {
        view.write_f32(0, instance, self.x);
        view.write_f32(1, instance, self.y);
        view.write_f32(2, instance, self.z);
        view.write_f32(3, instance, self.w);
    }
}

impl Attribute for LinearColor {
    fn type_def() -> TypeDefinition {
        TypeDefinition::color()
    }

    #[inline]
    fn load<B: Deref<Target = [u32]>>(view: &ColumnView<B>, instance: usize) -> Self {
        LinearColor::new(
            view.read_f32(0, instance),
            view.read_f32(1, instance),
            view.read_f32(2, instance),
            view.read_f32(3, instance),
        )
    }

    #[inline]
    fn store(&self, view: &mut ColumnMut<'_>, instance: usize) {
        view.write_f32(0, instance, self.r);
        view.write_f32(1, instance, self.g);
        view.write_f32(2, instance, self.b);
        view.write_f32(3, instance, self.a);
    }
}

/// The Rust type must flatten to the same scalar kinds at the same packed
/// offsets as the variable. Struct names and how fields were spelled
/// (inline or by registered name) do not matter.
fn check_attribute<T: Attribute>(variable: &Variable, info: &VariableLayoutInfo) {
    let expected = layout_of::<T>();
    let actual = info.layout();
    assert!(
        expected.component_kinds() == actual.component_kinds()
            && expected.component_offsets() == actual.component_offsets(),
        "attribute type does not match variable {}",
        variable
    );
    debug_assert_eq!(
        std::mem::size_of::<T>(),
        info.layout().packed_size(),
        "attribute for {} is not tightly packed",
        variable
    );
}

/// Cursor state shared by the read and write iterators.
#[derive(Clone, Copy, Debug)]
struct Cursor {
    curr: usize,
    num_instances: usize,
}

impl Cursor {
    fn missing() -> Self {
        Self {
            curr: INDEX_NONE,
            num_instances: 0,
        }
    }

    #[inline]
    fn is_valid(&self) -> bool {
        self.curr < self.num_instances
    }
}

/// Read-only typed iterator over one variable in one buffer.
///
/// For a variable missing from the data set the iterator starts exhausted:
/// check [`is_valid`](Self::is_valid) before the first `get`.
pub struct DataSetIterator<'a, T: Attribute> {
    view: ColumnRef<'a>,
    cursor: Cursor,
    _marker: PhantomData<T>,
}

impl<'a, T: Attribute> DataSetIterator<'a, T> {
    pub fn new(
        data_set: &'a DataSet,
        variable: &Variable,
        start: usize,
        select: BufferSelect,
    ) -> Self {
        let Some(info) = data_set.variable_layout(variable) else {
            return Self {
                view: ColumnView::unallocated(&[]),
                cursor: Cursor::missing(),
                _marker: PhantomData,
            };
        };
        check_attribute::<T>(variable, info);
        let buffer = data_set.buffer(select);
        Self {
            view: buffer.view(info),
            cursor: Cursor {
                curr: start,
                num_instances: buffer.num_instances(),
            },
            _marker: PhantomData,
        }
    }

    /// Iterator over the current buffer from instance 0, by variable name.
    pub fn named(data_set: &'a DataSet, name: &str) -> Self {
        Self::new(data_set, &Variable::new(T::type_def(), name), 0, BufferSelect::Current)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.cursor.is_valid()
    }

    #[inline]
    pub fn advance(&mut self) {
        self.cursor.curr += 1;
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.cursor.curr
    }

    /// Live instances in the buffer this iterator reads.
    #[inline]
    pub fn num_instances(&self) -> usize {
        self.cursor.num_instances
    }

    #[inline]
    pub fn get(&self) -> T {
        T::load(&self.view, self.cursor.curr)
    }

    /// Read an arbitrary instance without moving the cursor.
    #[inline]
    pub fn get_at(&self, instance: usize) -> T {
        T::load(&self.view, instance)
    }

    /// Checked form of [`get_at`](Self::get_at) against the live count.
    pub fn try_get_at(&self, instance: usize) -> Result<T, DataSetError> {
        if instance >= self.cursor.num_instances {
            return Err(DataSetError::InstanceOutOfRange {
                instance,
                allocated: self.cursor.num_instances,
            });
        }
        Ok(self.get_at(instance))
    }
}

impl<T: Attribute> Iterator for DataSetIterator<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if !self.is_valid() {
            return None;
        }
        let value = self.get();
        self.advance();
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.cursor.num_instances.saturating_sub(self.cursor.curr);
        (remaining, Some(remaining))
    }
}

/// Read/write typed iterator over one variable in one buffer.
pub struct DataSetIteratorMut<'a, T: Attribute> {
    view: ColumnMut<'a>,
    cursor: Cursor,
    _marker: PhantomData<T>,
}

impl<'a, T: Attribute> DataSetIteratorMut<'a, T> {
    pub fn new(
        data_set: &'a mut DataSet,
        variable: &Variable,
        start: usize,
        select: BufferSelect,
    ) -> Self {
        let (layouts, buffer) = data_set.layouts_and_buffer_mut(select);
        let Some(info) = layouts.get(variable) else {
            return Self {
                view: ColumnView::unallocated(&[]),
                cursor: Cursor::missing(),
                _marker: PhantomData,
            };
        };
        check_attribute::<T>(variable, info);
        let num_instances = buffer.num_instances();
        Self {
            view: buffer.view_mut(info),
            cursor: Cursor {
                curr: start,
                num_instances,
            },
            _marker: PhantomData,
        }
    }

    /// Iterator over the current buffer from instance 0, by variable name.
    pub fn named(data_set: &'a mut DataSet, name: &str) -> Self {
        Self::new(data_set, &Variable::new(T::type_def(), name), 0, BufferSelect::Current)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.cursor.is_valid()
    }

    #[inline]
    pub fn advance(&mut self) {
        self.cursor.curr += 1;
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.cursor.curr
    }

    #[inline]
    pub fn num_instances(&self) -> usize {
        self.cursor.num_instances
    }

    #[inline]
    pub fn get(&self) -> T {
        T::load(&self.view, self.cursor.curr)
    }

    #[inline]
    pub fn get_at(&self, instance: usize) -> T {
        T::load(&self.view, instance)
    }

    #[inline]
    pub fn set(&mut self, value: T) {
        let instance = self.cursor.curr;
        value.store(&mut self.view, instance);
    }

    #[inline]
    pub fn set_at(&mut self, instance: usize, value: T) {
        value.store(&mut self.view, instance);
    }
}

/// Flattened layout of an attribute type; handy for registering structs.
pub fn layout_of<T: Attribute>() -> TypeLayoutInfo {
    TypeLayoutInfo::from_type(&T::type_def())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::FieldDef;
    use bytemuck::Zeroable;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct Spark {
        seed: i32,
        velocity: [f32; 3],
        alive: EncodedBool,
    }

    impl Attribute for Spark {
        fn type_def() -> TypeDefinition {
            TypeDefinition::structure(
                "Spark",
                vec![
                    FieldDef::new("Seed", TypeDefinition::int()),
                    FieldDef::new("Velocity", TypeDefinition::vec3()),
                    FieldDef::new("Alive", TypeDefinition::bool()),
                ],
            )
        }
    }

    fn data_set(n: usize) -> DataSet {
        let mut ds = DataSet::new();
        ds.add_variables([
            Variable::float("Age"),
            Variable::int("Id"),
            Variable::vec2("Size"),
            Variable::vec3("Position"),
            Variable::vec4("Custom"),
            Variable::color("Color"),
            Variable::bool("Alive"),
            Variable::new(Spark::type_def(), "Spark"),
        ]);
        ds.finalize();
        ds.allocate(n);
        ds.set_num_instances(n);
        ds
    }

    fn round_trip<T: Attribute + PartialEq + std::fmt::Debug>(
        name: &str,
        make: impl Fn(usize) -> T,
    ) {
        let n = 9;
        let mut ds = data_set(n);
        {
            let mut it = DataSetIteratorMut::<T>::named(&mut ds, name);
            while it.is_valid() {
                let i = it.index();
                it.set(make(i));
                it.advance();
            }
        }
        let it = DataSetIterator::<T>::named(&ds, name);
        assert!(it.is_valid());
        let values: Vec<T> = it.collect();
        assert_eq!(values.len(), n);
        for (i, v) in values.iter().enumerate() {
            assert_eq!(*v, make(i));
        }
    }

    #[test]
    fn scalar_round_trip_is_bit_exact() {
        round_trip::<f32>("Age", |i| i as f32 * 0.1 - 3.0);
        round_trip::<i32>("Id", |i| i as i32 * -7);
    }

    #[test]
    fn vector_and_color_round_trip() {
        round_trip::<Vec2>("Size", |i| Vec2::new(i as f32, 0.5));
        round_trip::<Vec3>("Position", |i| Vec3::new(1.0, i as f32, -2.0));
        round_trip::<Vec4>("Custom", |i| Vec4::splat(i as f32));
        round_trip::<LinearColor>("Color", |i| LinearColor::new(0.1, 0.2, i as f32, 1.0));
    }

    #[test]
    fn generic_struct_and_bool_round_trip() {
        round_trip::<EncodedBool>("Alive", |i| EncodedBool(i as i32 - 1));
        round_trip::<Spark>("Spark", |i| Spark {
            seed: i as i32,
            velocity: [i as f32, 2.0, 3.0],
            alive: EncodedBool::from(i % 2 == 0),
        });
    }

    #[test]
    fn missing_variable_starts_exhausted() {
        let mut ds = data_set(4);
        let it = DataSetIterator::<f32>::named(&ds, "Mass");
        assert!(!it.is_valid());
        assert_eq!(it.index(), INDEX_NONE);
        assert_eq!(it.count(), 0);

        let it = DataSetIteratorMut::<Vec3>::named(&mut ds, "Velocity");
        assert!(!it.is_valid());
    }

    #[test]
    fn get_at_does_not_move_cursor() {
        let mut ds = data_set(5);
        {
            let mut it = DataSetIteratorMut::<f32>::named(&mut ds, "Age");
            for i in 0..5 {
                it.set_at(i, i as f32 * 2.0);
            }
        }
        let it =
            DataSetIterator::<f32>::new(&ds, &Variable::float("Age"), 2, BufferSelect::Current);
        assert_eq!(it.get(), 4.0);
        assert_eq!(it.get_at(4), 8.0);
        assert_eq!(it.index(), 2);
        assert!(it.try_get_at(5).is_err());
        assert_eq!(it.try_get_at(1), Ok(2.0));
    }

    #[test]
    fn unallocated_previous_buffer_is_empty() {
        let ds = data_set(3);
        let age = Variable::float("Age");
        let it = DataSetIterator::<f32>::new(&ds, &age, 0, BufferSelect::Previous);
        assert!(!it.is_valid());
    }

    #[test]
    #[should_panic(expected = "attribute type does not match")]
    fn mismatched_attribute_type_panics() {
        let ds = data_set(1);
        let age = Variable::float("Age");
        let _ = DataSetIterator::<Vec3>::new(&ds, &age, 0, BufferSelect::Current);
    }

    #[test]
    #[should_panic(expected = "attribute type does not match")]
    fn same_size_different_kinds_panics() {
        // Same packed size as Spark, but the first scalar is a float.
        let var = Variable::new(
            TypeDefinition::structure(
                "Drift",
                vec![
                    FieldDef::new("Phase", TypeDefinition::float()),
                    FieldDef::new("Velocity", TypeDefinition::vec3()),
                    FieldDef::new("Alive", TypeDefinition::bool()),
                ],
            ),
            "Drift",
        );
        let mut ds = DataSet::new();
        ds.add_variable(var.clone());
        ds.finalize();
        ds.allocate(1);
        let _ = DataSetIterator::<Spark>::new(&ds, &var, 0, BufferSelect::Current);
    }

    #[test]
    fn struct_with_named_fields_matches_inline_attribute() {
        let var = Variable::new(
            TypeDefinition::structure(
                "SparkByName",
                vec![
                    FieldDef::named("Seed", "int"),
                    FieldDef::named("Velocity", "vec3"),
                    FieldDef::named("Alive", "bool"),
                ],
            ),
            "Spark",
        );
        let mut ds = DataSet::new();
        ds.add_variable(var.clone());
        ds.finalize();
        ds.allocate(2);
        ds.set_num_instances(2);

        let spark = Spark {
            seed: -4,
            velocity: [0.5, 1.5, 2.5],
            alive: EncodedBool(7),
        };
        DataSetIteratorMut::<Spark>::new(&mut ds, &var, 0, BufferSelect::Current).set_at(1, spark);
        let it = DataSetIterator::<Spark>::new(&ds, &var, 0, BufferSelect::Current);
        assert_eq!(it.get_at(1), spark);
    }

    #[test]
    #[cfg(any(debug_assertions, feature = "checked-access"))]
    #[should_panic(expected = "out of range")]
    fn get_at_past_capacity_asserts() {
        let ds = data_set(3);
        let it = DataSetIterator::<f32>::named(&ds, "Age");
        let _ = it.get_at(3);
    }

    #[test]
    #[cfg(any(debug_assertions, feature = "checked-access"))]
    #[should_panic(expected = "out of range")]
    fn generic_set_at_past_capacity_asserts() {
        let mut ds = data_set(2);
        let mut it = DataSetIteratorMut::<EncodedBool>::named(&mut ds, "Alive");
        it.set_at(2, EncodedBool::TRUE);
    }

    #[test]
    fn previous_buffer_round_trip() {
        let mut ds = data_set(4);
        ds.tick();
        assert_eq!(ds.prev_num_instances(), 4);

        let position = Variable::vec3("Position");
        let spark = Variable::new(Spark::type_def(), "Spark");
        {
            let mut it =
                DataSetIteratorMut::<Vec3>::new(&mut ds, &position, 0, BufferSelect::Previous);
            assert_eq!(it.num_instances(), 4);
            while it.is_valid() {
                let i = it.index() as f32;
                it.set(Vec3::new(i, -i, 0.25));
                it.advance();
            }
        }
        {
            let mut it =
                DataSetIteratorMut::<Spark>::new(&mut ds, &spark, 0, BufferSelect::Previous);
            it.set_at(
                3,
                Spark {
                    seed: 11,
                    velocity: [1.0, 2.0, 3.0],
                    alive: EncodedBool(7),
                },
            );
        }

        let read: Vec<Vec3> =
            DataSetIterator::<Vec3>::new(&ds, &position, 0, BufferSelect::Previous).collect();
        assert_eq!(read.len(), 4);
        assert_eq!(read[3], Vec3::new(3.0, -3.0, 0.25));
        let sparks = DataSetIterator::<Spark>::new(&ds, &spark, 0, BufferSelect::Previous);
        assert_eq!(sparks.get_at(3).alive, EncodedBool(7));
        assert_eq!(sparks.get_at(3).seed, 11);

        // The current buffer was never allocated after the flip.
        assert!(!DataSetIterator::<Vec3>::named(&ds, "Position").is_valid());
    }

    #[test]
    fn spark_layout_is_packed() {
        assert_eq!(layout_of::<Spark>().packed_size(), std::mem::size_of::<Spark>());
    }
}
