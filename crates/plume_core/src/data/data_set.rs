// data_set.rs - Double-buffered particle data set
//
// Owns the variable list, the flattened component size table, the
// variable -> layout map and two `DataBuffer`s. One buffer is "current"
// (written this frame), the other "previous" (last frame, read-only input).
// `tick` flips the roles; it never copies or clears data.

use super::buffer::DataBuffer;
use super::types::TypeLayoutInfo;
use super::variable::{Variable, VariableLayoutInfo};
use crate::settings::DataSetSettings;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace, warn};

/// What a data set stores.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DataSetKind {
    #[default]
    ParticleData,
    Event,
}

/// Identity of a data set within a simulation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DataSetId {
    pub name: String,
    pub kind: DataSetKind,
}

impl DataSetId {
    pub fn new(name: impl Into<String>, kind: DataSetKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl fmt::Display for DataSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.name, self.kind)
    }
}

/// Which of the two buffer objects is meant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BufferSlot {
    #[default]
    Ping,
    Pong,
}

impl BufferSlot {
    #[inline]
    pub fn index(self) -> usize {
        match self {
            BufferSlot::Ping => 0,
            BufferSlot::Pong => 1,
        }
    }

    #[inline]
    pub fn other(self) -> Self {
        match self {
            BufferSlot::Ping => BufferSlot::Pong,
            BufferSlot::Pong => BufferSlot::Ping,
        }
    }
}

/// Buffer role relative to the current frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BufferSelect {
    #[default]
    Current,
    Previous,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    /// Variables may be added.
    Building,
    /// Layout fixed; allocate/simulate/tick cycles.
    Finalized,
}

pub struct DataSet {
    id: DataSetId,
    settings: DataSetSettings,
    variables: Vec<Variable>,
    component_sizes: Vec<usize>,
    layouts: HashMap<Variable, VariableLayoutInfo>,
    buffers: [DataBuffer; 2],
    current: BufferSlot,
    state: Lifecycle,
}

impl DataSet {
    /// Create an empty, unfinalized data set.
    pub fn new() -> Self {
        Self::with_id(DataSetId::default())
    }

    pub fn with_id(id: DataSetId) -> Self {
        Self {
            id,
            settings: DataSetSettings::default(),
            variables: Vec::new(),
            component_sizes: Vec::new(),
            layouts: HashMap::new(),
            buffers: [DataBuffer::new(), DataBuffer::new()],
            current: BufferSlot::Ping,
            state: Lifecycle::Building,
        }
    }

    pub fn with_settings(mut self, settings: DataSetSettings) -> Self {
        self.settings = settings;
        self
    }

    #[inline]
    pub fn id(&self) -> &DataSetId {
        &self.id
    }

    #[inline]
    pub fn settings(&self) -> &DataSetSettings {
        &self.settings
    }

    /// Append a variable. Returns `false` if it was already present.
    ///
    /// # Panics
    /// If the data set is already finalized.
    pub fn add_variable(&mut self, variable: Variable) -> bool {
        assert!(
            self.state == Lifecycle::Building,
            "cannot add variable {} to finalized data set {}",
            variable,
            self.id
        );
        if self.variables.contains(&variable) {
            warn!(data_set = %self.id, %variable, "ignoring duplicate variable");
            return false;
        }
        self.variables.push(variable);
        true
    }

    pub fn add_variables<I>(&mut self, variables: I)
    where
        I: IntoIterator<Item = Variable>,
    {
        for variable in variables {
            self.add_variable(variable);
        }
    }

    /// Fix the layout: assign component indices in insertion order and
    /// initialize both buffers.
    ///
    /// # Panics
    /// If called twice without an intervening `reset`.
    pub fn finalize(&mut self) {
        assert!(
            self.state == Lifecycle::Building,
            "data set {} finalized twice",
            self.id
        );

        let mut component_idx = 0;
        for variable in &self.variables {
            let layout = TypeLayoutInfo::from_type(variable.type_def());
            self.component_sizes
                .extend(layout.component_sizes().iter().map(|&s| s as usize));
            let num = layout.num_scalar_components();
            self.layouts
                .insert(variable.clone(), VariableLayoutInfo::new(component_idx, layout));
            component_idx += num;
        }

        for buffer in &mut self.buffers {
            buffer.init(component_idx);
        }
        self.state = Lifecycle::Finalized;

        debug!(
            data_set = %self.id,
            variables = self.variables.len(),
            components = component_idx,
            "data set finalized"
        );
    }

    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.state == Lifecycle::Finalized
    }

    #[inline]
    fn assert_finalized(&self, op: &str) {
        assert!(
            self.is_finalized(),
            "{} on data set {} before finalize",
            op,
            self.id
        );
    }

    /// Layout of a variable, or `None` if it was never added.
    #[inline]
    pub fn variable_layout(&self, variable: &Variable) -> Option<&VariableLayoutInfo> {
        self.layouts.get(variable)
    }

    #[inline]
    pub fn has_variable(&self, variable: &Variable) -> bool {
        self.layouts.contains_key(variable)
    }

    /// Variables in insertion (layout) order.
    #[inline]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    #[inline]
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Total flattened scalar components.
    #[inline]
    pub fn num_components(&self) -> usize {
        self.component_sizes.len()
    }

    #[inline]
    pub fn component_sizes(&self) -> &[usize] {
        &self.component_sizes
    }

    /// Size the current buffer for `num_instances`. Existing data in that
    /// buffer is not preserved.
    pub fn allocate(&mut self, num_instances: usize) {
        self.assert_finalized("allocate");
        let slot = self.current;
        self.buffers[slot.index()].allocate(num_instances, &self.component_sizes);
        if self.settings.log_allocations {
            debug!(
                data_set = %self.id,
                ?slot,
                num_instances,
                bytes = self.buffers[slot.index()].size_bytes(),
                "allocated buffer"
            );
        }
    }

    #[inline]
    pub fn current_slot(&self) -> BufferSlot {
        self.current
    }

    #[inline]
    pub fn slot_of(&self, select: BufferSelect) -> BufferSlot {
        match select {
            BufferSelect::Current => self.current,
            BufferSelect::Previous => self.current.other(),
        }
    }

    #[inline]
    pub fn buffer(&self, select: BufferSelect) -> &DataBuffer {
        &self.buffers[self.slot_of(select).index()]
    }

    #[inline]
    pub fn buffer_mut(&mut self, select: BufferSelect) -> &mut DataBuffer {
        let slot = self.slot_of(select);
        &mut self.buffers[slot.index()]
    }

    #[inline]
    pub fn curr_data(&self) -> &DataBuffer {
        self.buffer(BufferSelect::Current)
    }

    #[inline]
    pub fn prev_data(&self) -> &DataBuffer {
        self.buffer(BufferSelect::Previous)
    }

    #[inline]
    pub fn curr_data_mut(&mut self) -> &mut DataBuffer {
        self.buffer_mut(BufferSelect::Current)
    }

    #[inline]
    pub fn prev_data_mut(&mut self) -> &mut DataBuffer {
        self.buffer_mut(BufferSelect::Previous)
    }

    /// Previous buffer for reading and current buffer for writing, at once.
    pub fn split_buffers_mut(&mut self) -> (&DataBuffer, &mut DataBuffer) {
        let [ping, pong] = &mut self.buffers;
        match self.current {
            BufferSlot::Ping => (&*pong, ping),
            BufferSlot::Pong => (&*ping, pong),
        }
    }

    /// Layout map plus one buffer mutably, for writers that need both.
    pub(crate) fn layouts_and_buffer_mut(
        &mut self,
        select: BufferSelect,
    ) -> (&HashMap<Variable, VariableLayoutInfo>, &mut DataBuffer) {
        let slot = self.slot_of(select);
        (&self.layouts, &mut self.buffers[slot.index()])
    }

    #[inline]
    pub fn num_instances(&self) -> usize {
        self.curr_data().num_instances()
    }

    #[inline]
    pub fn prev_num_instances(&self) -> usize {
        self.prev_data().num_instances()
    }

    pub fn set_num_instances(&mut self, num_instances: usize) {
        self.curr_data_mut().set_num_instances(num_instances);
    }

    /// Zero the live counts of both buffers, keeping their allocations.
    pub fn reset_num_instances(&mut self) {
        for buffer in &mut self.buffers {
            buffer.set_num_instances(0);
        }
    }

    /// Swap-remove an instance from the current buffer.
    pub fn kill_instance(&mut self, instance: usize) {
        trace!(data_set = %self.id, instance, "kill instance");
        self.curr_data_mut().kill_instance(instance);
    }

    /// Swap current and previous. No data is copied or cleared.
    pub fn tick(&mut self) {
        self.current = self.current.other();
        trace!(data_set = %self.id, current = ?self.current, "buffers swapped");
    }

    /// Make the current buffer a copy of the previous buffer's live data.
    pub fn copy_prev_to_cur(&mut self) {
        self.assert_finalized("copy_prev_to_cur");
        let sizes = std::mem::take(&mut self.component_sizes);
        let (prev, curr) = self.split_buffers_mut();
        curr.copy_live_from(prev, &sizes);
        self.component_sizes = sizes;
    }

    /// Footprint of both buffers in bytes.
    pub fn size_bytes(&self) -> usize {
        self.buffers.iter().map(DataBuffer::size_bytes).sum()
    }

    /// Release both buffers' storage while keeping the finalized layout.
    pub fn reset_buffers(&mut self) {
        for buffer in &mut self.buffers {
            buffer.release();
        }
        trace!(data_set = %self.id, "buffers released");
    }

    /// Clear everything and return to the building state.
    pub fn reset(&mut self) {
        self.variables.clear();
        self.component_sizes.clear();
        self.layouts.clear();
        for buffer in &mut self.buffers {
            buffer.reset();
        }
        self.current = BufferSlot::Ping;
        self.state = Lifecycle::Building;
        debug!(data_set = %self.id, "data set reset");
    }
}

impl Default for DataSet {
    fn default() -> Self {
        Self::new()
    }
}
