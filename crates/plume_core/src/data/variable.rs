// variable.rs - Named, typed per-instance attributes
//
// A variable is identified by name *and* type: `Age: float` and
// `Age: int` are distinct variables.

use super::types::{TypeDefinition, TypeLayoutInfo};
use std::fmt;
use std::ops::Range;

/// One per-particle attribute, e.g. `Position: vec3`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    name: String,
    type_def: TypeDefinition,
}

impl Variable {
    pub fn new(type_def: TypeDefinition, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_def,
        }
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(TypeDefinition::float(), name)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(TypeDefinition::int(), name)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(TypeDefinition::bool(), name)
    }

    pub fn vec2(name: impl Into<String>) -> Self {
        Self::new(TypeDefinition::vec2(), name)
    }

    pub fn vec3(name: impl Into<String>) -> Self {
        Self::new(TypeDefinition::vec3(), name)
    }

    pub fn vec4(name: impl Into<String>) -> Self {
        Self::new(TypeDefinition::vec4(), name)
    }

    pub fn color(name: impl Into<String>) -> Self {
        Self::new(TypeDefinition::color(), name)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn type_def(&self) -> &TypeDefinition {
        &self.type_def
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.type_def)
    }
}

/// Where a variable lives inside a finalized data set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableLayoutInfo {
    /// First index into the data set's flattened component table.
    component_idx: usize,
    layout: TypeLayoutInfo,
}

impl VariableLayoutInfo {
    pub(crate) fn new(component_idx: usize, layout: TypeLayoutInfo) -> Self {
        Self {
            component_idx,
            layout,
        }
    }

    #[inline]
    pub fn component_idx(&self) -> usize {
        self.component_idx
    }

    #[inline]
    pub fn num_components(&self) -> usize {
        self.layout.num_scalar_components()
    }

    /// Global component indices covered by this variable.
    #[inline]
    pub fn component_range(&self) -> Range<usize> {
        self.component_idx..self.component_idx + self.num_components()
    }

    #[inline]
    pub fn layout(&self) -> &TypeLayoutInfo {
        &self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_includes_type() {
        assert_ne!(Variable::float("Age"), Variable::int("Age"));
        assert_eq!(Variable::vec3("Position"), Variable::vec3("Position"));
        assert_eq!(Variable::vec3("Position").to_string(), "Position: Vector");
    }

    #[test]
    fn layout_range_spans_components() {
        let info = VariableLayoutInfo::new(5, TypeLayoutInfo::from_type(&TypeDefinition::color()));
        assert_eq!(info.component_range(), 5..9);
        assert_eq!(info.num_components(), 4);
    }
}
