// types.rs - Attribute type definitions and layout flattening
//
// Types are described at runtime, not through Rust TypeIds, so that
// script-defined structs can be stored next to the built-in vectors.
// Every type flattens to a list of 4-byte scalar components.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// Byte size of every baseline scalar component.
pub const SCALAR_SIZE: usize = 4;

/// Leaf scalar kinds. Bools are stored as `i32` (all bits set = true).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    Float,
    Int,
    Bool,
}

impl ScalarKind {
    #[inline]
    pub fn size(self) -> usize {
        SCALAR_SIZE
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Float => "float",
            ScalarKind::Int => "int",
            ScalarKind::Bool => "bool",
        }
    }
}

/// A field's type: either spelled out inline or a reference to a registered type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldType {
    Inline(TypeDefinition),
    Named(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeDefinition) -> Self {
        Self {
            name: name.into(),
            ty: FieldType::Inline(ty),
        }
    }

    /// Field whose type is looked up in the type registry at layout time.
    pub fn named(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: FieldType::Named(type_name.into()),
        }
    }

    /// Resolve the field's type.
    ///
    /// # Panics
    /// An unregistered type name is a type-registration bug and aborts.
    pub fn resolve(&self) -> TypeDefinition {
        match &self.ty {
            FieldType::Inline(def) => def.clone(),
            FieldType::Named(type_name) => type_of(type_name).unwrap_or_else(|| {
                panic!(
                    "field '{}' references unregistered type '{}'",
                    self.name, type_name
                )
            }),
        }
    }
}

/// Named struct of fields, flattened depth-first in declaration order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

/// Runtime description of an attribute type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeDefinition {
    Scalar(ScalarKind),
    Struct(StructDef),
}

impl TypeDefinition {
    pub fn float() -> Self {
        TypeDefinition::Scalar(ScalarKind::Float)
    }

    pub fn int() -> Self {
        TypeDefinition::Scalar(ScalarKind::Int)
    }

    pub fn bool() -> Self {
        TypeDefinition::Scalar(ScalarKind::Bool)
    }

    pub fn vec2() -> Self {
        float_struct("Vector2D", &["X", "Y"])
    }

    pub fn vec3() -> Self {
        float_struct("Vector", &["X", "Y", "Z"])
    }

    pub fn vec4() -> Self {
        float_struct("Vector4", &["X", "Y", "Z", "W"])
    }

    pub fn color() -> Self {
        float_struct("LinearColor", &["R", "G", "B", "A"])
    }

    pub fn structure(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        TypeDefinition::Struct(StructDef {
            name: name.into(),
            fields,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            TypeDefinition::Scalar(kind) => kind.name(),
            TypeDefinition::Struct(def) => &def.name,
        }
    }

    /// Number of flattened scalar components.
    pub fn num_scalar_components(&self) -> usize {
        match self {
            TypeDefinition::Scalar(_) => 1,
            TypeDefinition::Struct(def) => def
                .fields
                .iter()
                .map(|f| f.resolve().num_scalar_components())
                .sum(),
        }
    }

    /// Natural packed size in bytes.
    pub fn size(&self) -> usize {
        match self {
            TypeDefinition::Scalar(kind) => kind.size(),
            TypeDefinition::Struct(def) => def.fields.iter().map(|f| f.resolve().size()).sum(),
        }
    }
}

impl fmt::Display for TypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn float_struct(name: &str, fields: &[&str]) -> TypeDefinition {
    TypeDefinition::structure(
        name,
        fields
            .iter()
            .map(|field| FieldDef::new(*field, TypeDefinition::float()))
            .collect(),
    )
}

/// Global registry of named types (built-ins plus script-defined structs).
static REGISTRY: Lazy<RwLock<HashMap<String, TypeDefinition>>> = Lazy::new(|| {
    let builtins = [
        ("float", TypeDefinition::float()),
        ("int", TypeDefinition::int()),
        ("bool", TypeDefinition::bool()),
        ("vec2", TypeDefinition::vec2()),
        ("vec3", TypeDefinition::vec3()),
        ("vec4", TypeDefinition::vec4()),
        ("color", TypeDefinition::color()),
    ];
    RwLock::new(
        builtins
            .into_iter()
            .map(|(name, def)| (name.to_string(), def))
            .collect(),
    )
});

/// Register a named type.
///
/// Re-registering a name must describe the same type.
pub fn register_type(name: impl Into<String>, def: TypeDefinition) {
    let name = name.into();
    let mut map = REGISTRY.write().expect("type registry poisoned");
    if let Some(prev) = map.insert(name.clone(), def.clone()) {
        assert_eq!(prev, def, "type '{}' re-registered with a different layout", name);
    }
}

/// Look up a registered type by name.
pub fn type_of(name: &str) -> Option<TypeDefinition> {
    REGISTRY
        .read()
        .expect("type registry poisoned")
        .get(name)
        .cloned()
}

/// Flattened scalar layout of one type.
///
/// `component_sizes[i]` and `component_offsets[i]` describe the i-th leaf
/// scalar within one packed instance of the type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeLayoutInfo {
    component_sizes: Vec<u32>,
    component_offsets: Vec<u32>,
    component_kinds: Vec<ScalarKind>,
}

impl TypeLayoutInfo {
    pub fn from_type(def: &TypeDefinition) -> Self {
        let mut layout = Self {
            component_sizes: Vec::new(),
            component_offsets: Vec::new(),
            component_kinds: Vec::new(),
        };
        let size = layout.flatten(def, 0);
        debug_assert_eq!(size, layout.packed_size());
        layout
    }

    fn flatten(&mut self, def: &TypeDefinition, base: usize) -> usize {
        match def {
            TypeDefinition::Scalar(kind) => {
                self.component_sizes.push(kind.size() as u32);
                self.component_offsets.push(base as u32);
                self.component_kinds.push(*kind);
                kind.size()
            }
            TypeDefinition::Struct(def) => {
                let mut offset = base;
                for field in &def.fields {
                    offset += self.flatten(&field.resolve(), offset);
                }
                offset - base
            }
        }
    }

    #[inline]
    pub fn num_scalar_components(&self) -> usize {
        self.component_sizes.len()
    }

    #[inline]
    pub fn component_sizes(&self) -> &[u32] {
        &self.component_sizes
    }

    #[inline]
    pub fn component_offsets(&self) -> &[u32] {
        &self.component_offsets
    }

    #[inline]
    pub fn component_kinds(&self) -> &[ScalarKind] {
        &self.component_kinds
    }

    pub fn packed_size(&self) -> usize {
        self.component_sizes.iter().map(|&s| s as usize).sum()
    }
}
