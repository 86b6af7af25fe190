// value.rs - Type-erased attribute values for reflection and diagnostics
//
// A `Value` mirrors a `TypeDefinition`: one variant per scalar kind plus a
// struct of named fields. Decoding and encoding walk the definition and the
// flattened 4-byte components side by side.

use super::error::DataSetError;
use super::types::{ScalarKind, TypeDefinition};
use bytemuck::{Pod, Zeroable};
use std::fmt;

/// A boolean stored as `i32`. The raw bits are kept as-is.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct EncodedBool(pub i32);

/// Interpretation of an [`EncodedBool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoolState {
    True,
    False,
    /// Neither all bits set nor all bits clear.
    Invalid,
}

impl EncodedBool {
    pub const TRUE: Self = Self(-1);
    pub const FALSE: Self = Self(0);

    #[inline]
    pub fn state(self) -> BoolState {
        match self.0 {
            -1 => BoolState::True,
            0 => BoolState::False,
            _ => BoolState::Invalid,
        }
    }

    /// `None` for an invalid bit pattern.
    #[inline]
    pub fn to_bool(self) -> Option<bool> {
        match self.state() {
            BoolState::True => Some(true),
            BoolState::False => Some(false),
            BoolState::Invalid => None,
        }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.state() != BoolState::Invalid
    }
}

impl From<bool> for EncodedBool {
    fn from(b: bool) -> Self {
        if b {
            Self::TRUE
        } else {
            Self::FALSE
        }
    }
}

impl fmt::Display for EncodedBool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.state() {
            BoolState::True => "True",
            BoolState::False => "False",
            BoolState::Invalid => "Invalid",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Float(f32),
    Int(i32),
    Bool(EncodedBool),
    Struct(Vec<(String, Value)>),
}

impl Value {
    /// Decode from raw components, consuming as many as `def` needs.
    pub(crate) fn decode(
        def: &TypeDefinition,
        components: &mut impl Iterator<Item = [u8; 4]>,
    ) -> Value {
        match def {
            TypeDefinition::Scalar(kind) => {
                let raw = components.next().unwrap_or_default();
                match kind {
                    ScalarKind::Float => Value::Float(f32::from_ne_bytes(raw)),
                    ScalarKind::Int => Value::Int(i32::from_ne_bytes(raw)),
                    ScalarKind::Bool => Value::Bool(EncodedBool(i32::from_ne_bytes(raw))),
                }
            }
            TypeDefinition::Struct(def) => Value::Struct(
                def.fields
                    .iter()
                    .map(|field| (field.name.clone(), Value::decode(&field.resolve(), components)))
                    .collect(),
            ),
        }
    }

    /// Encode into raw components, checking the shape against `def`.
    pub(crate) fn encode(
        &self,
        def: &TypeDefinition,
        out: &mut Vec<[u8; 4]>,
    ) -> Result<(), DataSetError> {
        let mismatch = || DataSetError::ValueTypeMismatch {
            expected: def.name().to_string(),
        };
        match (def, self) {
            (TypeDefinition::Scalar(ScalarKind::Float), Value::Float(v)) => {
                out.push(v.to_ne_bytes())
            }
            (TypeDefinition::Scalar(ScalarKind::Int), Value::Int(v)) => out.push(v.to_ne_bytes()),
            (TypeDefinition::Scalar(ScalarKind::Bool), Value::Bool(v)) => {
                out.push(v.0.to_ne_bytes())
            }
            (TypeDefinition::Struct(def), Value::Struct(fields)) => {
                if def.fields.len() != fields.len() {
                    return Err(mismatch());
                }
                for (field_def, (name, value)) in def.fields.iter().zip(fields) {
                    if field_def.name != *name {
                        return Err(mismatch());
                    }
                    value.encode(&field_def.resolve(), out)?;
                }
            }
            _ => return Err(mismatch()),
        }
        Ok(())
    }

    /// Field of a struct value by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<EncodedBool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => f.write_str(&format_g(*v)),
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Struct(fields) => {
                f.write_str("(")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Format a float like C's `%g` (six significant digits, trailing zeros
/// stripped, exponent form outside `1e-4 <= |v| < 1e6`).
pub fn format_g(v: f32) -> String {
    const PRECISION: i32 = 6;

    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let v = v as f64;
    // `{:e}` rounds to the requested significant digits, which gives the
    // exponent after rounding.
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, v);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= PRECISION {
        let mantissa = strip_zeros(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp).max(0) as usize;
        strip_zeros(&format!("{:.*}", decimals, v)).to_string()
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
