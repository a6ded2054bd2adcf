//! Typed setting values.
//!
//! Every stored setting is a [`Value`]: a closed sum type instead of a boxed
//! "any" object.  Typed access goes through the [`SettingValue`] trait, which
//! converts between a Rust type and a `Value` and fails (returns `None`)
//! instead of casting when the kinds do not line up.
//!
//! # Enums
//!
//! Application enums are stored as their underlying integer.  Implement
//! [`SettingValue`] with `KIND = ValueKind::Int`:
//!
//! ```rust
//! use settings_core::{SettingValue, Value, ValueKind};
//!
//! #[derive(Debug, Clone, Copy, PartialEq)]
//! enum Quality { Low = 0, High = 1 }
//!
//! impl SettingValue for Quality {
//!     const KIND: ValueKind = ValueKind::Int;
//!
//!     fn into_value(self) -> Value {
//!         Value::Int(self as i64)
//!     }
//!
//!     fn from_value(value: &Value) -> Option<Self> {
//!         match value {
//!             Value::Int(0) => Some(Quality::Low),
//!             Value::Int(1) => Some(Quality::High),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! assert_eq!(Quality::from_value(&Quality::High.into_value()), Some(Quality::High));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of a [`Value`], used to declare what a setting holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// A single setting value.
///
/// Serialized untagged, so a saved settings file holds native JSON booleans,
/// numbers, and strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
        }
    }

    /// Returns `false` only for a NaN or infinite float.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Float(f) => f.is_finite(),
            _ => true,
        }
    }

    /// Converts this value to `kind` if the conversion loses nothing.
    ///
    /// Integers widen to floats only when the float holds exactly the same
    /// number, so integers beyond ±2^53 that have no exact `f64` are refused.
    /// Floats narrow to integers only when they have no fractional part and
    /// fit in `i64`.  No other conversions exist; in particular booleans and
    /// numbers never become text or vice versa.
    pub fn coerce_to(&self, kind: ValueKind) -> Option<Value> {
        match (self, kind) {
            (v, k) if v.kind() == k => Some(v.clone()),
            (Value::Int(i), ValueKind::Float) => {
                let f = *i as f64;
                // Compare in i128: casting 2^63 back to i64 would saturate.
                if f as i128 == i128::from(*i) {
                    Some(Value::Float(f))
                } else {
                    None
                }
            }
            (Value::Float(f), ValueKind::Int) => {
                // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
                if f.is_finite() && f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64
                {
                    Some(Value::Int(*f as i64))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// A Rust type that can be stored as a setting.
pub trait SettingValue: Clone + PartialEq + Sized {
    /// The value kind this type is persisted as.
    const KIND: ValueKind;

    /// Converts into the stored representation.
    fn into_value(self) -> Value;

    /// Recovers the typed value, or `None` if `value` cannot represent `Self`.
    fn from_value(value: &Value) -> Option<Self>;
}

impl SettingValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl SettingValue for i64 {
    const KIND: ValueKind = ValueKind::Int;

    fn into_value(self) -> Value {
        Value::Int(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value.coerce_to(ValueKind::Int)? {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }
}

impl SettingValue for i32 {
    const KIND: ValueKind = ValueKind::Int;

    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|i| i32::try_from(i).ok())
    }
}

impl SettingValue for u32 {
    const KIND: ValueKind = ValueKind::Int;

    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|i| u32::try_from(i).ok())
    }
}

impl SettingValue for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn into_value(self) -> Value {
        Value::Float(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value.coerce_to(ValueKind::Float)? {
            Value::Float(f) => Some(f),
            _ => None,
        }
    }
}

impl SettingValue for f32 {
    const KIND: ValueKind = ValueKind::Float;

    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl SettingValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn into_value(self) -> Value {
        Value::Text(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
