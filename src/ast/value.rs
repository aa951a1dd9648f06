use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Runtime value types flowing along pointers and through expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Value {
    Number(f64),
    Bool(bool),
    Vector2([f64; 2]),
    /// `[x, y, width, height]`
    Rect([f64; 4]),
    /// `[r, g, b, a]` in the 0..=1 range.
    Color([f64; 4]),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    #[default]
    Null,
}

/// The declared type of a node input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    Number,
    Bool,
    Vector2,
    Rect,
    Color,
    Any,
}

impl ValueType {
    /// The literal an input of this type starts out with.
    pub fn default_value(self) -> Value {
        match self {
            ValueType::Number => Value::Number(0.0),
            ValueType::Bool => Value::Bool(false),
            ValueType::Vector2 => Value::Vector2([0.0, 0.0]),
            ValueType::Rect => Value::Rect([0.0, 0.0, 0.0, 0.0]),
            ValueType::Color => Value::Color([0.0, 0.0, 0.0, 1.0]),
            ValueType::Any => Value::Number(0.0),
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Bool(_) => "Bool",
            Value::Vector2(_) => "Vector2",
            Value::Rect(_) => "Rect",
            Value::Color(_) => "Color",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
            Value::Null => "Null",
        }
    }

    /// Coerces to a number. Vectors collapse to their first component,
    /// anything without a numeric reading becomes `0`.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Vector2([x, _]) => *x,
            Value::Array(items) => items.first().map_or(0.0, Value::as_number),
            _ => 0.0,
        }
    }

    /// Coerces to a 2D vector. Numbers are splatted, `{x, y}` objects and
    /// two-element arrays are read component-wise.
    pub fn as_vector2(&self) -> [f64; 2] {
        match self {
            Value::Vector2(v) => *v,
            Value::Number(n) => [*n, *n],
            Value::Rect([x, y, _, _]) => [*x, *y],
            Value::Array(items) => [
                items.first().map_or(0.0, Value::as_number),
                items.get(1).map_or(0.0, Value::as_number),
            ],
            Value::Object(fields) => [
                fields.get("x").map_or(0.0, Value::as_number),
                fields.get("y").map_or(0.0, Value::as_number),
            ],
            _ => [0.0, 0.0],
        }
    }

    pub fn as_rect(&self) -> [f64; 4] {
        match self {
            Value::Rect(r) => *r,
            Value::Vector2([x, y]) => [*x, *y, 0.0, 0.0],
            Value::Array(items) => {
                let mut rect = [0.0; 4];
                for (slot, item) in rect.iter_mut().zip(items) {
                    *slot = item.as_number();
                }
                rect
            }
            Value::Object(fields) => [
                fields.get("x").map_or(0.0, Value::as_number),
                fields.get("y").map_or(0.0, Value::as_number),
                fields.get("width").map_or(0.0, Value::as_number),
                fields.get("height").map_or(0.0, Value::as_number),
            ],
            _ => [0.0; 4],
        }
    }

    /// Coerces to RGBA. Missing alpha defaults to opaque.
    pub fn as_color(&self) -> [f64; 4] {
        match self {
            Value::Color(c) => *c,
            Value::Number(n) => [*n, *n, *n, 1.0],
            Value::Array(items) => [
                items.first().map_or(0.0, Value::as_number),
                items.get(1).map_or(0.0, Value::as_number),
                items.get(2).map_or(0.0, Value::as_number),
                items.get(3).map_or(1.0, Value::as_number),
            ],
            Value::Object(fields) => [
                fields.get("r").map_or(0.0, Value::as_number),
                fields.get("g").map_or(0.0, Value::as_number),
                fields.get("b").map_or(0.0, Value::as_number),
                fields.get("a").map_or(1.0, Value::as_number),
            ],
            _ => [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Bitwise equality, so `NaN` compares equal to itself.
    pub fn bit_eq(&self, other: &Value) -> bool {
        fn slices(a: &[f64], b: &[f64]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
        }
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (Value::Vector2(a), Value::Vector2(b)) => slices(a, b),
            (Value::Rect(a), Value::Rect(b)) | (Value::Color(a), Value::Color(b)) => slices(a, b),
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.bit_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.bit_eq(vb))
            }
            (a, b) => a == b,
        }
    }
}

fn fmt_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

fn fmt_components(f: &mut fmt::Formatter<'_>, name: &str, values: &[f64]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        fmt_number(f, *v)?;
    }
    write!(f, ")")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => fmt_number(f, *n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Vector2(v) => fmt_components(f, "vec2", v),
            Value::Rect(r) => fmt_components(f, "rect", r),
            Value::Color(c) => fmt_components(f, "rgba", c),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", key, value)?;
                }
                write!(f, " }}")
            }
            Value::Null => write!(f, "null"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<[f64; 2]> for Value {
    fn from(v: [f64; 2]) -> Self {
        Value::Vector2(v)
    }
}
