//! Leaf Values
//!
//! The closed set of value kinds a leaf can hold. A new leaf takes its kind from the
//! value it is created with through [`Value::kind`]; there is no open-ended type
//! inspection anywhere in the crate.

use crate::tree::object::ObjectValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind tag of a leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    I8,
    I16,
    I32,
    I64,
    U16,
    U32,
    U64,
    Float,
    Double,
    Char,
    Bool,
    Byte,
    String,
    Password,
    DateTime,
    TimeSpan,
    Color,
    Point,
    Array,
    Array2D,
    Enum,
    Object,
}

impl ValueKind {
    pub const ALL: [ValueKind; 22] = [
        ValueKind::I8,
        ValueKind::I16,
        ValueKind::I32,
        ValueKind::I64,
        ValueKind::U16,
        ValueKind::U32,
        ValueKind::U64,
        ValueKind::Float,
        ValueKind::Double,
        ValueKind::Char,
        ValueKind::Bool,
        ValueKind::Byte,
        ValueKind::String,
        ValueKind::Password,
        ValueKind::DateTime,
        ValueKind::TimeSpan,
        ValueKind::Color,
        ValueKind::Point,
        ValueKind::Array,
        ValueKind::Array2D,
        ValueKind::Enum,
        ValueKind::Object,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::I8 => "i8",
            ValueKind::I16 => "i16",
            ValueKind::I32 => "i32",
            ValueKind::I64 => "i64",
            ValueKind::U16 => "u16",
            ValueKind::U32 => "u32",
            ValueKind::U64 => "u64",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::Char => "char",
            ValueKind::Bool => "bool",
            ValueKind::Byte => "byte",
            ValueKind::String => "string",
            ValueKind::Password => "password",
            ValueKind::DateTime => "datetime",
            ValueKind::TimeSpan => "timespan",
            ValueKind::Color => "color",
            ValueKind::Point => "point",
            ValueKind::Array => "array",
            ValueKind::Array2D => "array2d",
            ValueKind::Enum => "enum",
            ValueKind::Object => "object",
        }
    }

    /// Kinds that may carry [`Bounds`]
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueKind::I8
                | ValueKind::I16
                | ValueKind::I32
                | ValueKind::I64
                | ValueKind::U16
                | ValueKind::U32
                | ValueKind::U64
                | ValueKind::Float
                | ValueKind::Double
                | ValueKind::Byte
        )
    }

    /// Parse text input as a value of this kind.
    ///
    /// Scalars use their natural text form; colors are `#RRGGBB[AA]`, points are `x,y`,
    /// enums are `Type::Variant`, timespans are milliseconds, and arrays and objects are
    /// the JSON form of [`Value`].
    pub fn parse_value(self, text: &str) -> Option<Value> {
        let text = text.trim();
        match self {
            ValueKind::I8 => text.parse().ok().map(Value::I8),
            ValueKind::I16 => text.parse().ok().map(Value::I16),
            ValueKind::I32 => text.parse().ok().map(Value::I32),
            ValueKind::I64 => text.parse().ok().map(Value::I64),
            ValueKind::U16 => text.parse().ok().map(Value::U16),
            ValueKind::U32 => text.parse().ok().map(Value::U32),
            ValueKind::U64 => text.parse().ok().map(Value::U64),
            ValueKind::Float => text.parse().ok().map(Value::Float),
            ValueKind::Double => text.parse().ok().map(Value::Double),
            ValueKind::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Value::Char(c)),
                    _ => None,
                }
            }
            ValueKind::Bool => text.parse().ok().map(Value::Bool),
            ValueKind::Byte => text.parse().ok().map(Value::Byte),
            ValueKind::String => Some(Value::String(text.to_string())),
            ValueKind::Password => Some(Value::Password(Secret::new(text))),
            ValueKind::DateTime => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| Value::DateTime(dt.with_timezone(&Utc))),
            ValueKind::TimeSpan => text
                .trim_end_matches("ms")
                .parse()
                .ok()
                .map(|ms| Value::TimeSpan(TimeSpan::from_millis(ms))),
            ValueKind::Color => Color::from_hex(text).map(Value::Color),
            ValueKind::Point => {
                let (x, y) = text.split_once(',')?;
                Some(Value::Point(Point::new(
                    x.trim().parse().ok()?,
                    y.trim().parse().ok()?,
                )))
            }
            ValueKind::Enum => {
                let (type_name, variant) = text.split_once("::")?;
                Some(Value::Enum(EnumValue::new(type_name, variant)))
            }
            ValueKind::Array | ValueKind::Array2D | ValueKind::Object => {
                serde_json::from_str::<Value>(text)
                    .ok()
                    .filter(|value| value.kind() == self)
            }
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValueKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown value kind: {}", s))
    }
}

/// A password or other secret string.
///
/// Never printed by `Debug` or `Display`. Encrypting it at rest is left to the store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: impl Into<String>) -> Self {
        Secret(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Signed duration with millisecond resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSpan {
    millis: i64,
}

impl TimeSpan {
    pub fn from_millis(millis: i64) -> Self {
        TimeSpan { millis }
    }

    pub fn from_secs(secs: i64) -> Self {
        TimeSpan {
            millis: secs.saturating_mul(1000),
        }
    }

    pub fn as_millis(&self) -> i64 {
        self.millis
    }

    pub fn to_chrono(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.millis)
    }
}

impl From<std::time::Duration> for TimeSpan {
    fn from(duration: std::time::Duration) -> Self {
        TimeSpan::from_millis(i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
    }
}

impl From<chrono::Duration> for TimeSpan {
    fn from(duration: chrono::Duration) -> Self {
        TimeSpan::from_millis(duration.num_milliseconds())
    }
}

/// RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, a: 255 }
    }

    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color { r, g, b, a }
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    pub fn from_hex(text: &str) -> Option<Self> {
        let hex = text.strip_prefix('#').unwrap_or(text);
        if !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            6 => Some(Color::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Color::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }
}

/// Two-dimensional point
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Point {
    #[serde(with = "float_serde::double")]
    pub x: f64,
    #[serde(with = "float_serde::double")]
    pub y: f64,
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        same_f64(self.x, other.x) && same_f64(self.y, other.y)
    }
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// Named variant of a named enumeration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumValue {
    pub type_name: String,
    pub variant: String,
}

impl EnumValue {
    pub fn new(type_name: impl Into<String>, variant: impl Into<String>) -> Self {
        EnumValue {
            type_name: type_name.into(),
            variant: variant.into(),
        }
    }
}

/// Value held by a leaf.
///
/// Equality treats NaN as equal to NaN so that rewriting a NaN leaf is not a change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U16(u16),
    U32(u32),
    U64(u64),
    Float(#[serde(with = "float_serde::single")] f32),
    Double(#[serde(with = "float_serde::double")] f64),
    Char(char),
    Bool(bool),
    Byte(u8),
    String(String),
    Password(Secret),
    DateTime(DateTime<Utc>),
    TimeSpan(TimeSpan),
    Color(Color),
    Point(Point),
    Array(Vec<Value>),
    Array2D(Vec<Vec<Value>>),
    Enum(EnumValue),
    Object(ObjectValue),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::I8(_) => ValueKind::I8,
            Value::I16(_) => ValueKind::I16,
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::U16(_) => ValueKind::U16,
            Value::U32(_) => ValueKind::U32,
            Value::U64(_) => ValueKind::U64,
            Value::Float(_) => ValueKind::Float,
            Value::Double(_) => ValueKind::Double,
            Value::Char(_) => ValueKind::Char,
            Value::Bool(_) => ValueKind::Bool,
            Value::Byte(_) => ValueKind::Byte,
            Value::String(_) => ValueKind::String,
            Value::Password(_) => ValueKind::Password,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::TimeSpan(_) => ValueKind::TimeSpan,
            Value::Color(_) => ValueKind::Color,
            Value::Point(_) => ValueKind::Point,
            Value::Array(_) => ValueKind::Array,
            Value::Array2D(_) => ValueKind::Array2D,
            Value::Enum(_) => ValueKind::Enum,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Numeric view used for bounds checks
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I8(v) => Some(f64::from(*v)),
            Value::I16(v) => Some(f64::from(*v)),
            Value::I32(v) => Some(f64::from(*v)),
            Value::I64(v) => Some(*v as f64),
            Value::U16(v) => Some(f64::from(*v)),
            Value::U32(v) => Some(f64::from(*v)),
            Value::U64(v) => Some(*v as f64),
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::Byte(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    /// Independent copy: embedded objects are detached from their shared instance.
    pub fn copied(&self) -> Value {
        match self {
            Value::Object(object) => Value::Object(object.detached()),
            Value::Array(items) => Value::Array(items.iter().map(Value::copied).collect()),
            Value::Array2D(rows) => Value::Array2D(
                rows.iter()
                    .map(|row| row.iter().map(Value::copied).collect())
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => same_f64(f64::from(*a), f64::from(*b)),
            (Value::Double(a), Value::Double(b)) => same_f64(*a, *b),
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Password(a), Value::Password(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::TimeSpan(a), Value::TimeSpan(b)) => a == b,
            (Value::Color(a), Value::Color(b)) => a == b,
            (Value::Point(a), Value::Point(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Array2D(a), Value::Array2D(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

fn same_f64(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Serde helpers for float fields.
///
/// Text formats have no NaN or infinity literals, so non-finite values are written as
/// the strings `"NaN"`, `"inf"` and `"-inf"`. Binary formats keep the raw float.
mod float_serde {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FloatRepr {
        Number(f64),
        Text(String),
    }

    fn non_finite_text(v: f64) -> &'static str {
        if v.is_nan() {
            "NaN"
        } else if v > 0.0 {
            "inf"
        } else {
            "-inf"
        }
    }

    fn read<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match FloatRepr::deserialize(deserializer)? {
            FloatRepr::Number(v) => Ok(v),
            FloatRepr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::custom(format!("invalid float '{}'", other))),
            },
        }
    }

    pub mod double {
        use super::*;

        pub fn serialize<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
            if serializer.is_human_readable() && !v.is_finite() {
                serializer.serialize_str(non_finite_text(*v))
            } else {
                serializer.serialize_f64(*v)
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
            if deserializer.is_human_readable() {
                read(deserializer)
            } else {
                f64::deserialize(deserializer)
            }
        }
    }

    pub mod single {
        use super::*;

        pub fn serialize<S: Serializer>(v: &f32, serializer: S) -> Result<S::Ok, S::Error> {
            if serializer.is_human_readable() && !v.is_finite() {
                serializer.serialize_str(non_finite_text(f64::from(*v)))
            } else {
                serializer.serialize_f32(*v)
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
            if deserializer.is_human_readable() {
                read(deserializer).map(|v| v as f32)
            } else {
                f32::deserialize(deserializer)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
            Value::Password(_) => f.write_str("***"),
            Value::DateTime(v) => f.write_str(&v.to_rfc3339()),
            Value::TimeSpan(v) => write!(f, "{}ms", v.as_millis()),
            Value::Color(v) => f.write_str(&v.to_hex()),
            Value::Point(v) => write!(f, "{},{}", v.x, v.y),
            Value::Enum(v) => write!(f, "{}::{}", v.type_name, v.variant),
            Value::Object(v) => f.write_str(&v.to_text()),
            Value::Array(_) | Value::Array2D(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

/// Optional inclusive range for numeric leaves
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Bounds {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_least(min: f64) -> Self {
        Bounds {
            min: Some(min),
            max: None,
        }
    }

    pub fn at_most(max: f64) -> Self {
        Bounds {
            min: None,
            max: Some(max),
        }
    }

    /// Non-numeric values are always in bounds.
    pub fn contains(&self, value: &Value) -> bool {
        match value.as_f64() {
            Some(v) => {
                self.min.map_or(true, |min| v >= min) && self.max.map_or(true, |max| v <= max)
            }
            None => true,
        }
    }
}

/// Typed extraction of a leaf value
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

macro_rules! value_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

value_conversions!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => Float,
    f64 => Double,
    char => Char,
    bool => Bool,
    u8 => Byte,
    String => String,
    Secret => Password,
    DateTime<Utc> => DateTime,
    TimeSpan => TimeSpan,
    Color => Color,
    Point => Point,
    Vec<Value> => Array,
    Vec<Vec<Value>> => Array2D,
    EnumValue => Enum,
    ObjectValue => Object,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
