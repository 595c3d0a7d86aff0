//! Tagged value format shared by statement parameters and result rows.
//!
//! Non-string scalars travel as JSON strings of the form `TT:payload`, where
//! `TT` is the type tag in hex. Strings travel as `:text`. 64-bit integers,
//! booleans, null and containers use plain JSON.

mod decode;
mod encode;
pub mod temporal;

pub use decode::decode_value;
pub use encode::{Param, encode_param, encode_params};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use uuid::Uuid;

pub const TEXT_DELIMITER: char = ':';

/// Closed set of wire types understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    String,
    Missing,
    Boolean,
    Datetime,
    Date,
    Time,
    Duration,
    Array,
    Multiset,
    Object,
    Any,
    YearMonthDuration,
    DayTimeDuration,
    Uuid,
    Null,
}

impl Datatype {
    pub const ALL: [Datatype; 21] = [
        Datatype::TinyInt,
        Datatype::SmallInt,
        Datatype::Integer,
        Datatype::BigInt,
        Datatype::Float,
        Datatype::Double,
        Datatype::String,
        Datatype::Missing,
        Datatype::Boolean,
        Datatype::Datetime,
        Datatype::Date,
        Datatype::Time,
        Datatype::Duration,
        Datatype::Array,
        Datatype::Multiset,
        Datatype::Object,
        Datatype::Any,
        Datatype::YearMonthDuration,
        Datatype::DayTimeDuration,
        Datatype::Uuid,
        Datatype::Null,
    ];

    pub fn tag(self) -> u8 {
        match self {
            Datatype::TinyInt => 0x01,
            Datatype::SmallInt => 0x02,
            Datatype::Integer => 0x03,
            Datatype::BigInt => 0x04,
            Datatype::Float => 0x0B,
            Datatype::Double => 0x0C,
            Datatype::String => 0x0D,
            Datatype::Missing => 0x0E,
            Datatype::Boolean => 0x0F,
            Datatype::Datetime => 0x10,
            Datatype::Date => 0x11,
            Datatype::Time => 0x12,
            Datatype::Duration => 0x13,
            Datatype::Array => 0x16,
            Datatype::Multiset => 0x17,
            Datatype::Object => 0x18,
            Datatype::Any => 0x1D,
            Datatype::YearMonthDuration => 0x24,
            Datatype::DayTimeDuration => 0x25,
            Datatype::Uuid => 0x26,
            Datatype::Null => 0x29,
        }
    }

    /// Name used in result signatures.
    pub fn type_name(self) -> &'static str {
        match self {
            Datatype::TinyInt => "int8",
            Datatype::SmallInt => "int16",
            Datatype::Integer => "int32",
            Datatype::BigInt => "int64",
            Datatype::Float => "float",
            Datatype::Double => "double",
            Datatype::String => "string",
            Datatype::Missing => "missing",
            Datatype::Boolean => "boolean",
            Datatype::Datetime => "datetime",
            Datatype::Date => "date",
            Datatype::Time => "time",
            Datatype::Duration => "duration",
            Datatype::Array => "array",
            Datatype::Multiset => "multiset",
            Datatype::Object => "object",
            Datatype::Any => "any",
            Datatype::YearMonthDuration => "year-month-duration",
            Datatype::DayTimeDuration => "day-time-duration",
            Datatype::Uuid => "uuid",
            Datatype::Null => "null",
        }
    }

    pub fn from_tag(tag: u8) -> Option<Datatype> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Look up a signature type name. A trailing `?` marks the column as
    /// nullable and is ignored here.
    pub fn from_type_name(name: &str) -> Option<Datatype> {
        let name = name.strip_suffix('?').unwrap_or(name);
        Self::ALL.into_iter().find(|t| t.type_name() == name)
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Datatype::TinyInt
                | Datatype::SmallInt
                | Datatype::Integer
                | Datatype::BigInt
                | Datatype::Float
                | Datatype::Double
        )
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A decoded wire value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Missing,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Datetime(NaiveDateTime),
    Duration { months: i32, millis: i64 },
    YearMonthDuration(i32),
    DayTimeDuration(i64),
    Uuid(Uuid),
    Array(Vec<Value>),
    Multiset(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl Value {
    pub fn datatype(&self) -> Datatype {
        match self {
            Value::Null => Datatype::Null,
            Value::Missing => Datatype::Missing,
            Value::Boolean(_) => Datatype::Boolean,
            Value::TinyInt(_) => Datatype::TinyInt,
            Value::SmallInt(_) => Datatype::SmallInt,
            Value::Integer(_) => Datatype::Integer,
            Value::BigInt(_) => Datatype::BigInt,
            Value::Float(_) => Datatype::Float,
            Value::Double(_) => Datatype::Double,
            Value::String(_) => Datatype::String,
            Value::Date(_) => Datatype::Date,
            Value::Time(_) => Datatype::Time,
            Value::Datetime(_) => Datatype::Datetime,
            Value::Duration { .. } => Datatype::Duration,
            Value::YearMonthDuration(_) => Datatype::YearMonthDuration,
            Value::DayTimeDuration(_) => Datatype::DayTimeDuration,
            Value::Uuid(_) => Datatype::Uuid,
            Value::Array(_) => Datatype::Array,
            Value::Multiset(_) => Datatype::Multiset,
            Value::Object(_) => Datatype::Object,
        }
    }

    /// Null and missing both read back as SQL null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Missing)
    }

    /// Plain JSON rendering without type tags.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null | Value::Missing => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::TinyInt(v) => Json::from(*v),
            Value::SmallInt(v) => Json::from(*v),
            Value::Integer(v) => Json::from(*v),
            Value::BigInt(v) => Json::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(f64::from(*v))
                .map_or_else(|| Json::String(self.to_string()), Json::Number),
            Value::Double(v) => serde_json::Number::from_f64(*v)
                .map_or_else(|| Json::String(self.to_string()), Json::Number),
            Value::Array(items) | Value::Multiset(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(fields) => Json::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
            other => Json::String(other.to_string()),
        }
    }
}

/// Canonical text rendering, used by string getters.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Missing => f.write_str("missing"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Double(v) => write!(f, "{:?}", v),
            Value::String(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.3f")),
            Value::Datetime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3f")),
            Value::Duration { months, millis } => {
                f.write_str(&temporal::format_duration(*months, *millis))
            }
            Value::YearMonthDuration(months) => f.write_str(&temporal::format_duration(*months, 0)),
            Value::DayTimeDuration(millis) => f.write_str(&temporal::format_duration(0, *millis)),
            Value::Uuid(u) => write!(f, "{}", u.hyphenated()),
            Value::Array(_) | Value::Multiset(_) | Value::Object(_) => {
                write!(f, "{}", self.to_json())
            }
        }
    }
}
