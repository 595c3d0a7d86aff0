use super::temporal::{
    chronon_adjusted, datetime_millis, days_since_epoch, millis_of_day, time_of_day_millis,
    truncate_to_days,
};
use super::{Datatype, TEXT_DELIMITER, Value};
use crate::error::{ClientError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde_json::Value as Json;
use uuid::Uuid;

const CANONICAL_NAN_F32: u32 = 0x7fc0_0000;
const CANONICAL_NAN_F64: u64 = 0x7ff8_0000_0000_0000;

/// A statement parameter.
///
/// Zone-aware temporal parameters are shifted by their offset before they are
/// written, so the server sees the local wall-clock reading.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Value(Value),
    ZonedDate(DateTime<FixedOffset>),
    ZonedTime(DateTime<FixedOffset>),
    ZonedDatetime(DateTime<FixedOffset>),
}

impl Param {
    pub fn zoned_date<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        Param::ZonedDate(instant.fixed_offset())
    }

    pub fn zoned_time<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        Param::ZonedTime(instant.fixed_offset())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Param::Value(v) => v.datatype().type_name(),
            Param::ZonedDate(_) => "date",
            Param::ZonedTime(_) => "time",
            Param::ZonedDatetime(_) => "datetime",
        }
    }
}

macro_rules! param_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Param {
                fn from(v: $ty) -> Self {
                    Param::Value(Value::$variant(v.into()))
                }
            }
        )*
    };
}

param_from! {
    bool => Boolean,
    i8 => TinyInt,
    i16 => SmallInt,
    i32 => Integer,
    i64 => BigInt,
    f32 => Float,
    f64 => Double,
    String => String,
    &str => String,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Datetime,
    Uuid => Uuid,
}

impl From<Value> for Param {
    fn from(v: Value) -> Self {
        Param::Value(v)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Param {
    fn from(v: DateTime<Tz>) -> Self {
        Param::ZonedDatetime(v.fixed_offset())
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        v.map_or(Param::Value(Value::Null), Into::into)
    }
}

fn tagged(datatype: Datatype, payload: impl std::fmt::Display) -> Json {
    Json::String(format!("{:02X}{}{}", datatype.tag(), TEXT_DELIMITER, payload))
}

fn float_bits(v: f32) -> i32 {
    let bits = if v.is_nan() { CANONICAL_NAN_F32 } else { v.to_bits() };
    bits as i32
}

fn double_bits(v: f64) -> i64 {
    let bits = if v.is_nan() { CANONICAL_NAN_F64 } else { v.to_bits() };
    bits as i64
}

fn encode_value(value: &Value) -> Result<Json> {
    let json = match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::BigInt(v) => Json::from(*v),
        Value::TinyInt(v) => tagged(Datatype::TinyInt, v),
        Value::SmallInt(v) => tagged(Datatype::SmallInt, v),
        Value::Integer(v) => tagged(Datatype::Integer, v),
        Value::Float(v) => tagged(Datatype::Float, float_bits(*v)),
        Value::Double(v) => tagged(Datatype::Double, double_bits(*v)),
        Value::String(s) => Json::String(format!("{}{}", TEXT_DELIMITER, s)),
        Value::Date(d) => tagged(Datatype::Date, days_since_epoch(*d)),
        Value::Time(t) => tagged(Datatype::Time, millis_of_day(*t)),
        Value::Datetime(dt) => tagged(Datatype::Datetime, datetime_millis(*dt)),
        Value::YearMonthDuration(months) => tagged(Datatype::YearMonthDuration, months),
        Value::DayTimeDuration(millis) => tagged(Datatype::DayTimeDuration, millis),
        Value::Uuid(u) => tagged(Datatype::Uuid, u.hyphenated()),
        Value::Array(items) | Value::Multiset(items) => {
            Json::Array(items.iter().map(encode_value).collect::<Result<_>>()?)
        }
        Value::Object(fields) => Json::Object(
            fields
                .iter()
                .map(|(name, v)| Ok((name.clone(), encode_value(v)?)))
                .collect::<Result<_>>()?,
        ),
        Value::Missing | Value::Duration { .. } => {
            return Err(ClientError::UnsupportedType {
                type_name: value.datatype().type_name().to_string(),
            });
        }
    };
    Ok(json)
}

pub fn encode_param(param: &Param) -> Result<Json> {
    match param {
        Param::Value(v) => encode_value(v),
        Param::ZonedDate(instant) => Ok(tagged(
            Datatype::Date,
            truncate_to_days(chronon_adjusted(instant)),
        )),
        Param::ZonedTime(instant) => Ok(tagged(
            Datatype::Time,
            time_of_day_millis(chronon_adjusted(instant)),
        )),
        Param::ZonedDatetime(instant) => Ok(tagged(Datatype::Datetime, chronon_adjusted(instant))),
    }
}

pub fn encode_params(params: &[Param]) -> Result<Vec<Json>> {
    params.iter().map(encode_param).collect()
}
