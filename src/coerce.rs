//! Conversions from decoded wire values to the types requested by cursor getters.
//!
//! Callers handle null and missing values before reaching these functions.

use crate::codec::Value;
use crate::cursor::Column;
use crate::error::{ClientError, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const MAX_EXPONENT: i64 = 10_000;

/// Exact decimal number kept as digits plus scale, never routed through a binary float.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal {
    negative: bool,
    digits: String,
    scale: u32,
}

impl Decimal {
    /// Number of digits after the decimal point.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn to_f64(&self) -> f64 {
        self.to_string().parse().unwrap_or(f64::NAN)
    }

    fn parse(text: &str) -> Option<Decimal> {
        let text = text.trim();
        let (negative, rest) = match text.as_bytes().first()? {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };
        let (mantissa, exponent) = match rest.find(['e', 'E']) {
            Some(p) => (&rest[..p], rest[p + 1..].parse::<i64>().ok()?),
            None => (rest, 0),
        };
        if exponent.abs() > MAX_EXPONENT {
            return None;
        }
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }

        let mut digits = format!("{}{}", int_part, frac_part);
        let mut scale = frac_part.len() as i64 - exponent;
        if scale < 0 {
            digits.extend(std::iter::repeat_n('0', scale.unsigned_abs() as usize));
            scale = 0;
        }
        let trimmed = digits.trim_start_matches('0');
        let digits = if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() };
        let negative = negative && digits != "0";
        Some(Decimal {
            negative,
            digits,
            scale: u32::try_from(scale).ok()?,
        })
    }
}

impl FromStr for Decimal {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        Decimal::parse(s).ok_or_else(|| ClientError::InvalidValue {
            parameter: format!("decimal '{}'", s),
        })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            f.write_str("-")?;
        }
        let scale = self.scale as usize;
        if scale == 0 {
            return f.write_str(&self.digits);
        }
        let padded = if self.digits.len() <= scale {
            format!("{}{}", "0".repeat(scale + 1 - self.digits.len()), self.digits)
        } else {
            self.digits.clone()
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{}.{}", int_part, frac_part)
    }
}

fn mismatch(value: &Value, column: &Column, requested: &'static str) -> ClientError {
    ClientError::TypeMismatch {
        column: column.name().to_string(),
        requested,
        actual: value.datatype().type_name().to_string(),
    }
}

pub fn to_i64(value: &Value, column: &Column) -> Result<i64> {
    match value {
        Value::TinyInt(v) => Ok(i64::from(*v)),
        Value::SmallInt(v) => Ok(i64::from(*v)),
        Value::Integer(v) => Ok(i64::from(*v)),
        Value::BigInt(v) => Ok(*v),
        Value::Float(v) => Ok(*v as i64),
        Value::Double(v) => Ok(*v as i64),
        Value::Boolean(b) => Ok(i64::from(*b)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                .ok_or_else(|| mismatch(value, column, "integer"))
        }
        _ => Err(mismatch(value, column, "integer")),
    }
}

pub fn to_i32(value: &Value, column: &Column) -> Result<i32> {
    to_i64(value, column).map(|v| v as i32)
}

pub fn to_i16(value: &Value, column: &Column) -> Result<i16> {
    to_i64(value, column).map(|v| v as i16)
}

pub fn to_i8(value: &Value, column: &Column) -> Result<i8> {
    to_i64(value, column).map(|v| v as i8)
}

pub fn to_f64(value: &Value, column: &Column) -> Result<f64> {
    match value {
        Value::TinyInt(v) => Ok(f64::from(*v)),
        Value::SmallInt(v) => Ok(f64::from(*v)),
        Value::Integer(v) => Ok(f64::from(*v)),
        Value::BigInt(v) => Ok(*v as f64),
        Value::Float(v) => Ok(f64::from(*v)),
        Value::Double(v) => Ok(*v),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| mismatch(value, column, "double")),
        _ => Err(mismatch(value, column, "double")),
    }
}

pub fn to_f32(value: &Value, column: &Column) -> Result<f32> {
    match value {
        Value::Float(v) => Ok(*v),
        _ => to_f64(value, column).map(|v| v as f32),
    }
}

/// `0`, `0.0` and `false` read as false, anything else as true.
pub fn to_bool(value: &Value, column: &Column) -> Result<bool> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::TinyInt(_) | Value::SmallInt(_) | Value::Integer(_) | Value::BigInt(_) => {
            to_i64(value, column).map(|v| v != 0)
        }
        Value::Float(_) | Value::Double(_) => to_f64(value, column).map(|v| v != 0.0),
        Value::String(s) => {
            let s = s.trim();
            Ok(!(s == "0" || s == "0.0" || s.eq_ignore_ascii_case("false")))
        }
        _ => Err(mismatch(value, column, "boolean")),
    }
}

pub fn to_decimal(value: &Value, column: &Column) -> Result<Decimal> {
    match value {
        Value::TinyInt(_)
        | Value::SmallInt(_)
        | Value::Integer(_)
        | Value::BigInt(_)
        | Value::Float(_)
        | Value::Double(_)
        | Value::String(_) => {
            Decimal::parse(&value.to_string()).ok_or_else(|| mismatch(value, column, "decimal"))
        }
        Value::Boolean(b) => Ok(Decimal {
            negative: false,
            digits: if *b { "1" } else { "0" }.to_string(),
            scale: 0,
        }),
        _ => Err(mismatch(value, column, "decimal")),
    }
}

pub fn to_string(value: &Value, _column: &Column) -> Result<String> {
    Ok(value.to_string())
}

pub fn to_bytes(value: &Value, _column: &Column) -> Result<Vec<u8>> {
    Ok(value.to_string().into_bytes())
}

pub fn to_char_stream(value: &Value, _column: &Column) -> Result<std::io::Cursor<String>> {
    Ok(std::io::Cursor::new(value.to_string()))
}

pub fn to_date(value: &Value, column: &Column) -> Result<NaiveDate> {
    match value {
        Value::Date(d) => Ok(*d),
        Value::Datetime(dt) => Ok(dt.date()),
        _ => Err(mismatch(value, column, "date")),
    }
}

pub fn to_time(value: &Value, column: &Column) -> Result<NaiveTime> {
    match value {
        Value::Time(t) => Ok(*t),
        Value::Datetime(dt) => Ok(dt.time()),
        _ => Err(mismatch(value, column, "time")),
    }
}

pub fn to_datetime(value: &Value, column: &Column) -> Result<NaiveDateTime> {
    match value {
        Value::Datetime(dt) => Ok(*dt),
        Value::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
        _ => Err(mismatch(value, column, "datetime")),
    }
}

pub fn to_year_month_duration(value: &Value, column: &Column) -> Result<i32> {
    match value {
        Value::YearMonthDuration(months) => Ok(*months),
        Value::Duration { months, .. } => Ok(*months),
        _ => Err(mismatch(value, column, "year-month-duration")),
    }
}

pub fn to_day_time_duration(value: &Value, column: &Column) -> Result<i64> {
    match value {
        Value::DayTimeDuration(millis) => Ok(*millis),
        Value::Duration { millis, .. } => Ok(*millis),
        _ => Err(mismatch(value, column, "day-time-duration")),
    }
}

pub fn to_uuid(value: &Value, column: &Column) -> Result<Uuid> {
    match value {
        Value::Uuid(u) => Ok(*u),
        Value::String(s) => Uuid::parse_str(s.trim()).map_err(|_| mismatch(value, column, "uuid")),
        _ => Err(mismatch(value, column, "uuid")),
    }
}

pub fn to_value(value: &Value, _column: &Column) -> Result<Value> {
    Ok(value.clone())
}
