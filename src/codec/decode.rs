use super::temporal::{date_from_days, datetime_from_millis, time_from_millis};
use super::{Datatype, TEXT_DELIMITER, Value};
use crate::error::{ClientError, Result};
use serde_json::Value as Json;
use std::str::FromStr;
use uuid::Uuid;

fn malformed(text: &str) -> ClientError {
    ClientError::protocol(format!("malformed tagged value '{}'", text))
}

fn parse_number<T: FromStr>(payload: &str, text: &str) -> Result<T> {
    payload.parse::<T>().map_err(|_| malformed(text))
}

fn split_tag(text: &str) -> Result<(Datatype, &str)> {
    let bytes = text.as_bytes();
    if bytes.len() < 3 || bytes[2] != TEXT_DELIMITER as u8 || !bytes[..2].iter().all(u8::is_ascii_hexdigit) {
        return Err(malformed(text));
    }
    let tag = u8::from_str_radix(&text[..2], 16).map_err(|_| malformed(text))?;
    let datatype = Datatype::from_tag(tag)
        .ok_or_else(|| ClientError::protocol(format!("unrecognized type tag 0x{:02X}", tag)))?;
    Ok((datatype, &text[3..]))
}

fn decode_tagged(text: &str) -> Result<Value> {
    if let Some(rest) = text.strip_prefix(TEXT_DELIMITER) {
        return Ok(Value::String(rest.to_string()));
    }
    let (datatype, payload) = split_tag(text)?;
    let value = match datatype {
        Datatype::TinyInt => Value::TinyInt(parse_number(payload, text)?),
        Datatype::SmallInt => Value::SmallInt(parse_number(payload, text)?),
        Datatype::Integer => Value::Integer(parse_number(payload, text)?),
        Datatype::BigInt => Value::BigInt(parse_number(payload, text)?),
        Datatype::Float => Value::Float(f32::from_bits(parse_number::<i32>(payload, text)? as u32)),
        Datatype::Double => Value::Double(f64::from_bits(parse_number::<i64>(payload, text)? as u64)),
        Datatype::String => Value::String(payload.to_string()),
        Datatype::Missing => Value::Missing,
        Datatype::Null => Value::Null,
        Datatype::Boolean => match payload {
            "true" | "1" => Value::Boolean(true),
            "false" | "0" => Value::Boolean(false),
            _ => return Err(malformed(text)),
        },
        Datatype::Datetime => Value::Datetime(
            datetime_from_millis(parse_number(payload, text)?).ok_or_else(|| malformed(text))?,
        ),
        Datatype::Date => {
            Value::Date(date_from_days(parse_number(payload, text)?).ok_or_else(|| malformed(text))?)
        }
        Datatype::Time => {
            Value::Time(time_from_millis(parse_number(payload, text)?).ok_or_else(|| malformed(text))?)
        }
        Datatype::Duration => {
            let (months, millis) = payload.split_once(TEXT_DELIMITER).ok_or_else(|| malformed(text))?;
            Value::Duration {
                months: parse_number(months, text)?,
                millis: parse_number(millis, text)?,
            }
        }
        Datatype::YearMonthDuration => Value::YearMonthDuration(parse_number(payload, text)?),
        Datatype::DayTimeDuration => Value::DayTimeDuration(parse_number(payload, text)?),
        Datatype::Uuid => Value::Uuid(Uuid::parse_str(payload).map_err(|_| malformed(text))?),
        Datatype::Array | Datatype::Multiset | Datatype::Object | Datatype::Any => {
            return Err(ClientError::protocol(format!(
                "container type {} cannot be carried in text form",
                datatype
            )));
        }
    };
    Ok(value)
}

/// Decode one value of a result row.
pub fn decode_value(json: &Json) -> Result<Value> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Boolean(*b)),
        Json::Number(n) => match n.as_i64() {
            Some(v) => Ok(Value::BigInt(v)),
            None => n
                .as_f64()
                .map(Value::Double)
                .ok_or_else(|| ClientError::protocol(format!("number out of range: {}", n))),
        },
        Json::String(text) => decode_tagged(text),
        Json::Array(items) => Ok(Value::Array(
            items.iter().map(decode_value).collect::<Result<_>>()?,
        )),
        Json::Object(fields) => Ok(Value::Object(
            fields
                .iter()
                .map(|(name, v)| Ok((name.clone(), decode_value(v)?)))
                .collect::<Result<_>>()?,
        )),
    }
}
