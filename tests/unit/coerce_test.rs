use asterix_link::coerce::{
    to_bool, to_bytes, to_date, to_datetime, to_day_time_duration, to_decimal, to_f32, to_f64,
    to_i8, to_i16, to_i32, to_i64, to_string, to_time, to_uuid, to_year_month_duration,
};
use asterix_link::{ClientError, Column, Datatype, Decimal, ErrorKind, Value};
use chrono::{NaiveDate, NaiveTime};
use std::io::Read;
use uuid::Uuid;

fn col(datatype: Datatype) -> Column {
    Column::new("c", datatype, true)
}

fn s(text: &str) -> Value {
    Value::String(text.to_string())
}

// --- Numbers ---

#[test]
fn test_integers_widen_and_narrow() {
    let c = col(Datatype::Integer);
    assert_eq!(to_i64(&Value::TinyInt(-3), &c).unwrap(), -3);
    assert_eq!(to_i64(&Value::Integer(i32::MAX), &c).unwrap(), i64::from(i32::MAX));
    assert_eq!(to_i32(&Value::BigInt(1 << 32 | 7), &c).unwrap(), 7);
    assert_eq!(to_i16(&Value::Integer(65_537), &c).unwrap(), 1);
    assert_eq!(to_i8(&Value::SmallInt(-1), &c).unwrap(), -1);
}

#[test]
fn test_floats_truncate_to_integers() {
    let c = col(Datatype::Double);
    assert_eq!(to_i64(&Value::Double(2.9), &c).unwrap(), 2);
    assert_eq!(to_i64(&Value::Double(-2.9), &c).unwrap(), -2);
    assert_eq!(to_i32(&Value::Float(7.5), &c).unwrap(), 7);
}

#[test]
fn test_booleans_as_numbers() {
    let c = col(Datatype::Boolean);
    assert_eq!(to_i64(&Value::Boolean(true), &c).unwrap(), 1);
    assert_eq!(to_f64(&Value::Boolean(false), &c).unwrap(), 0.0);
}

#[test]
fn test_strings_parse_as_numbers() {
    let c = col(Datatype::String);
    assert_eq!(to_i64(&s(" 42 "), &c).unwrap(), 42);
    assert_eq!(to_i64(&s("3.75"), &c).unwrap(), 3);
    assert_eq!(to_f64(&s("1e2"), &c).unwrap(), 100.0);
    assert_eq!(to_f32(&s("0.5"), &c).unwrap(), 0.5);

    let err = to_i64(&s("forty"), &c).unwrap_err();
    assert!(
        matches!(err, ClientError::TypeMismatch { requested: "integer", .. }),
        "Got: {:?}",
        err
    );
}

#[test]
fn test_float_keeps_precision() {
    let c = col(Datatype::Float);
    assert_eq!(to_f32(&Value::Float(0.1), &c).unwrap(), 0.1f32);
    assert_eq!(to_f64(&Value::Float(0.5), &c).unwrap(), 0.5);
}

// --- Booleans ---

#[test]
fn test_bool_from_numbers_and_text() {
    let c = col(Datatype::String);
    assert!(to_bool(&Value::Integer(2), &c).unwrap());
    assert!(!to_bool(&Value::BigInt(0), &c).unwrap());
    assert!(!to_bool(&Value::Double(0.0), &c).unwrap());
    assert!(!to_bool(&s("0"), &c).unwrap());
    assert!(!to_bool(&s("0.0"), &c).unwrap());
    assert!(!to_bool(&s("FALSE"), &c).unwrap());
    assert!(to_bool(&s("yes"), &c).unwrap());
}

// --- Text ---

#[test]
fn test_text_uses_canonical_form() {
    let c = col(Datatype::Any);
    assert_eq!(to_string(&Value::BigInt(-9), &c).unwrap(), "-9");
    assert_eq!(to_string(&Value::Boolean(true), &c).unwrap(), "true");
    assert_eq!(
        to_string(&Value::Date(NaiveDate::from_ymd_opt(2020, 2, 29).unwrap()), &c).unwrap(),
        "2020-02-29"
    );
    assert_eq!(to_string(&Value::YearMonthDuration(25), &c).unwrap(), "P2Y1M");
    assert_eq!(to_bytes(&s("abc"), &c).unwrap(), b"abc".to_vec());
}

#[test]
fn test_char_stream() {
    let c = col(Datatype::String);
    let mut reader = asterix_link::coerce::to_char_stream(&s("streamed"), &c).unwrap();
    let mut out = String::new();
    reader.read_to_string(&mut out).unwrap();
    assert_eq!(out, "streamed");
}

// --- Temporals ---

#[test]
fn test_temporal_conversions() {
    let c = col(Datatype::Datetime);
    let date = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
    let dt = date.and_hms_milli_opt(13, 14, 15, 16).unwrap();
    assert_eq!(to_date(&Value::Datetime(dt), &c).unwrap(), date);
    assert_eq!(
        to_time(&Value::Datetime(dt), &c).unwrap(),
        NaiveTime::from_hms_milli_opt(13, 14, 15, 16).unwrap()
    );
    assert_eq!(
        to_datetime(&Value::Date(date), &c).unwrap(),
        date.and_hms_opt(0, 0, 0).unwrap()
    );
}

#[test]
fn test_temporal_from_string_is_mismatch() {
    let c = col(Datatype::String);
    let err = to_date(&s("2021-06-01"), &c).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClientUsage);
    assert!(err.to_string().contains("string column c"), "Got: {}", err);
    assert!(to_time(&Value::Date(NaiveDate::default()), &c).is_err());
}

#[test]
fn test_durations() {
    let c = col(Datatype::Duration);
    let composite = Value::Duration { months: 5, millis: 600 };
    assert_eq!(to_year_month_duration(&composite, &c).unwrap(), 5);
    assert_eq!(to_day_time_duration(&composite, &c).unwrap(), 600);
    assert_eq!(to_year_month_duration(&Value::YearMonthDuration(-2), &c).unwrap(), -2);
    assert!(to_day_time_duration(&Value::YearMonthDuration(1), &c).is_err());
}

#[test]
fn test_uuid_from_value_or_text() {
    let c = col(Datatype::Uuid);
    let id = Uuid::new_v4();
    assert_eq!(to_uuid(&Value::Uuid(id), &c).unwrap(), id);
    assert_eq!(to_uuid(&s(&id.hyphenated().to_string()), &c).unwrap(), id);
    assert!(to_uuid(&Value::BigInt(1), &c).is_err());
}

// --- Decimal ---

#[test]
fn test_decimal_parse_and_display() {
    let cases = [
        ("1.50", "1.50", 2),
        ("-0.0", "0.0", 1),
        ("007", "7", 0),
        ("1e3", "1000", 0),
        ("12.5e-3", "0.0125", 4),
        ("+.5", "0.5", 1),
        ("-42", "-42", 0),
    ];
    for (input, shown, scale) in cases {
        let d: Decimal = input.parse().unwrap();
        assert_eq!(d.to_string(), shown, "input {}", input);
        assert_eq!(d.scale(), scale, "input {}", input);
    }
}

#[test]
fn test_decimal_rejects_garbage() {
    for input in ["", "-", "1.2.3", "abc", "1e", "1e99999", "."] {
        let err = input.parse::<Decimal>().unwrap_err();
        assert!(matches!(err, ClientError::InvalidValue { .. }), "input {:?}", input);
    }
}

#[test]
fn test_decimal_from_values() {
    let c = col(Datatype::Double);
    assert_eq!(to_decimal(&Value::Double(0.1), &c).unwrap().to_string(), "0.1");
    assert_eq!(to_decimal(&Value::BigInt(-7), &c).unwrap().to_string(), "-7");
    assert_eq!(to_decimal(&Value::Boolean(true), &c).unwrap().to_string(), "1");
    let d = to_decimal(&s("-3.25"), &c).unwrap();
    assert!(d.is_negative());
    assert_eq!(d.to_f64(), -3.25);
    assert!(to_decimal(&Value::Date(NaiveDate::default()), &c).is_err());
}
