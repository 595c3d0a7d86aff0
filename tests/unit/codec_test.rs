use asterix_link::codec::temporal::format_duration;
use asterix_link::codec::{Datatype, Param, Value, decode_value, encode_param, encode_params};
use asterix_link::{ClientError, ErrorKind};
use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone};
use serde_json::{Value as Json, json};
use uuid::Uuid;

fn encode(param: impl Into<Param>) -> Json {
    encode_param(&param.into()).unwrap()
}

fn round_trip(value: Value) -> Value {
    decode_value(&encode_param(&Param::Value(value)).unwrap()).unwrap()
}

// --- Tags ---

#[test]
fn test_tags_are_distinct_and_reversible() {
    for t in Datatype::ALL {
        assert_eq!(Datatype::from_tag(t.tag()), Some(t));
        assert_eq!(Datatype::from_type_name(t.type_name()), Some(t));
    }
    let mut tags: Vec<u8> = Datatype::ALL.iter().map(|t| t.tag()).collect();
    tags.sort_unstable();
    tags.dedup();
    assert_eq!(tags.len(), Datatype::ALL.len());
}

#[test]
fn test_nullable_suffix_ignored_in_type_name() {
    assert_eq!(Datatype::from_type_name("int32?"), Some(Datatype::Integer));
    assert_eq!(Datatype::from_type_name("nonsense"), None);
}

// --- Encoding ---

#[test]
fn test_integer_widths_are_tagged() {
    assert_eq!(encode(1i32), json!("03:1"));
    assert_eq!(encode(-5i8), json!("01:-5"));
    assert_eq!(encode(300i16), json!("02:300"));
}

#[test]
fn test_plain_json_for_bigint_bool_null() {
    assert_eq!(encode(42i64), json!(42));
    assert_eq!(encode(true), json!(true));
    assert_eq!(encode(Value::Null), Json::Null);
    assert_eq!(encode(None::<i32>), Json::Null);
}

#[test]
fn test_string_uses_text_delimiter() {
    assert_eq!(encode("hello"), json!(":hello"));
    assert_eq!(encode(""), json!(":"));
}

#[test]
fn test_floats_sent_as_bit_patterns() {
    assert_eq!(encode(1.0f32), json!(format!("0B:{}", 1.0f32.to_bits() as i32)));
    assert_eq!(encode(-2.5f64), json!(format!("0C:{}", (-2.5f64).to_bits() as i64)));
}

#[test]
fn test_nan_is_canonical() {
    let odd_nan = f32::from_bits(0x7fc0_0001);
    assert_eq!(encode(odd_nan), json!(format!("0B:{}", 0x7fc0_0000u32 as i32)));
    let odd_nan = f64::from_bits(0x7ff8_0000_0000_0001);
    assert_eq!(
        encode(odd_nan),
        json!(format!("0C:{}", 0x7ff8_0000_0000_0000u64 as i64))
    );
}

#[test]
fn test_naive_temporals() {
    let date = NaiveDate::from_ymd_opt(1970, 1, 11).unwrap();
    assert_eq!(encode(date), json!("11:10"));
    let before = NaiveDate::from_ymd_opt(1969, 12, 31).unwrap();
    assert_eq!(encode(before), json!("11:-1"));
    let time = NaiveTime::from_hms_milli_opt(1, 0, 0, 5).unwrap();
    assert_eq!(encode(time), json!("12:3600005"));
    let dt = date.and_hms_opt(0, 0, 1).unwrap();
    assert_eq!(encode(dt), json!(format!("10:{}", 10 * 86_400_000i64 + 1000)));
}

#[test]
fn test_zoned_datetime_shifted_by_offset() {
    let zone = FixedOffset::east_opt(2 * 3600).unwrap();
    let instant = zone.with_ymd_and_hms(1970, 1, 1, 2, 0, 0).unwrap();
    // The UTC instant is epoch zero; the wall clock reads 02:00.
    assert_eq!(encode(instant), json!(format!("10:{}", 2 * 3_600_000)));
}

#[test]
fn test_zoned_date_and_time_truncate_toward_zero() {
    let zone = FixedOffset::west_opt(5 * 3600).unwrap();
    let instant = zone.with_ymd_and_hms(1969, 12, 31, 18, 0, 0).unwrap();
    let adjusted = instant.timestamp_millis() - 5 * 3_600_000;
    assert_eq!(
        encode_param(&Param::zoned_date(&instant)).unwrap(),
        json!(format!("11:{}", adjusted / 86_400_000))
    );
    assert_eq!(
        encode_param(&Param::zoned_time(&instant)).unwrap(),
        json!(format!("12:{}", adjusted % 86_400_000))
    );
}

#[test]
fn test_durations_and_uuid() {
    assert_eq!(encode(Value::YearMonthDuration(14)), json!("24:14"));
    assert_eq!(encode(Value::DayTimeDuration(-1500)), json!("25:-1500"));
    let id = Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap();
    assert_eq!(encode(id), json!("26:6ba7b810-9dad-11d1-80b4-00c04fd430c8"));
}

#[test]
fn test_containers_encode_elements() {
    let value = Value::Object(vec![
        ("a".to_string(), Value::Integer(1)),
        ("b".to_string(), Value::Array(vec![Value::String("x".into()), Value::Null])),
    ]);
    assert_eq!(encode(value), json!({"a": "03:1", "b": [":x", null]}));
}

#[test]
fn test_unsupported_parameter_types() {
    let err = encode_param(&Param::Value(Value::Missing)).unwrap_err();
    assert!(matches!(err, ClientError::UnsupportedType { ref type_name } if type_name == "missing"));
    assert_eq!(err.kind(), ErrorKind::ClientUsage);

    let err = encode_params(&[
        Param::from(1i32),
        Param::Value(Value::Duration { months: 1, millis: 0 }),
    ])
    .unwrap_err();
    assert!(matches!(err, ClientError::UnsupportedType { ref type_name } if type_name == "duration"));
}

// --- Decoding ---

#[test]
fn test_round_trip_scalars() {
    let values = [
        Value::TinyInt(i8::MIN),
        Value::SmallInt(i16::MAX),
        Value::Integer(i32::MIN),
        Value::BigInt(i64::MAX),
        Value::Float(-0.0),
        Value::Double(f64::MAX),
        Value::String(":leading colon".to_string()),
        Value::Boolean(false),
        Value::Date(NaiveDate::from_ymd_opt(1900, 2, 28).unwrap()),
        Value::Time(NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap()),
        Value::YearMonthDuration(-3),
        Value::DayTimeDuration(86_400_001),
        Value::Uuid(Uuid::nil()),
    ];
    for value in values {
        assert_eq!(round_trip(value.clone()), value);
    }
}

#[test]
fn test_decode_plain_json() {
    assert_eq!(decode_value(&json!(7)).unwrap(), Value::BigInt(7));
    assert_eq!(decode_value(&json!(1.5)).unwrap(), Value::Double(1.5));
    assert_eq!(decode_value(&Json::Null).unwrap(), Value::Null);
    assert_eq!(
        decode_value(&json!({"k": [1, "0F:true"]})).unwrap(),
        Value::Object(vec![(
            "k".to_string(),
            Value::Array(vec![Value::BigInt(1), Value::Boolean(true)])
        )])
    );
}

#[test]
fn test_decode_missing_and_composite_duration() {
    assert_eq!(decode_value(&json!("0E:")).unwrap(), Value::Missing);
    assert!(Value::Missing.is_null());
    assert_eq!(
        decode_value(&json!("13:14:3000")).unwrap(),
        Value::Duration { months: 14, millis: 3000 }
    );
}

#[test]
fn test_decode_lowercase_tag() {
    assert_eq!(decode_value(&json!("0b:0")).unwrap(), Value::Float(0.0));
}

#[test]
fn test_decode_rejects_bad_input() {
    for text in ["03:abc", "3:1", "ZZ:1", "0F:yes", "26:not-a-uuid", "03", "+3:5", "+F:true", "-3:1"] {
        let err = decode_value(&json!(text)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol, "input {}", text);
    }
    let err = decode_value(&json!("7F:1")).unwrap_err();
    assert!(err.to_string().contains("0x7F"), "Got: {}", err);
    let err = decode_value(&json!("16:[]")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

// --- Text rendering ---

#[test]
fn test_canonical_text() {
    assert_eq!(Value::Double(1.0).to_string(), "1.0");
    assert_eq!(
        Value::Time(NaiveTime::from_hms_milli_opt(4, 5, 6, 70).unwrap()).to_string(),
        "04:05:06.070"
    );
    assert_eq!(
        Value::Datetime(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(12, 0, 0).unwrap())
            .to_string(),
        "2024-03-01T12:00:00.000"
    );
    assert_eq!(Value::Array(vec![Value::BigInt(1)]).to_string(), "[1]");
}

#[test]
fn test_duration_text() {
    assert_eq!(format_duration(0, 0), "PT0S");
    assert_eq!(format_duration(14, 0), "P1Y2M");
    assert_eq!(
        format_duration(14, 3 * 86_400_000 + 4 * 3_600_000 + 5 * 60_000 + 6789),
        "P1Y2M3DT4H5M6.789S"
    );
    assert_eq!(format_duration(0, -1500), "-PT1.500S");
}
