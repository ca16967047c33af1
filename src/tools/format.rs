//! Result serialization for MCP payloads.
//!
//! Converts decoded rows into JSON text. Coercions:
//! - dates, times and timestamps become ISO-8601 strings; infinite dates
//!   arrive as the text `infinity`/`-infinity`
//! - intervals become ISO-8601 durations (`P1DT2H`)
//! - arrays become JSON arrays
//! - NUMERIC becomes a JSON floating-point number. This is lossy: values
//!   beyond f64 precision are rounded. Non-finite decimals stay strings.
//! - binary data becomes a base64 string
//! - everything else passes through unchanged
//!
//! Output is pretty-printed with 2-space indentation; an empty result is `[]`.

use crate::error::DbResult;
use crate::models::{ColumnDescriptor, QueryResult, Record, SqlValue};
use chrono::Timelike;
use serde_json::Value as JsonValue;

/// Convert one cell value to JSON.
pub fn value_to_json(value: &SqlValue) -> JsonValue {
    match value {
        SqlValue::Null => JsonValue::Null,
        SqlValue::Bool(b) => JsonValue::Bool(*b),
        SqlValue::Int(i) => JsonValue::Number((*i).into()),
        SqlValue::Float(f) => float_to_json(*f),
        SqlValue::Decimal(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => float_to_json(f),
            _ => JsonValue::String(s.clone()),
        },
        SqlValue::Text(s) => JsonValue::String(s.clone()),
        SqlValue::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
        SqlValue::Time(t) => JsonValue::String(format!(
            "{}{}",
            t.format("%H:%M:%S"),
            fraction(t.nanosecond())
        )),
        SqlValue::TimeTz(t, offset) => JsonValue::String(format!(
            "{}{}{}",
            t.format("%H:%M:%S"),
            fraction(t.nanosecond()),
            offset
        )),
        SqlValue::Timestamp(ts) => JsonValue::String(format!(
            "{}{}",
            ts.format("%Y-%m-%dT%H:%M:%S"),
            fraction(ts.nanosecond())
        )),
        SqlValue::TimestampTz(ts) => JsonValue::String(format!(
            "{}{}+00:00",
            ts.format("%Y-%m-%dT%H:%M:%S"),
            fraction(ts.nanosecond())
        )),
        SqlValue::Interval {
            months,
            days,
            microseconds,
        } => JsonValue::String(interval_to_iso8601(*months, *days, *microseconds)),
        SqlValue::Json(v) => v.clone(),
        SqlValue::Bytes(bytes) => {
            use base64::{Engine as _, engine::general_purpose::STANDARD};
            JsonValue::String(STANDARD.encode(bytes))
        }
        SqlValue::Array(items) => JsonValue::Array(items.iter().map(value_to_json).collect()),
    }
}

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;

/// ISO-8601 duration in PostgreSQL's `iso_8601` interval style: each
/// component carries its own sign and zero components are left out.
pub fn interval_to_iso8601(months: i32, days: i32, microseconds: i64) -> String {
    let mut out = String::from("P");
    for (amount, unit) in [(months / 12, 'Y'), (months % 12, 'M'), (days, 'D')] {
        if amount != 0 {
            out.push_str(&format!("{amount}{unit}"));
        }
    }

    let hours = microseconds / MICROS_PER_HOUR;
    let minutes = microseconds % MICROS_PER_HOUR / MICROS_PER_MINUTE;
    let micros = microseconds % MICROS_PER_MINUTE;
    if microseconds != 0 {
        out.push('T');
        if hours != 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes != 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if micros != 0 {
            let sign = if micros < 0 { "-" } else { "" };
            let abs = micros.unsigned_abs();
            let whole = abs / MICROS_PER_SECOND as u64;
            let frac = format!("{:06}", abs % MICROS_PER_SECOND as u64);
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                out.push_str(&format!("{sign}{whole}S"));
            } else {
                out.push_str(&format!("{sign}{whole}.{frac}S"));
            }
        }
    }

    if out == "P" { "PT0S".to_string() } else { out }
}

fn float_to_json(f: f64) -> JsonValue {
    serde_json::Number::from_f64(f)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(f.to_string()))
}

/// Microsecond fraction with a leading dot, or nothing for whole seconds.
fn fraction(nanos: u32) -> String {
    if nanos == 0 {
        String::new()
    } else {
        format!(".{:06}", nanos / 1_000)
    }
}

/// Convert a record to a JSON object, keeping column order.
pub fn record_to_json(record: &Record) -> serde_json::Map<String, JsonValue> {
    record
        .iter()
        .map(|(name, value)| (name.to_string(), value_to_json(value)))
        .collect()
}

/// Serialize a query result as a pretty-printed JSON array of row objects.
pub fn to_pretty_json(result: &QueryResult) -> DbResult<String> {
    let rows = result
        .rows
        .iter()
        .map(|r| JsonValue::Object(record_to_json(r)))
        .collect::<Vec<_>>();
    Ok(serde_json::to_string_pretty(&rows)?)
}

/// Serialize a table's column list as a pretty-printed JSON array.
pub fn columns_to_pretty_json(columns: &[ColumnDescriptor]) -> DbResult<String> {
    Ok(serde_json::to_string_pretty(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
    use serde_json::json;

    fn result_of(rows: Vec<Record>) -> QueryResult {
        QueryResult {
            columns: Vec::new(),
            rows,
            execution_time_ms: 0,
        }
    }

    #[test]
    fn test_empty_result_is_empty_array() {
        let text = to_pretty_json(&QueryResult::empty(0)).unwrap();
        assert_eq!(text, "[]");
    }

    #[test]
    fn test_decimal_becomes_number() {
        let value = value_to_json(&SqlValue::Decimal("12.50".to_string()));
        assert_eq!(value, json!(12.5));
        assert_eq!(serde_json::to_string(&value).unwrap(), "12.5");
    }

    #[test]
    fn test_non_finite_decimal_stays_string() {
        assert_eq!(
            value_to_json(&SqlValue::Decimal("NaN".to_string())),
            json!("NaN")
        );
        assert_eq!(
            value_to_json(&SqlValue::Decimal("-Infinity".to_string())),
            json!("-Infinity")
        );
    }

    #[test]
    fn test_date_is_iso8601() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(value_to_json(&SqlValue::Date(date)), json!("2024-03-09"));
    }

    #[test]
    fn test_timestamp_is_iso8601() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap();
        assert_eq!(
            value_to_json(&SqlValue::Timestamp(ts)),
            json!("2024-03-09T14:05:00")
        );

        let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_micro_opt(14, 5, 0, 120)
            .unwrap();
        assert_eq!(
            value_to_json(&SqlValue::Timestamp(ts)),
            json!("2024-03-09T14:05:00.000120")
        );
    }

    #[test]
    fn test_timestamptz_carries_utc_offset() {
        let ts = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            value_to_json(&SqlValue::TimestampTz(ts)),
            json!("2023-12-31T23:59:59+00:00")
        );
    }

    #[test]
    fn test_time_is_iso8601() {
        let t = NaiveTime::from_hms_milli_opt(8, 30, 15, 250).unwrap();
        assert_eq!(value_to_json(&SqlValue::Time(t)), json!("08:30:15.250000"));
    }

    #[test]
    fn test_timetz_keeps_its_offset() {
        let t = NaiveTime::from_hms_opt(10, 15, 0).unwrap();
        let offset = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        assert_eq!(
            value_to_json(&SqlValue::TimeTz(t, offset)),
            json!("10:15:00+05:30")
        );
    }

    #[test]
    fn test_interval_is_iso8601_duration() {
        assert_eq!(interval_to_iso8601(0, 0, 0), "PT0S");
        assert_eq!(interval_to_iso8601(14, 3, 0), "P1Y2M3D");
        assert_eq!(
            interval_to_iso8601(0, 1, 2 * MICROS_PER_HOUR + 3 * MICROS_PER_MINUTE + 4_500_000),
            "P1DT2H3M4.5S"
        );
        assert_eq!(interval_to_iso8601(0, 0, -MICROS_PER_HOUR), "PT-1H");
        assert_eq!(interval_to_iso8601(0, 0, -250_000), "PT-0.25S");
        assert_eq!(interval_to_iso8601(-1, 0, 0), "P-1M");
    }

    #[test]
    fn test_interval_value_is_string() {
        let value = SqlValue::Interval {
            months: 0,
            days: 7,
            microseconds: 0,
        };
        assert_eq!(value_to_json(&value), json!("P7D"));
    }

    #[test]
    fn test_array_elements_are_coerced() {
        let value = SqlValue::Array(vec![
            SqlValue::Decimal("1.50".to_string()),
            SqlValue::Null,
            SqlValue::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
        ]);
        assert_eq!(value_to_json(&value), json!([1.5, null, "2024-01-02"]));
        assert_eq!(value_to_json(&SqlValue::Array(Vec::new())), json!([]));
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(value_to_json(&SqlValue::Null), JsonValue::Null);
        assert_eq!(value_to_json(&SqlValue::Bool(true)), json!(true));
        assert_eq!(value_to_json(&SqlValue::Int(-7)), json!(-7));
        assert_eq!(value_to_json(&SqlValue::Float(1.25)), json!(1.25));
        assert_eq!(value_to_json(&SqlValue::Text("hi".into())), json!("hi"));
        assert_eq!(
            value_to_json(&SqlValue::Json(json!({"a": [1, 2]}))),
            json!({"a": [1, 2]})
        );
    }

    #[test]
    fn test_non_finite_float_becomes_string() {
        assert_eq!(value_to_json(&SqlValue::Float(f64::NAN)), json!("NaN"));
    }

    #[test]
    fn test_bytes_are_base64() {
        assert_eq!(
            value_to_json(&SqlValue::Bytes(b"hello world".to_vec())),
            json!("aGVsbG8gd29ybGQ=")
        );
    }

    #[test]
    fn test_pretty_output_uses_two_space_indent_and_column_order() {
        let mut record = Record::new();
        record.push("name", SqlValue::Text("alice".into()));
        record.push("id", SqlValue::Int(1));
        let text = to_pretty_json(&result_of(vec![record])).unwrap();
        assert_eq!(
            text,
            "[\n  {\n    \"name\": \"alice\",\n    \"id\": 1\n  }\n]"
        );
    }

    #[test]
    fn test_every_row_has_same_keys() {
        let rows = (0..3)
            .map(|i| {
                let mut r = Record::new();
                r.push("id", SqlValue::Int(i));
                r.push("note", SqlValue::Null);
                r
            })
            .collect();
        let text = to_pretty_json(&result_of(rows)).unwrap();
        let parsed: Vec<serde_json::Map<String, JsonValue>> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), 3);
        for row in parsed {
            assert_eq!(row.keys().collect::<Vec<_>>(), vec!["id", "note"]);
        }
    }

    #[test]
    fn test_columns_to_pretty_json() {
        let columns = vec![
            ColumnDescriptor::new("id", "integer"),
            ColumnDescriptor::new("name", "text"),
        ];
        let text = columns_to_pretty_json(&columns).unwrap();
        let parsed: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(
            parsed,
            json!([
                { "column_name": "id", "data_type": "integer" },
                { "column_name": "name", "data_type": "text" }
            ])
        );
    }
}
