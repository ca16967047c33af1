//! PostgreSQL row decoding.
//!
//! This module turns driver rows into [`Record`]s of [`SqlValue`]s.
//!
//! # Architecture
//!
//! Decoding uses a two-phase approach:
//! 1. `classify` maps the column's type to a `TypeCategory`, either as a
//!    scalar or as the element of a one-dimensional array
//! 2. A per-category decoder extracts the value with the matching Rust type
//!
//! Types the driver cannot read safely (NUMERIC, infinite dates, network
//! addresses, bit strings, text-like extension types) go through the raw
//! wrappers below. A column whose type has no mapping fails the query with
//! [`DbError::UnsupportedType`] instead of silently becoming null.

use crate::error::{DbError, DbResult};
use crate::models::{Record, SqlValue};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use sqlx::error::BoxDynError;
use sqlx::postgres::types::{Oid, PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{
    PgHasArrayType, PgRow, PgTypeInfo, PgTypeKind, PgValueFormat, PgValueRef, Postgres,
};
use sqlx::{Column, Decode, Row, Type, TypeInfo};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for PostgreSQL column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    SmallInt,
    Integer,
    BigInt,
    Oid,
    Real,
    Double,
    Decimal,
    Money,
    Boolean,
    /// The single-byte `"char"` type, not `CHAR(n)`
    Char,
    Date,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
    Interval,
    Json,
    Uuid,
    Binary,
    Network,
    MacAddr,
    BitString,
    Text,
    Unsupported,
}

/// Shape of a result column: a plain value or a one-dimensional array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Scalar(TypeCategory),
    ArrayOf(TypeCategory),
}

impl ColumnKind {
    pub fn category(self) -> TypeCategory {
        match self {
            Self::Scalar(category) | Self::ArrayOf(category) => category,
        }
    }
}

/// Classify a PostgreSQL type name (as reported by the driver) into a category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    match type_name.to_ascii_uppercase().as_str() {
        "INT2" | "SMALLINT" => TypeCategory::SmallInt,
        "INT4" | "INTEGER" => TypeCategory::Integer,
        "INT8" | "BIGINT" => TypeCategory::BigInt,
        "OID" => TypeCategory::Oid,
        "FLOAT4" | "REAL" => TypeCategory::Real,
        "FLOAT8" | "DOUBLE PRECISION" => TypeCategory::Double,
        "NUMERIC" | "DECIMAL" => TypeCategory::Decimal,
        "MONEY" => TypeCategory::Money,
        "BOOL" | "BOOLEAN" => TypeCategory::Boolean,
        "\"CHAR\"" => TypeCategory::Char,
        "DATE" => TypeCategory::Date,
        "TIME" => TypeCategory::Time,
        "TIMETZ" => TypeCategory::TimeTz,
        "TIMESTAMP" => TypeCategory::Timestamp,
        "TIMESTAMPTZ" => TypeCategory::TimestampTz,
        "INTERVAL" => TypeCategory::Interval,
        "JSON" | "JSONB" => TypeCategory::Json,
        "UUID" => TypeCategory::Uuid,
        "BYTEA" => TypeCategory::Binary,
        "INET" | "CIDR" => TypeCategory::Network,
        "MACADDR" | "MACADDR8" => TypeCategory::MacAddr,
        "BIT" | "VARBIT" => TypeCategory::BitString,
        // "CHAR" is the driver's name for bpchar
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" | "UNKNOWN" | "XML" => {
            TypeCategory::Text
        }
        _ => TypeCategory::Unsupported,
    }
}

/// Category of a single (non-array) type. Enum labels decode as text.
fn category_of(ty: &PgTypeInfo) -> TypeCategory {
    match ty.kind() {
        PgTypeKind::Enum(_) => TypeCategory::Text,
        _ => categorize_type(ty.name()),
    }
}

/// Classify a column type, looking through one level of array.
pub fn classify(ty: &PgTypeInfo) -> ColumnKind {
    match ty.kind() {
        PgTypeKind::Array(element) => ColumnKind::ArrayOf(category_of(element)),
        _ => ColumnKind::Scalar(category_of(ty)),
    }
}

fn element_compatible<T: Type<Postgres>>(ty: &PgTypeInfo) -> bool {
    matches!(ty.kind(), PgTypeKind::Array(element) if T::compatible(element))
}

/// Implements `Type` and `PgHasArrayType` for a raw wrapper, accepting every
/// column that classifies into `$category`.
macro_rules! impl_raw_type {
    ($ty:ty, $name:literal, $array_name:literal, $category:expr) => {
        impl Type<Postgres> for $ty {
            fn type_info() -> PgTypeInfo {
                PgTypeInfo::with_name($name)
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                category_of(ty) == $category
            }
        }

        impl PgHasArrayType for $ty {
            fn array_type_info() -> PgTypeInfo {
                PgTypeInfo::with_name($array_name)
            }

            fn array_compatible(ty: &PgTypeInfo) -> bool {
                element_compatible::<$ty>(ty)
            }
        }
    };
}

fn be_bytes<const N: usize>(bytes: &[u8]) -> Result<[u8; N], BoxDynError> {
    bytes
        .try_into()
        .map_err(|_| format!("expected {N} bytes, got {}", bytes.len()).into())
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw NUMERIC values as strings.
/// This preserves the exact database representation (scale included).
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl_raw_type!(RawDecimal, "NUMERIC", "_numeric", TypeCategory::Decimal);

impl<'r> Decode<'r, Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(RawDecimal(value.as_str()?.to_string())),
            PgValueFormat::Binary => Ok(RawDecimal(numeric_binary_to_string(value.as_bytes()?)?)),
        }
    }
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Render PostgreSQL's binary NUMERIC wire format as decimal text.
///
/// Layout: `ndigits`, `weight`, `sign`, `dscale` (all 16-bit big-endian)
/// followed by `ndigits` base-10000 digits. `weight` is the base-10000
/// exponent of the first digit, `dscale` the number of decimal places.
pub fn numeric_binary_to_string(bytes: &[u8]) -> Result<String, String> {
    fn read_u16(bytes: &[u8], at: usize) -> Result<u16, String> {
        bytes
            .get(at..at + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated NUMERIC value".to_string())
    }

    let ndigits = read_u16(bytes, 0)? as usize;
    let weight = read_u16(bytes, 2)? as i16 as i32;
    let sign = read_u16(bytes, 4)?;
    let dscale = read_u16(bytes, 6)? as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(format!("invalid NUMERIC sign 0x{other:04X}")),
    }

    let digits = (0..ndigits)
        .map(|i| read_u16(bytes, 8 + i * 2))
        .collect::<Result<Vec<_>, _>>()?;
    let digit_at = |index: i32| -> u16 {
        if index < 0 {
            0
        } else {
            digits.get(index as usize).copied().unwrap_or(0)
        }
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&digit_at(0).to_string());
        for index in 1..=weight {
            out.push_str(&format!("{:04}", digit_at(index)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut index = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", digit_at(index)));
            index += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Ok(out)
}

/// MONEY amount in cents as decimal text. Assumes a locale with two
/// fractional digits, which is also what the driver assumes.
pub fn money_to_decimal(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

// =============================================================================
// Date/Time Support
// =============================================================================

/// DATE, TIMESTAMP or TIMESTAMPTZ value that may be one of PostgreSQL's
/// infinities. The driver's own chrono decoders overflow on those.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgTemporal<T> {
    Finite(T),
    Infinity,
    NegInfinity,
}

impl<T> PgTemporal<T> {
    fn into_value(self, finite: fn(T) -> SqlValue) -> SqlValue {
        match self {
            Self::Finite(v) => finite(v),
            Self::Infinity => SqlValue::Text("infinity".to_string()),
            Self::NegInfinity => SqlValue::Text("-infinity".to_string()),
        }
    }

    /// Text-format values: the infinities are spelled out, anything else
    /// goes to the driver's decoder.
    fn from_text<'r>(
        value: PgValueRef<'r>,
        finite: impl FnOnce(PgValueRef<'r>) -> Result<T, BoxDynError>,
    ) -> Result<Self, BoxDynError> {
        match value.as_str()? {
            "infinity" => Ok(Self::Infinity),
            "-infinity" => Ok(Self::NegInfinity),
            _ => finite(value).map(Self::Finite),
        }
    }
}

impl_raw_type!(PgTemporal<NaiveDate>, "DATE", "_date", TypeCategory::Date);
impl_raw_type!(PgTemporal<NaiveDateTime>, "TIMESTAMP", "_timestamp", TypeCategory::Timestamp);
impl_raw_type!(PgTemporal<DateTime<Utc>>, "TIMESTAMPTZ", "_timestamptz", TypeCategory::TimestampTz);

fn pg_epoch() -> Result<NaiveDateTime, BoxDynError> {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| "invalid PostgreSQL epoch".into())
}

/// DATE wire value: days since 2000-01-01, with `i32::MAX`/`i32::MIN`
/// standing for `infinity`/`-infinity`.
pub fn date_from_days(days: i32) -> Result<PgTemporal<NaiveDate>, BoxDynError> {
    match days {
        i32::MAX => Ok(PgTemporal::Infinity),
        i32::MIN => Ok(PgTemporal::NegInfinity),
        days => TimeDelta::try_days(days.into())
            .and_then(|delta| pg_epoch().ok()?.date().checked_add_signed(delta))
            .map(PgTemporal::Finite)
            .ok_or_else(|| format!("DATE out of range: {days} days from 2000-01-01").into()),
    }
}

/// TIMESTAMP wire value: microseconds since 2000-01-01 00:00:00, with
/// `i64::MAX`/`i64::MIN` standing for `infinity`/`-infinity`.
pub fn timestamp_from_micros(micros: i64) -> Result<PgTemporal<NaiveDateTime>, BoxDynError> {
    match micros {
        i64::MAX => Ok(PgTemporal::Infinity),
        i64::MIN => Ok(PgTemporal::NegInfinity),
        micros => pg_epoch()?
            .checked_add_signed(TimeDelta::microseconds(micros))
            .map(PgTemporal::Finite)
            .ok_or_else(|| {
                format!("TIMESTAMP out of range: {micros} microseconds from 2000-01-01").into()
            }),
    }
}

impl<'r> Decode<'r, Postgres> for PgTemporal<NaiveDate> {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Binary => date_from_days(i32::from_be_bytes(be_bytes(value.as_bytes()?)?)),
            PgValueFormat::Text => Self::from_text(value, <NaiveDate as Decode<'r, Postgres>>::decode),
        }
    }
}

impl<'r> Decode<'r, Postgres> for PgTemporal<NaiveDateTime> {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Binary => {
                timestamp_from_micros(i64::from_be_bytes(be_bytes(value.as_bytes()?)?))
            }
            PgValueFormat::Text => Self::from_text(value, <NaiveDateTime as Decode<'r, Postgres>>::decode),
        }
    }
}

impl<'r> Decode<'r, Postgres> for PgTemporal<DateTime<Utc>> {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Binary => {
                let micros = i64::from_be_bytes(be_bytes(value.as_bytes()?)?);
                Ok(match timestamp_from_micros(micros)? {
                    PgTemporal::Finite(naive) => PgTemporal::Finite(naive.and_utc()),
                    PgTemporal::Infinity => PgTemporal::Infinity,
                    PgTemporal::NegInfinity => PgTemporal::NegInfinity,
                })
            }
            PgValueFormat::Text => Self::from_text(value, <DateTime<Utc> as Decode<'r, Postgres>>::decode),
        }
    }
}

// =============================================================================
// Textual and Network Types
// =============================================================================

/// Any type whose wire value is its text: text-like types, XML and enum labels.
#[derive(Debug)]
pub struct RawText(pub String);

impl_raw_type!(RawText, "TEXT", "_text", TypeCategory::Text);

impl<'r> Decode<'r, Postgres> for RawText {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        Ok(RawText(value.as_str()?.to_string()))
    }
}

/// INET or CIDR value rendered the way PostgreSQL prints it.
#[derive(Debug)]
pub struct RawNetwork(pub String);

impl_raw_type!(RawNetwork, "INET", "_inet", TypeCategory::Network);

impl<'r> Decode<'r, Postgres> for RawNetwork {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(RawNetwork(value.as_str()?.to_string())),
            PgValueFormat::Binary => Ok(RawNetwork(inet_binary_to_string(value.as_bytes()?)?)),
        }
    }
}

const PGSQL_AF_INET: u8 = 2;
const PGSQL_AF_INET6: u8 = 3;

/// Layout: family, prefix bits, is-cidr flag, address length, address bytes.
/// An INET host address omits the prefix; CIDR always shows it.
pub fn inet_binary_to_string(bytes: &[u8]) -> Result<String, String> {
    let [family, bits, is_cidr, len, address @ ..] = bytes else {
        return Err("truncated INET value".to_string());
    };
    if address.len() != usize::from(*len) {
        return Err(format!(
            "INET address length {len} does not match {} bytes",
            address.len()
        ));
    }

    let (ip, max_bits) = match (*family, address) {
        (PGSQL_AF_INET, &[a, b, c, d]) => (IpAddr::V4(Ipv4Addr::new(a, b, c, d)), 32),
        (PGSQL_AF_INET6, octets) if octets.len() == 16 => {
            let mut buf = [0u8; 16];
            buf.copy_from_slice(octets);
            (IpAddr::V6(Ipv6Addr::from(buf)), 128)
        }
        (family, _) => return Err(format!("invalid INET family {family}")),
    };

    if *is_cidr != 0 || *bits != max_bits {
        Ok(format!("{ip}/{bits}"))
    } else {
        Ok(ip.to_string())
    }
}

/// MACADDR or MACADDR8 value as colon-separated hex.
#[derive(Debug)]
pub struct RawMacAddr(pub String);

impl_raw_type!(RawMacAddr, "MACADDR", "_macaddr", TypeCategory::MacAddr);

impl<'r> Decode<'r, Postgres> for RawMacAddr {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(RawMacAddr(value.as_str()?.to_string())),
            PgValueFormat::Binary => {
                let bytes = value.as_bytes()?;
                if bytes.len() != 6 && bytes.len() != 8 {
                    return Err(format!("invalid MACADDR length {}", bytes.len()).into());
                }
                let octets: Vec<String> = bytes.iter().map(|b| format!("{b:02x}")).collect();
                Ok(RawMacAddr(octets.join(":")))
            }
        }
    }
}

/// BIT or VARBIT value as a string of `0`/`1`.
#[derive(Debug)]
pub struct RawBits(pub String);

impl_raw_type!(RawBits, "VARBIT", "_varbit", TypeCategory::BitString);

impl<'r> Decode<'r, Postgres> for RawBits {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(RawBits(value.as_str()?.to_string())),
            PgValueFormat::Binary => Ok(RawBits(bits_binary_to_string(value.as_bytes()?)?)),
        }
    }
}

/// Layout: bit count (32-bit big-endian), then the bits packed MSB first.
pub fn bits_binary_to_string(bytes: &[u8]) -> Result<String, String> {
    let (len, data) = bytes
        .split_first_chunk::<4>()
        .ok_or_else(|| "truncated BIT value".to_string())?;
    let len = usize::try_from(i32::from_be_bytes(*len))
        .map_err(|_| "negative BIT length".to_string())?;
    if data.len() * 8 < len {
        return Err(format!("BIT value of {len} bits has only {} bytes", data.len()));
    }
    Ok((0..len)
        .map(|i| if data[i / 8] & (0x80 >> (i % 8)) != 0 { '1' } else { '0' })
        .collect())
}

// =============================================================================
// Row Decoding
// =============================================================================

/// Decode every column of a row into a record, keeping projection order.
///
/// Fails on the first column that has no mapping or cannot be decoded.
pub fn row_to_record(row: &PgRow) -> DbResult<Record> {
    let mut record = Record::with_capacity(row.columns().len());
    for (idx, col) in row.columns().iter().enumerate() {
        let type_name = col.type_info().name();
        let kind = classify(col.type_info());
        if kind.category() == TypeCategory::Unsupported {
            return Err(DbError::unsupported_type(col.name(), type_name));
        }
        let value = decode_column(row, idx, kind).map_err(|e| {
            DbError::internal(format!(
                "Failed to decode column '{}' of type {type_name}: {e}",
                col.name()
            ))
        })?;
        record.push(col.name(), value);
    }
    Ok(record)
}

fn decode_column(row: &PgRow, idx: usize, kind: ColumnKind) -> Result<SqlValue, sqlx::Error> {
    let array = matches!(kind, ColumnKind::ArrayOf(_));
    match kind.category() {
        TypeCategory::SmallInt => decode_as::<i16>(row, idx, array, |v| SqlValue::Int(v.into())),
        TypeCategory::Integer => decode_as::<i32>(row, idx, array, |v| SqlValue::Int(v.into())),
        TypeCategory::BigInt => decode_as::<i64>(row, idx, array, SqlValue::Int),
        TypeCategory::Oid => decode_as::<Oid>(row, idx, array, |oid| SqlValue::Int(oid.0.into())),
        TypeCategory::Real => decode_as::<f32>(row, idx, array, |v| SqlValue::Float(v.into())),
        TypeCategory::Double => decode_as::<f64>(row, idx, array, SqlValue::Float),
        TypeCategory::Decimal => decode_as::<RawDecimal>(row, idx, array, |d| SqlValue::Decimal(d.0)),
        TypeCategory::Money => decode_as::<PgMoney>(row, idx, array, |m| {
            SqlValue::Decimal(money_to_decimal(m.0))
        }),
        TypeCategory::Boolean => decode_as::<bool>(row, idx, array, SqlValue::Bool),
        TypeCategory::Char => decode_as::<i8>(row, idx, array, |c| {
            // "char" NUL prints as an empty string
            let text = match c {
                0 => String::new(),
                c => char::from(c as u8).to_string(),
            };
            SqlValue::Text(text)
        }),
        TypeCategory::Date => decode_as::<PgTemporal<NaiveDate>>(row, idx, array, |d| {
            d.into_value(SqlValue::Date)
        }),
        TypeCategory::Time => decode_as::<NaiveTime>(row, idx, array, SqlValue::Time),
        TypeCategory::TimeTz => {
            decode_as::<PgTimeTz<NaiveTime, FixedOffset>>(row, idx, array, |t| {
                SqlValue::TimeTz(t.time, t.offset)
            })
        }
        TypeCategory::Timestamp => decode_as::<PgTemporal<NaiveDateTime>>(row, idx, array, |ts| {
            ts.into_value(SqlValue::Timestamp)
        }),
        TypeCategory::TimestampTz => {
            decode_as::<PgTemporal<DateTime<Utc>>>(row, idx, array, |ts| {
                ts.into_value(SqlValue::TimestampTz)
            })
        }
        TypeCategory::Interval => decode_as::<PgInterval>(row, idx, array, |i| SqlValue::Interval {
            months: i.months,
            days: i.days,
            microseconds: i.microseconds,
        }),
        TypeCategory::Json => decode_as::<serde_json::Value>(row, idx, array, SqlValue::Json),
        TypeCategory::Uuid => {
            decode_as::<uuid::Uuid>(row, idx, array, |u| SqlValue::Text(u.to_string()))
        }
        TypeCategory::Binary => decode_as::<Vec<u8>>(row, idx, array, SqlValue::Bytes),
        TypeCategory::Network => decode_as::<RawNetwork>(row, idx, array, |n| SqlValue::Text(n.0)),
        TypeCategory::MacAddr => decode_as::<RawMacAddr>(row, idx, array, |m| SqlValue::Text(m.0)),
        TypeCategory::BitString => decode_as::<RawBits>(row, idx, array, |b| SqlValue::Text(b.0)),
        TypeCategory::Text => decode_as::<RawText>(row, idx, array, |t| SqlValue::Text(t.0)),
        TypeCategory::Unsupported => Err(sqlx::Error::Decode("no decoder for column type".into())),
    }
}

/// Read column `idx` as `T`, or as an array of `T` when `array` is set.
fn decode_as<T>(
    row: &PgRow,
    idx: usize,
    array: bool,
    map: impl Fn(T) -> SqlValue,
) -> Result<SqlValue, sqlx::Error>
where
    T: for<'a> Decode<'a, Postgres> + Type<Postgres> + PgHasArrayType,
{
    if array {
        let items = row.try_get::<Option<Vec<Option<T>>>, _>(idx)?;
        Ok(items.map_or(SqlValue::Null, |items| {
            SqlValue::Array(
                items
                    .into_iter()
                    .map(|item| item.map_or(SqlValue::Null, &map))
                    .collect(),
            )
        }))
    } else {
        Ok(row.try_get::<Option<T>, _>(idx)?.map_or(SqlValue::Null, map))
    }
}
