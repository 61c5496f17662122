//! Conversions between [`RowValues`] and the engine's typed entry points.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::error::IntarkDbError;
use crate::native::{BindValue, NativeApi, ResultHandle};
use crate::types::{RowValues, TypeKind};

const NULL_SENTINELS: [&str; 4] = ["infinity", "-infinity", "-nan", ""];

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Owned form of a bind argument; borrowed as a [`BindValue`] at call time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BindArg {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Boolean(bool),
    Double(f64),
    Varchar(String),
    Null,
}

impl BindArg {
    pub(crate) fn as_bind_value(&self) -> BindValue<'_> {
        match self {
            BindArg::Int8(v) => BindValue::Int8(*v),
            BindArg::Int16(v) => BindValue::Int16(*v),
            BindArg::Int32(v) => BindValue::Int32(*v),
            BindArg::Int64(v) => BindValue::Int64(*v),
            BindArg::Boolean(v) => BindValue::Boolean(*v),
            BindArg::Double(v) => BindValue::Double(*v),
            BindArg::Varchar(v) => BindValue::Varchar(v),
            BindArg::Null => BindValue::Null,
        }
    }
}

/// Render a timestamp the way the engine accepts it: seconds precision, plus
/// microseconds only when they are non-zero.
pub(crate) fn timestamp_bind_text(ts: &NaiveDateTime) -> String {
    let micros = ts.nanosecond() / 1_000;
    if micros == 0 {
        ts.format(TIMESTAMP_FORMAT).to_string()
    } else {
        format!("{}.{micros:06}", ts.format(TIMESTAMP_FORMAT))
    }
}

/// Convert a host value into the argument for its inferred kind.
///
/// # Errors
/// Returns a data error for unsigned values beyond the signed 64-bit range and
/// for decimals that do not parse as a number.
pub(crate) fn to_bind_arg(value: &RowValues) -> Result<BindArg, IntarkDbError> {
    let Some(kind) = TypeKind::infer(value) else {
        if matches!(value, RowValues::Blob(_)) {
            tracing::warn!("binary parameters are not supported; binding NULL");
        }
        return Ok(BindArg::Null);
    };

    let arg = match (kind, value) {
        (TypeKind::Boolean, RowValues::Bool(b)) => BindArg::Boolean(*b),
        (TypeKind::Tinyint | TypeKind::Smallint | TypeKind::Integer | TypeKind::Bigint, _) => {
            let wide = match value {
                RowValues::Int(v) => *v,
                RowValues::UInt(v) => i64::try_from(*v).map_err(|_| {
                    IntarkDbError::data(format!("unsigned value {v} exceeds the BIGINT range"))
                })?,
                other => {
                    return Err(IntarkDbError::data(format!(
                        "cannot bind {other} as {kind}"
                    )));
                }
            };
            narrow_integer(kind, wide)
        }
        (TypeKind::Real, RowValues::Float(f)) => BindArg::Double(*f),
        (TypeKind::Real, RowValues::Decimal(text)) => {
            let parsed = text
                .trim()
                .parse::<f64>()
                .map_err(|_| IntarkDbError::data(format!("invalid decimal literal: {text}")))?;
            BindArg::Double(parsed)
        }
        (TypeKind::Varchar, RowValues::Text(s)) => BindArg::Varchar(s.clone()),
        (TypeKind::Date, RowValues::Date(d)) => BindArg::Varchar(d.format(DATE_FORMAT).to_string()),
        (TypeKind::Timestamp, RowValues::Timestamp(ts)) => {
            BindArg::Varchar(timestamp_bind_text(ts))
        }
        (kind, other) => {
            return Err(IntarkDbError::data(format!("cannot bind {other} as {kind}")));
        }
    };
    Ok(arg)
}

// Range checks already happened in `TypeKind::infer`; the fallbacks only keep
// the conversions total.
fn narrow_integer(kind: TypeKind, v: i64) -> BindArg {
    match kind {
        TypeKind::Tinyint => i8::try_from(v).map_or(BindArg::Int64(v), BindArg::Int8),
        TypeKind::Smallint => i16::try_from(v).map_or(BindArg::Int64(v), BindArg::Int16),
        TypeKind::Integer => i32::try_from(v).map_or(BindArg::Int64(v), BindArg::Int32),
        _ => BindArg::Int64(v),
    }
}

/// Whether `text` is a well-formed decimal literal.
fn is_decimal_literal(text: &str) -> bool {
    let body = text.strip_prefix(['-', '+']).unwrap_or(text);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
        None => (body, None),
    };
    let mut digits = 0;
    let mut dots = 0;
    for c in mantissa.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    if digits == 0 || dots > 1 {
        return false;
    }
    match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(['-', '+']).unwrap_or(exp);
            !exp.is_empty() && exp.bytes().all(|b| b.is_ascii_digit())
        }
    }
}

/// Decode one cell of `result` according to its column's type code.
///
/// # Errors
/// Returns a data error when the engine's text does not parse as the declared
/// kind.
pub(crate) fn decode_cell(
    api: &dyn NativeApi,
    result: ResultHandle,
    row: i64,
    col: i64,
    type_code: i32,
) -> Result<RowValues, IntarkDbError> {
    if type_code == 0 {
        return Ok(RowValues::Null);
    }
    let Some(text) = api.value_text(result, row, col) else {
        return Ok(RowValues::Null);
    };
    if NULL_SENTINELS.contains(&text.as_str()) {
        return Ok(RowValues::Null);
    }

    let kind = TypeKind::from_code(type_code);
    let value = match kind {
        TypeKind::Utinyint | TypeKind::Usmallint | TypeKind::Uint32 => {
            RowValues::UInt(u64::from(api.value_u32(result, row, col)))
        }
        TypeKind::Uint64 => RowValues::UInt(api.value_u64(result, row, col)),
        TypeKind::Real | TypeKind::Float => RowValues::Float(api.value_f64(result, row, col)),
        TypeKind::Tinyint
        | TypeKind::Smallint
        | TypeKind::Integer
        | TypeKind::Bigint
        | TypeKind::Boolean => RowValues::Int(parse_int(&text, kind)?),
        TypeKind::Decimal => {
            let trimmed = text.trim();
            if !is_decimal_literal(trimmed) {
                return Err(IntarkDbError::data(format!(
                    "invalid DECIMAL value: {text}"
                )));
            }
            RowValues::Decimal(trimmed.to_string())
        }
        TypeKind::Date => RowValues::Date(
            NaiveDate::parse_from_str(&text, DATE_FORMAT)
                .map_err(|e| IntarkDbError::data(format!("invalid DATE value {text}: {e}")))?,
        ),
        TypeKind::Timestamp => RowValues::Timestamp(
            NaiveDateTime::parse_from_str(&text, TIMESTAMP_PARSE_FORMAT).map_err(|e| {
                IntarkDbError::data(format!("invalid TIMESTAMP value {text}: {e}"))
            })?,
        ),
        _ => RowValues::Text(text),
    };
    Ok(value)
}

fn parse_int(text: &str, kind: TypeKind) -> Result<i64, IntarkDbError> {
    text.trim()
        .parse::<i64>()
        .map_err(|e| IntarkDbError::data(format!("invalid {kind} value {text}: {e}")))
}
