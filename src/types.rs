use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Values bound as statement parameters or decoded from result cells.
///
/// ```rust
/// use intarkdb_middleware::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowValues {
    /// Signed integer value (64-bit)
    Int(i64),
    /// Unsigned integer value, produced by the unsigned column kinds
    UInt(u64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Fixed-point decimal exactly as the engine spelled it. The text is
    /// checked to be a decimal literal but never normalised: `1e10` stays
    /// `1e10` and `12.50` keeps its trailing zero.
    Decimal(String),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Calendar date
    Date(NaiveDate),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            RowValues::UInt(value) => Some(*value),
            RowValues::Int(value) => u64::try_from(*value).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Booleans come back from the engine as integers; `0` and `1` are accepted.
    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_decimal(&self) -> Option<&str> {
        if let RowValues::Decimal(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            RowValues::Date(value) => Some(*value),
            RowValues::Text(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // "YYYY-MM-DD HH:MM:SS" with an optional fraction
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

impl fmt::Display for RowValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowValues::Int(v) => write!(f, "{v}"),
            RowValues::UInt(v) => write!(f, "{v}"),
            RowValues::Float(v) => write!(f, "{v}"),
            RowValues::Decimal(v) | RowValues::Text(v) => f.write_str(v),
            RowValues::Bool(v) => write!(f, "{v}"),
            RowValues::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            RowValues::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.6f")),
            RowValues::Null => f.write_str("NULL"),
            RowValues::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// Value kinds known to the engine, keyed by their native type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Integer,
    Bigint,
    Real,
    Number,
    Decimal,
    Date,
    Timestamp,
    Char,
    Varchar,
    String,
    Binary,
    Varbinary,
    Clob,
    Blob,
    Cursor,
    Column,
    Boolean,
    TimestampTzFake,
    TimestampLtz,
    Interval,
    IntervalYm,
    IntervalDs,
    Raw,
    Image,
    Uint32,
    Uint64,
    Smallint,
    Usmallint,
    Tinyint,
    Utinyint,
    Float,
    TimestampTz,
    Array,
    Record,
    Collection,
    Object,
    Unknown,
}

const TYPE_BASE: i32 = 20000;

/// (kind, native code, SQL name)
const TYPE_TABLE: &[(TypeKind, i32, &str)] = &[
    (TypeKind::Integer, TYPE_BASE + 1, "INTEGER"),
    (TypeKind::Bigint, TYPE_BASE + 2, "BIGINT"),
    (TypeKind::Real, TYPE_BASE + 3, "REAL"),
    (TypeKind::Number, TYPE_BASE + 4, "NUMBER"),
    (TypeKind::Decimal, TYPE_BASE + 5, "DECIMAL"),
    (TypeKind::Date, TYPE_BASE + 6, "DATE"),
    (TypeKind::Timestamp, TYPE_BASE + 7, "TIMESTAMP"),
    (TypeKind::Char, TYPE_BASE + 8, "CHAR"),
    (TypeKind::Varchar, TYPE_BASE + 9, "VARCHAR"),
    (TypeKind::String, TYPE_BASE + 10, "STRING"),
    (TypeKind::Binary, TYPE_BASE + 11, "BINARY"),
    (TypeKind::Varbinary, TYPE_BASE + 12, "VARBINARY"),
    (TypeKind::Clob, TYPE_BASE + 13, "CLOB"),
    (TypeKind::Blob, TYPE_BASE + 14, "BLOB"),
    (TypeKind::Cursor, TYPE_BASE + 15, "CURSOR"),
    (TypeKind::Column, TYPE_BASE + 16, "COLUMN"),
    (TypeKind::Boolean, TYPE_BASE + 17, "BOOLEAN"),
    (TypeKind::TimestampTzFake, TYPE_BASE + 18, "TIMESTAMP_TZ_FAKE"),
    (TypeKind::TimestampLtz, TYPE_BASE + 19, "TIMESTAMP_LTZ"),
    (TypeKind::Interval, TYPE_BASE + 20, "INTERVAL"),
    (TypeKind::IntervalYm, TYPE_BASE + 21, "INTERVAL_YM"),
    (TypeKind::IntervalDs, TYPE_BASE + 22, "INTERVAL_DS"),
    (TypeKind::Raw, TYPE_BASE + 23, "RAW"),
    (TypeKind::Image, TYPE_BASE + 24, "IMAGE"),
    (TypeKind::Uint32, TYPE_BASE + 25, "UINT32"),
    (TypeKind::Uint64, TYPE_BASE + 26, "UINT64"),
    (TypeKind::Smallint, TYPE_BASE + 27, "SMALLINT"),
    (TypeKind::Usmallint, TYPE_BASE + 28, "USMALLINT"),
    (TypeKind::Tinyint, TYPE_BASE + 29, "TINYINT"),
    (TypeKind::Utinyint, TYPE_BASE + 30, "UTINYINT"),
    (TypeKind::Float, TYPE_BASE + 31, "FLOAT"),
    (TypeKind::TimestampTz, TYPE_BASE + 32, "TIMESTAMP_TZ"),
    (TypeKind::Array, TYPE_BASE + 33, "ARRAY"),
    (TypeKind::Record, TYPE_BASE + 41, "RECORD"),
    (TypeKind::Collection, TYPE_BASE + 42, "COLLECTION"),
    (TypeKind::Object, TYPE_BASE + 43, "OBJECT"),
    (TypeKind::Unknown, -1, "UNKNOWN"),
];

impl TypeKind {
    /// Look up the kind for a native type code; unlisted codes are `Unknown`.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        TYPE_TABLE
            .iter()
            .find(|(_, c, _)| *c == code)
            .map_or(TypeKind::Unknown, |(kind, _, _)| *kind)
    }

    #[must_use]
    pub fn code(self) -> i32 {
        self.entry().1
    }

    #[must_use]
    pub fn sql_name(self) -> &'static str {
        self.entry().2
    }

    fn entry(self) -> &'static (TypeKind, i32, &'static str) {
        TYPE_TABLE
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .unwrap_or(&TYPE_TABLE[TYPE_TABLE.len() - 1])
    }

    /// Kind a host value binds as, or `None` when it binds as SQL NULL.
    #[must_use]
    pub fn infer(value: &RowValues) -> Option<TypeKind> {
        match value {
            RowValues::Bool(_) => Some(TypeKind::Boolean),
            RowValues::Int(v) => Some(Self::narrowest_integer(i128::from(*v))),
            RowValues::UInt(v) => Some(Self::narrowest_integer(i128::from(*v))),
            RowValues::Float(_) | RowValues::Decimal(_) => Some(TypeKind::Real),
            RowValues::Text(_) => Some(TypeKind::Varchar),
            RowValues::Date(_) => Some(TypeKind::Date),
            RowValues::Timestamp(_) => Some(TypeKind::Timestamp),
            RowValues::Null | RowValues::Blob(_) => None,
        }
    }

    fn narrowest_integer(v: i128) -> TypeKind {
        if (i128::from(i8::MIN)..=i128::from(i8::MAX)).contains(&v) {
            TypeKind::Tinyint
        } else if (i128::from(i16::MIN)..=i128::from(i16::MAX)).contains(&v) {
            TypeKind::Smallint
        } else if (i128::from(i32::MIN)..=i128::from(i32::MAX)).contains(&v) {
            TypeKind::Integer
        } else {
            TypeKind::Bigint
        }
    }

    #[must_use]
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            TypeKind::Utinyint | TypeKind::Usmallint | TypeKind::Uint32 | TypeKind::Uint64
        )
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// One entry of a cursor's description: column name and declared kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescription {
    pub name: String,
    pub kind: TypeKind,
    /// Raw code reported by the engine; kept for kinds this crate does not list.
    pub type_code: i32,
}

/// Which engine library serves a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum Backend {
    /// In-process engine sharing one database handle per identifier
    Local,
    /// Remote engine reached through the network client
    Networked,
}

/// Operating mode of a connection, fixed at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum DataMode {
    /// Tabular access through SQL statements
    Sql,
    /// Key-value access through set/get/delete
    Kv,
}
