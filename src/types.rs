use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde_json::Value as JsonValue;

use crate::error::SqlMapperError;

/// Values bound as statement parameters or read back from result rows.
///
/// The same enum is used by every backend so the binder and materializer never branch on
/// driver types:
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let params = vec![
///     SqlValue::Int(1),
///     SqlValue::Text("alice".into()),
///     SqlValue::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    Json(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl SqlValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        if let SqlValue::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Booleans come back from SQLite as `0`/`1` integers.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(value) => Some(*value),
            SqlValue::Int(1) => Some(true),
            SqlValue::Int(0) => Some(false),
            _ => None,
        }
    }

    /// Integers widen to floats; SQLite hands back whole-number REALs as integers.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SqlValue::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            SqlValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let SqlValue::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // Try "YYYY-MM-DD HH:MM:SS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            // Try "YYYY-MM-DD HH:MM:SS.SSS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            SqlValue::Int(_) => "integer",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::Bool(_) => "bool",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::Null => "null",
            SqlValue::Json(_) => "json",
            SqlValue::Blob(_) => "blob",
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

/// The database backends this crate can drive.
///
/// Parsed case-insensitively from the `driverClassIdentifier` configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum DatabaseType {
    /// `SQLite` through `rusqlite`
    #[cfg(feature = "sqlite")]
    Sqlite,
    /// `PostgreSQL` through `tokio-postgres`
    #[cfg(feature = "postgres")]
    Postgres,
}

impl DatabaseType {
    /// Parse a driver identifier such as `sqlite` or `Postgres`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for unknown or disabled backends.
    pub fn parse(identifier: &str) -> Result<Self, SqlMapperError> {
        <Self as ValueEnum>::from_str(identifier.trim(), true).map_err(|_| {
            SqlMapperError::ConfigError(format!(
                "unsupported driver identifier '{identifier}' (not a known or enabled backend)"
            ))
        })
    }
}

/// Conversion from a column value into a record field.
pub trait FromSqlValue: Sized {
    /// # Errors
    /// Returns `SqlMapperError::MappingError` when the value has an incompatible type.
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlMapperError>;
}

/// Conversion from a record field into a bind parameter.
pub trait IntoSqlValue {
    fn to_sql_value(&self) -> SqlValue;
}

fn mismatch(expected: &str, value: &SqlValue) -> SqlMapperError {
    SqlMapperError::MappingError(format!(
        "expected {expected}, found {} value",
        value.kind_name()
    ))
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlMapperError> {
        Ok(value)
    }
}

impl FromSqlValue for i64 {
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlMapperError> {
        value.as_int().ok_or_else(|| mismatch("integer", &value))
    }
}

impl FromSqlValue for i32 {
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlMapperError> {
        let wide = value.as_int().ok_or_else(|| mismatch("integer", &value))?;
        i32::try_from(wide).map_err(|e| {
            SqlMapperError::MappingError(format!("integer {wide} out of range for i32: {e}"))
        })
    }
}

impl FromSqlValue for f64 {
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlMapperError> {
        value.as_float().ok_or_else(|| mismatch("float", &value))
    }
}

impl FromSqlValue for f32 {
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlMapperError> {
        #[allow(clippy::cast_possible_truncation)]
        value
            .as_float()
            .map(|f| f as f32)
            .ok_or_else(|| mismatch("float", &value))
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlMapperError> {
        value.as_bool().ok_or_else(|| mismatch("bool", &value))
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlMapperError> {
        match value {
            SqlValue::Text(s) => Ok(s),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlMapperError> {
        match value {
            SqlValue::Blob(bytes) => Ok(bytes),
            other => Err(mismatch("blob", &other)),
        }
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlMapperError> {
        value
            .as_timestamp()
            .ok_or_else(|| mismatch("timestamp", &value))
    }
}

impl FromSqlValue for JsonValue {
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlMapperError> {
        match value {
            SqlValue::Json(json) => Ok(json),
            // SQLite stores JSON as text
            SqlValue::Text(s) => serde_json::from_str(&s)
                .map_err(|e| SqlMapperError::MappingError(format!("invalid JSON text: {e}"))),
            other => Err(mismatch("json", &other)),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self, SqlMapperError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_sql_value(value).map(Some)
        }
    }
}

impl IntoSqlValue for SqlValue {
    fn to_sql_value(&self) -> SqlValue {
        self.clone()
    }
}

impl IntoSqlValue for i64 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Int(*self)
    }
}

impl IntoSqlValue for i32 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Int(i64::from(*self))
    }
}

impl IntoSqlValue for f64 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Float(*self)
    }
}

impl IntoSqlValue for f32 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Float(f64::from(*self))
    }
}

impl IntoSqlValue for bool {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }
}

impl IntoSqlValue for String {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl IntoSqlValue for Vec<u8> {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Blob(self.clone())
    }
}

impl IntoSqlValue for NaiveDateTime {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Timestamp(*self)
    }
}

impl IntoSqlValue for JsonValue {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Json(self.clone())
    }
}

impl<T: IntoSqlValue> IntoSqlValue for Option<T> {
    fn to_sql_value(&self) -> SqlValue {
        self.as_ref().map_or(SqlValue::Null, IntoSqlValue::to_sql_value)
    }
}
