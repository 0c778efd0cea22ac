//! Parameter binding.
//!
//! A [`BindValue`] is resolved against the ordered placeholder names of a compiled statement
//! into one [`SqlValue`] per positional slot; backends then attach those values to their own
//! statement handles.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::SqlMapperError;
use crate::record::Record;
use crate::types::SqlValue;

/// The parameter payload for one statement execution.
#[derive(Clone)]
pub enum BindValue {
    /// A single number or string; fills the only placeholder.
    Scalar(SqlValue),
    /// Placeholder name → value.
    Map(HashMap<String, SqlValue>),
    /// A struct read field-by-field using the placeholder names.
    Record(Arc<dyn Record>),
}

impl BindValue {
    pub fn record<R: Record>(record: R) -> Self {
        BindValue::Record(Arc::new(record))
    }

    /// Build a map payload from `(name, value)` pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<SqlValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        BindValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    fn shape_name(&self) -> &'static str {
        match self {
            BindValue::Scalar(_) => "scalar",
            BindValue::Map(_) => "map",
            BindValue::Record(_) => "record",
        }
    }
}

impl fmt::Debug for BindValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
            Self::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Self::Record(record) => f
                .debug_tuple("Record")
                .field(&record.record_type())
                .finish(),
        }
    }
}

macro_rules! scalar_bind_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for BindValue {
                fn from(value: $ty) -> Self {
                    BindValue::Scalar(SqlValue::from(value))
                }
            }
        )*
    };
}

scalar_bind_value!(i64, i32, f64, bool, String, &str);

impl From<SqlValue> for BindValue {
    fn from(value: SqlValue) -> Self {
        BindValue::Scalar(value)
    }
}

impl From<&String> for BindValue {
    fn from(value: &String) -> Self {
        BindValue::Scalar(SqlValue::Text(value.clone()))
    }
}

impl From<HashMap<String, SqlValue>> for BindValue {
    fn from(map: HashMap<String, SqlValue>) -> Self {
        BindValue::Map(map)
    }
}

impl From<BTreeMap<String, SqlValue>> for BindValue {
    fn from(map: BTreeMap<String, SqlValue>) -> Self {
        BindValue::Map(map.into_iter().collect())
    }
}

/// Resolve `value` into positional parameters, `result[i]` feeding slot `i + 1`.
///
/// Without a value every slot is `NULL`, which is what an unbound slot means to the drivers.
///
/// # Errors
/// Returns `SqlMapperError::BindingError` when a scalar meets anything but exactly one
/// placeholder, or a record lacks a field named by a placeholder. A map missing a key binds
/// `NULL` for that slot instead.
pub fn resolve(
    value: Option<&BindValue>,
    param_names: &[String],
) -> Result<Vec<SqlValue>, SqlMapperError> {
    let Some(value) = value else {
        return Ok(vec![SqlValue::Null; param_names.len()]);
    };

    match value {
        BindValue::Scalar(scalar) => {
            if param_names.len() == 1 {
                Ok(vec![scalar.clone()])
            } else {
                Err(SqlMapperError::BindingError(format!(
                    "a scalar parameter needs exactly one placeholder, template has {} ({})",
                    param_names.len(),
                    param_names.join(", ")
                )))
            }
        }
        BindValue::Map(map) => Ok(param_names
            .iter()
            .map(|name| map.get(name).cloned().unwrap_or(SqlValue::Null))
            .collect()),
        BindValue::Record(record) => param_names
            .iter()
            .map(|name| {
                record.field(name).ok_or_else(|| {
                    SqlMapperError::BindingError(format!(
                        "record `{}` has no field `{name}` for placeholder #{{{name}}} \
                         (fields: {})",
                        record.record_type(),
                        record.field_names().join(", ")
                    ))
                })
            })
            .collect(),
    }
}

/// Like [`resolve`], with the payload shape added to the error for logging.
pub(crate) fn resolve_logged(
    value: Option<&BindValue>,
    param_names: &[String],
) -> Result<Vec<SqlValue>, SqlMapperError> {
    resolve(value, param_names).inspect_err(|err| {
        tracing::debug!(
            shape = value.map_or("none", BindValue::shape_name),
            error = %err,
            "parameter binding failed"
        );
    })
}
