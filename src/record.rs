//! By-name field access for plain structs.
//!
//! Templates name their parameters after record fields and queries project columns named after
//! them, so both the binder and the materializer reach fields through the [`Record`] trait.
//! The [`record!`](crate::record!) macro declares a struct and implements everything the engine
//! needs for it.

use crate::error::SqlMapperError;
use crate::types::SqlValue;

/// A struct whose fields can be read and written by name.
pub trait Record: Send + Sync + 'static {
    /// Name of the Rust type, for error messages.
    fn record_type(&self) -> &'static str;

    /// Declared field names in declaration order.
    fn field_names(&self) -> &'static [&'static str];

    /// Current value of the field called `name`, or `None` when no such field exists.
    fn field(&self, name: &str) -> Option<SqlValue>;

    /// Overwrite the field called `name`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::MappingError` when there is no such field or the value does not
    /// convert to the field's type.
    fn set_field(&mut self, name: &str, value: SqlValue) -> Result<(), SqlMapperError>;
}

#[doc(hidden)]
#[must_use]
pub fn unknown_field(record: &str, field: &str) -> SqlMapperError {
    SqlMapperError::MappingError(format!("record `{record}` has no field `{field}`"))
}

#[doc(hidden)]
#[must_use]
pub fn field_error(record: &str, field: &str, err: SqlMapperError) -> SqlMapperError {
    match err {
        SqlMapperError::MappingError(msg) => {
            SqlMapperError::MappingError(format!("field `{record}.{field}`: {msg}"))
        }
        other => other,
    }
}

/// Declare a record struct.
///
/// The struct must also be `Default`, since rows are materialized by default-constructing a
/// value and then writing each column into the same-named field. Field types need
/// [`FromSqlValue`](crate::types::FromSqlValue) and [`IntoSqlValue`](crate::types::IntoSqlValue).
///
/// ```rust
/// sql_mapper::record! {
///     #[derive(Debug, Clone, Default, PartialEq)]
///     pub struct Atm {
///         pub aname: String,
///         pub apassword: String,
///         pub abalance: f64,
///     }
/// }
///
/// use sql_mapper::record::Record;
/// let atm = Atm { aname: "mal".into(), apassword: "pw".into(), abalance: 10.0 };
/// assert_eq!(atm.field("aname"), Some(sql_mapper::SqlValue::Text("mal".into())));
/// assert_eq!(atm.field("missing"), None);
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::record::Record for $name {
            fn record_type(&self) -> &'static str {
                stringify!($name)
            }

            fn field_names(&self) -> &'static [&'static str] {
                &[$(stringify!($field)),*]
            }

            fn field(&self, name: &str) -> ::std::option::Option<$crate::types::SqlValue> {
                match name {
                    $(
                        stringify!($field) => ::std::option::Option::Some(
                            $crate::types::IntoSqlValue::to_sql_value(&self.$field),
                        ),
                    )*
                    _ => ::std::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn set_field(
                &mut self,
                name: &str,
                value: $crate::types::SqlValue,
            ) -> ::std::result::Result<(), $crate::SqlMapperError> {
                match name {
                    $(
                        stringify!($field) => {
                            self.$field =
                                <$ty as $crate::types::FromSqlValue>::from_sql_value(value)
                                    .map_err(|e| {
                                        $crate::record::field_error(stringify!($name), name, e)
                                    })?;
                            ::std::result::Result::Ok(())
                        }
                    )*
                    _ => ::std::result::Result::Err($crate::record::unknown_field(
                        stringify!($name),
                        name,
                    )),
                }
            }
        }

        impl $crate::materialize::FromRow for $name {
            fn shape() -> $crate::materialize::ResultShape {
                $crate::materialize::ResultShape::Record(stringify!($name))
            }

            fn from_row(
                row: &$crate::results::Row,
            ) -> ::std::result::Result<Self, $crate::SqlMapperError> {
                $crate::materialize::record_from_row::<$name>(row)
            }
        }

        $crate::single_row_return!($name);

        impl ::std::convert::From<$name> for $crate::binder::BindValue {
            fn from(record: $name) -> Self {
                $crate::binder::BindValue::record(record)
            }
        }
    };
}
