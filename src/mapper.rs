//! Data-access contracts and the dispatcher that runs them.
//!
//! A [`Contract`] is a table from method name to [`OperationDescriptor`]; a [`Mapper`]
//! interprets it against a [`Session`]. The [`sql_mapper!`](crate::sql_mapper!) macro writes
//! both for a typed DAO struct, so call sites read like plain async methods.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::binder::BindValue;
use crate::error::SqlMapperError;
use crate::materialize::{FromRow, ResultShape, materialize_all, materialize_optional};
use crate::session::{Session, StatementOutput};
use crate::template::compile;
use crate::types::SqlValue;

pub use crate::session::OperationKind;

/// How many results an operation hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Writes: the outcome is discarded or reported as an affected-row count.
    None,
    /// The first row; no rows is a `MappingError`.
    One,
    /// Every row, possibly none.
    Many,
    /// The first row if there is one.
    Optional,
}

/// Cardinality plus the per-row shape (absent for writes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnShape {
    pub cardinality: Cardinality,
    pub shape: Option<ResultShape>,
}

impl ReturnShape {
    pub const NONE: ReturnShape = ReturnShape {
        cardinality: Cardinality::None,
        shape: None,
    };

    #[must_use]
    pub fn one(shape: ResultShape) -> Self {
        Self {
            cardinality: Cardinality::One,
            shape: Some(shape),
        }
    }

    #[must_use]
    pub fn many(shape: ResultShape) -> Self {
        Self {
            cardinality: Cardinality::Many,
            shape: Some(shape),
        }
    }

    #[must_use]
    pub fn optional(shape: ResultShape) -> Self {
        Self {
            cardinality: Cardinality::Optional,
            shape: Some(shape),
        }
    }
}

/// Types a mapper method may return.
///
/// `()` and `usize` are write results; `Vec<T>` is many rows; `Option<T>` is zero or one row;
/// any other [`FromRow`] type is exactly one row.
pub trait MapperReturn: Sized + Send + 'static {
    fn return_shape() -> ReturnShape;

    /// # Errors
    /// Returns `SqlMapperError::MappingError` when `output` does not fit this type.
    fn from_output(output: StatementOutput) -> Result<Self, SqlMapperError>;
}

fn affected_count(output: StatementOutput) -> Result<usize, SqlMapperError> {
    output.affected().ok_or_else(|| {
        SqlMapperError::MappingError(
            "statement returned rows but the operation declares no result".into(),
        )
    })
}

impl MapperReturn for () {
    fn return_shape() -> ReturnShape {
        ReturnShape::NONE
    }

    fn from_output(output: StatementOutput) -> Result<Self, SqlMapperError> {
        affected_count(output).map(|_| ())
    }
}

impl MapperReturn for usize {
    fn return_shape() -> ReturnShape {
        ReturnShape::NONE
    }

    fn from_output(output: StatementOutput) -> Result<Self, SqlMapperError> {
        affected_count(output)
    }
}

impl<T: FromRow> MapperReturn for Vec<T> {
    fn return_shape() -> ReturnShape {
        ReturnShape::many(T::shape())
    }

    fn from_output(output: StatementOutput) -> Result<Self, SqlMapperError> {
        materialize_all(&output.into_rows()?)
    }
}

impl<T: FromRow> MapperReturn for Option<T> {
    fn return_shape() -> ReturnShape {
        ReturnShape::optional(T::shape())
    }

    fn from_output(output: StatementOutput) -> Result<Self, SqlMapperError> {
        materialize_optional(&output.into_rows()?)
    }
}

/// Implement [`MapperReturn`] as a single-row result for a [`FromRow`] type.
#[doc(hidden)]
#[macro_export]
macro_rules! single_row_return {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::mapper::MapperReturn for $ty {
                fn return_shape() -> $crate::mapper::ReturnShape {
                    $crate::mapper::ReturnShape::one(
                        <$ty as $crate::materialize::FromRow>::shape(),
                    )
                }

                fn from_output(
                    output: $crate::session::StatementOutput,
                ) -> ::std::result::Result<Self, $crate::SqlMapperError> {
                    $crate::materialize::materialize_one(&output.into_rows()?)
                }
            }
        )*
    };
}

single_row_return!(
    i64,
    i32,
    f64,
    String,
    bool,
    SqlValue,
    HashMap<String, SqlValue>,
    BTreeMap<String, SqlValue>,
);

/// One contract method: what it does, its SQL, and what it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub kind: OperationKind,
    pub template: String,
    pub return_shape: ReturnShape,
}

/// A named set of data-access methods.
///
/// ```rust
/// use sql_mapper::mapper::{Cardinality, Contract};
/// use sql_mapper::SqlValue;
/// use std::collections::HashMap;
///
/// let contract = Contract::new("AtmDao")
///     .insert("open", "insert into atm(aname, abalance) values(#{aname}, #{abalance})")
///     .select::<Vec<HashMap<String, SqlValue>>>("all", "select * from atm");
/// assert_eq!(contract.len(), 2);
/// assert_eq!(
///     contract.descriptor("all").unwrap().return_shape.cardinality,
///     Cardinality::Many
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Contract {
    name: String,
    operations: Vec<(String, OperationDescriptor)>,
}

impl Contract {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: Vec::new(),
        }
    }

    /// Register `method` with the return shape of `R`.
    #[must_use]
    pub fn operation<R: MapperReturn>(
        mut self,
        method: impl Into<String>,
        kind: OperationKind,
        template: impl Into<String>,
    ) -> Self {
        self.operations.push((
            method.into(),
            OperationDescriptor {
                kind,
                template: template.into(),
                return_shape: R::return_shape(),
            },
        ));
        self
    }

    #[must_use]
    pub fn insert(self, method: impl Into<String>, template: impl Into<String>) -> Self {
        self.operation::<()>(method, OperationKind::Insert, template)
    }

    #[must_use]
    pub fn update(self, method: impl Into<String>, template: impl Into<String>) -> Self {
        self.operation::<()>(method, OperationKind::Update, template)
    }

    #[must_use]
    pub fn delete(self, method: impl Into<String>, template: impl Into<String>) -> Self {
        self.operation::<()>(method, OperationKind::Delete, template)
    }

    #[must_use]
    pub fn select<R: MapperReturn>(
        self,
        method: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        self.operation::<R>(method, OperationKind::Select, template)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Methods in registration order.
    pub fn operations(&self) -> impl Iterator<Item = (&str, &OperationDescriptor)> {
        self.operations.iter().map(|(m, d)| (m.as_str(), d))
    }

    #[must_use]
    pub fn descriptor(&self, method: &str) -> Option<&OperationDescriptor> {
        self.operations
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, d)| d)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// A validated contract bound to a session.
#[derive(Debug, Clone)]
pub struct Mapper {
    session: Session,
    contract_name: Arc<str>,
    operations: Arc<HashMap<String, OperationDescriptor>>,
}

impl Mapper {
    /// Validate `contract` and bind it to `session`.
    ///
    /// # Errors
    /// `CompileError` for a malformed template; `MappingError` for a duplicate method, a write
    /// that declares a result, or a select that declares none.
    pub fn new(session: Session, contract: Contract) -> Result<Self, SqlMapperError> {
        let Contract { name, operations } = contract;
        let mut table = HashMap::with_capacity(operations.len());

        for (method, descriptor) in operations {
            compile(&descriptor.template).map_err(|e| {
                SqlMapperError::CompileError(format!("{name}::{method}: {e}"))
            })?;

            let declares_result = descriptor.return_shape.cardinality != Cardinality::None;
            if descriptor.kind.is_write() && declares_result {
                return Err(SqlMapperError::MappingError(format!(
                    "{name}::{method} is a write ({}) and cannot return {:?}",
                    descriptor.kind, descriptor.return_shape
                )));
            }
            if !descriptor.kind.is_write() && !declares_result {
                return Err(SqlMapperError::MappingError(format!(
                    "{name}::{method} is a select and must declare a result"
                )));
            }

            if table.insert(method.clone(), descriptor).is_some() {
                return Err(SqlMapperError::MappingError(format!(
                    "{name} declares method `{method}` more than once"
                )));
            }
        }

        tracing::debug!(contract = %name, methods = table.len(), "mapper created");
        Ok(Self {
            session,
            contract_name: Arc::from(name),
            operations: Arc::new(table),
        })
    }

    /// A mapper over the process-wide pool.
    ///
    /// # Errors
    /// See [`Session::global`] and [`Mapper::new`].
    pub async fn global(contract: Contract) -> Result<Self, SqlMapperError> {
        Self::new(Session::global().await?, contract)
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    #[must_use]
    pub fn descriptor(&self, method: &str) -> Option<&OperationDescriptor> {
        self.operations.get(method)
    }

    /// Run `method` with `arg` as its bind value.
    ///
    /// # Errors
    /// `ExecutionError` for a method the contract does not declare, `MappingError` when `R` is
    /// not the registered return type, otherwise whatever the statement fails with.
    pub async fn invoke<R: MapperReturn>(
        &self,
        method: &str,
        arg: Option<BindValue>,
    ) -> Result<R, SqlMapperError> {
        let descriptor = self.operations.get(method).ok_or_else(|| {
            SqlMapperError::ExecutionError(format!(
                "{} has no method `{method}`",
                self.contract_name
            ))
        })?;

        let requested = R::return_shape();
        if requested != descriptor.return_shape {
            return Err(SqlMapperError::MappingError(format!(
                "{}::{method} returns {:?}, caller asked for {requested:?}",
                self.contract_name, descriptor.return_shape
            )));
        }

        tracing::debug!(
            contract = %self.contract_name,
            method,
            kind = %descriptor.kind,
            "invoking mapper method"
        );
        self.session
            .execute_as::<R>(descriptor.kind, &descriptor.template, arg.as_ref())
            .await
    }
}

/// Declare a DAO struct from annotated method signatures.
///
/// Each method carries one of `#[insert("…")]`, `#[update("…")]`, `#[delete("…")]` or
/// `#[select("…")]`, takes at most one argument (the bind value) and may declare a return type
/// (none means `()`). The macro generates `contract()`, `new(session)`, `global()`,
/// `mapper()` and one async method per signature.
///
/// ```rust
/// use sql_mapper::prelude::*;
///
/// sql_mapper::record! {
///     #[derive(Debug, Clone, Default, PartialEq)]
///     pub struct Atm {
///         pub aname: String,
///         pub abalance: f64,
///     }
/// }
///
/// sql_mapper::sql_mapper! {
///     #[derive(Debug, Clone)]
///     pub struct AtmDao {
///         #[insert("insert into atm(aname, abalance) values(#{aname}, #{abalance})")]
///         fn open(atm: Atm);
///         #[select("select aname, abalance from atm where aname = #{aname}")]
///         fn find(aname: &str) -> Option<Atm>;
///         #[select("select aname, abalance from atm order by aname")]
///         fn all() -> Vec<Atm>;
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), SqlMapperError> {
/// let session = Session::connect(&PoolConfig::sqlite(":memory:", 1, 1)).await?;
/// session.execute_batch("create table atm (aname text, abalance real)").await?;
///
/// let dao = AtmDao::new(session)?;
/// dao.open(Atm { aname: "mal".into(), abalance: 20.0 }).await?;
/// assert_eq!(dao.find("mal").await?.map(|a| a.abalance), Some(20.0));
/// assert_eq!(dao.all().await?.len(), 1);
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! sql_mapper {
    (@ret) => { () };
    (@ret $ret:ty) => { $ret };

    (@kind insert) => { $crate::mapper::OperationKind::Insert };
    (@kind update) => { $crate::mapper::OperationKind::Update };
    (@kind delete) => { $crate::mapper::OperationKind::Delete };
    (@kind select) => { $crate::mapper::OperationKind::Select };
    (@kind $other:ident) => {
        compile_error!(concat!(
            "unknown operation `",
            stringify!($other),
            "`, expected insert, update, delete or select"
        ))
    };

    (@arg) => { ::std::option::Option::None };
    (@arg $arg:ident) => {
        ::std::option::Option::Some($crate::binder::BindValue::from($arg))
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                #[$kind:ident($sql:literal)]
                fn $method:ident($($arg:ident : $arg_ty:ty)?) $(-> $ret:ty)?;
            )*
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            mapper: $crate::mapper::Mapper,
        }

        impl $name {
            /// The contract this DAO runs.
            pub fn contract() -> $crate::mapper::Contract {
                $crate::mapper::Contract::new(stringify!($name))
                    $(
                        .operation::<$crate::sql_mapper!(@ret $($ret)?)>(
                            stringify!($method),
                            $crate::sql_mapper!(@kind $kind),
                            $sql,
                        )
                    )*
            }

            /// Bind the DAO to `session`.
            ///
            /// # Errors
            /// Fails when the contract does not validate.
            pub fn new(
                session: $crate::session::Session,
            ) -> ::std::result::Result<Self, $crate::SqlMapperError> {
                ::std::result::Result::Ok(Self {
                    mapper: $crate::mapper::Mapper::new(session, Self::contract())?,
                })
            }

            /// Bind the DAO to the process-wide pool.
            ///
            /// # Errors
            /// Fails when the global pool cannot be built or the contract does not validate.
            pub async fn global() -> ::std::result::Result<Self, $crate::SqlMapperError> {
                Self::new($crate::session::Session::global().await?)
            }

            pub fn mapper(&self) -> &$crate::mapper::Mapper {
                &self.mapper
            }

            $(
                pub async fn $method(
                    &self $(, $arg: $arg_ty)?
                ) -> ::std::result::Result<
                    $crate::sql_mapper!(@ret $($ret)?),
                    $crate::SqlMapperError,
                > {
                    self.mapper
                        .invoke::<$crate::sql_mapper!(@ret $($ret)?)>(
                            stringify!($method),
                            $crate::sql_mapper!(@arg $($arg)?),
                        )
                        .await
                }
            )*
        }
    };
}
