//! Convenient imports for common functionality.

pub use crate::binder::BindValue;
pub use crate::config::{ConfigProvider, PoolConfig, PropertiesConfig};
pub use crate::error::SqlMapperError;
pub use crate::mapper::{Cardinality, Contract, Mapper, MapperReturn, OperationKind, ReturnShape};
pub use crate::materialize::{FromRow, ResultShape, ScalarKind};
pub use crate::pool::{ConnectionPool, PooledGuard};
pub use crate::record::Record;
pub use crate::results::{ResultSet, Row};
pub use crate::session::{Session, StatementOutput};
pub use crate::template::{CompiledStatement, PlaceholderStyle, compile};
pub use crate::types::{DatabaseType, FromSqlValue, IntoSqlValue, SqlValue};
