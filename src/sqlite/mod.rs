// SQLite backend.
//
// - config: opening physical connections and running work on the blocking pool
// - params: SqlValue -> rusqlite value conversion and positional binding
// - query: result extraction into a ResultSet
// - executor: statement execution against a pooled connection

pub mod config;
pub mod executor;
pub mod params;
pub mod query;

pub use config::{SharedSqliteConnection, open_connection};
pub use executor::{execute_batch, execute_dml, execute_select};
pub use query::build_result_set;
