// PostgreSQL backend.
//
// - config: opening physical connections from a connection string
// - params: SqlValue -> postgres wire encoding
// - query: result extraction into a ResultSet
// - executor: statement execution against a pooled client

pub mod config;
pub mod executor;
pub mod params;
pub mod query;

pub use config::open_connection;
pub use executor::{execute_batch, execute_dml, execute_select};
pub use params::Params;
pub use query::build_result_set;
