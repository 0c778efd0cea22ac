//! Annotated SQL mappers over a fixed-size connection pool.
//!
//! Declare data-access methods with their SQL, using `#{name}` placeholders, and call them like
//! ordinary async methods. Each call compiles the template to positional markers, claims a
//! pooled connection, binds the argument (a scalar, a map, or a [`record!`] struct), executes,
//! and materializes the rows.
//!
//! - [`template`]: `#{name}` → `?` / `$N`
//! - [`binder`]: bind values → positional parameters
//! - [`materialize`]: rows → scalars, maps, records
//! - [`session`]: the execute sequence
//! - [`mapper`]: contracts, [`sql_mapper!`] DAOs
//! - [`pool`]: fixed-size pool with bounded waiting

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("enable at least one backend feature: `sqlite` or `postgres`");

pub mod binder;
pub mod config;
pub mod error;
pub mod mapper;
pub mod materialize;
pub mod pool;
pub mod prelude;
pub mod record;
pub mod results;
pub mod session;
pub mod template;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use error::SqlMapperError;
pub use types::SqlValue;
