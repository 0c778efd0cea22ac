//! Driver-neutral result rows.
//!
//! Backends copy every row of a cursor into a [`ResultSet`] while the statement is live; the
//! materializer then works on [`Row`]s without touching driver types.

mod result_set;
mod row;

pub use result_set::ResultSet;
pub use row::Row;
