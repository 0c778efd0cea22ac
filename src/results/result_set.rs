use std::collections::HashMap;
use std::sync::Arc;

use super::row::{Row, index_columns};
use crate::types::SqlValue;

/// The rows returned by a query, in cursor order.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    rows: Vec<Row>,
    /// Column names shared by all rows (to avoid duplicating in each row)
    column_names: Arc<Vec<String>>,
    column_index_cache: Arc<HashMap<String, usize>>,
}

impl ResultSet {
    /// Create an empty result set for the given columns.
    #[must_use]
    pub fn new(column_names: Vec<String>) -> Self {
        Self::with_capacity(column_names, 0)
    }

    /// Create an empty result set with room for `capacity` rows.
    #[must_use]
    pub fn with_capacity(column_names: Vec<String>, capacity: usize) -> Self {
        let cache = Arc::new(index_columns(&column_names));
        ResultSet {
            rows: Vec::with_capacity(capacity),
            column_names: Arc::new(column_names),
            column_index_cache: cache,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Append one row; `values` must follow the column order.
    pub fn add_row_values(&mut self, values: Vec<SqlValue>) {
        self.rows.push(Row::with_index(
            Arc::clone(&self.column_names),
            values,
            Arc::clone(&self.column_index_cache),
        ));
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_share_column_names() {
        let mut rs = ResultSet::with_capacity(vec!["a".into(), "b".into()], 2);
        rs.add_row_values(vec![SqlValue::Int(1), SqlValue::Null]);
        rs.add_row_values(vec![SqlValue::Int(2), SqlValue::Text("x".into())]);
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.rows()[1].get("b"), Some(&SqlValue::Text("x".into())));
        assert_eq!(rs.rows()[0].column_names(), ["a", "b"]);
    }
}
