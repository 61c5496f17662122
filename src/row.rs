use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// One fetched row.
///
/// Column names and the name lookup table are shared by every row of the
/// same result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Column names in result order
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub values: Vec<RowValues>,
    column_index: Arc<HashMap<String, usize>>,
}

/// Shared name → index table for the rows of one result set.
pub(crate) fn column_index(column_names: &[String]) -> Arc<HashMap<String, usize>> {
    let mut map = HashMap::with_capacity(column_names.len());
    for (i, name) in column_names.iter().enumerate() {
        // First occurrence wins for duplicated names.
        map.entry(name.clone()).or_insert(i);
    }
    Arc::new(map)
}

impl Row {
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<RowValues>) -> Self {
        let column_index = column_index(&column_names);
        Self::with_index(column_names, column_index, values)
    }

    pub(crate) fn with_index(
        column_names: Arc<Vec<String>>,
        column_index: Arc<HashMap<String, usize>>,
        values: Vec<RowValues>,
    ) -> Self {
        Self {
            column_names,
            values,
            column_index,
        }
    }

    /// Position of `column_name` in this row.
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_index.get(column_name).copied()
    }

    /// Value under `column_name`, or `None` when no such column exists.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume the row, keeping only its values.
    #[must_use]
    pub fn into_values(self) -> Vec<RowValues> {
        self.values
    }
}
