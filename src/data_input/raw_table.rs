// src/data_input/raw_table.rs

use std::collections::HashMap;

/// Decoded row/column table as produced by the external decoder.
/// Cells use `Option<f64>` to handle missing or unparseable values.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>, // Raw column names, trimmed, in file order.
    pub rows: Vec<Vec<Option<f64>>>, // One entry per column for every row.
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns: columns.into_iter().map(|c| c.trim().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a table from rows given as (column name -> value) mappings.
    /// Columns absent from a row become `None` cells.
    pub fn from_row_maps(columns: Vec<String>, row_maps: &[HashMap<String, f64>]) -> Self {
        let mut table = RawTable::new(columns);
        for map in row_maps {
            let row = table.columns.iter().map(|c| map.get(c).copied()).collect();
            table.rows.push(row);
        }
        table
    }

    /// Appends a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut row: Vec<Option<f64>>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cells of one column, in row order.
    pub fn column(&self, index: usize) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|row| row.get(index).copied().flatten())
            .collect()
    }
}

/// Header parameters found before the data table, kept in file order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RawHeader {
    pub entries: Vec<(String, String)>,
}

impl RawHeader {
    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn push_numeric(&mut self, key: impl Into<String>, value: f64) {
        self.entries.push((key.into(), value.to_string()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lowercased key -> value map; later duplicates win.
    pub fn to_lookup(&self) -> HashMap<String, String> {
        self.entries
            .iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
            .collect()
    }
}
