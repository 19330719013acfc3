//! Table type: a Polars DataFrame with an explicit row index.
//!
//! Polars frames have no row labels, but the processing contract tracks row
//! identity across stages. A [`Table`] pairs the frame with one unique
//! [`RowKey`] per row and offers the row-subsetting operations that keep the
//! two aligned.

use std::collections::{BTreeSet, HashSet};

use polars::prelude::{BooleanChunked, DataFrame, DataType, IdxCa, IdxSize, NewChunkedArray};

use crate::error::{PipelineError, Result};

/// Identity of a row, stable across stages unless a stage changes rows.
pub type RowKey = i64;

/// An ordered sequence of tables flowing through one stage.
pub type Batch = Vec<Table>;

/// A DataFrame plus its row index.
#[derive(Debug, Clone, Default)]
pub struct Table {
    data: DataFrame,
    index: Vec<RowKey>,
}

impl Table {
    /// Wraps a frame with the default index `0..height`.
    pub fn new(data: DataFrame) -> Self {
        let index = (0..data.height() as RowKey).collect();
        Self { data, index }
    }

    /// Wraps a frame with explicit row keys.
    ///
    /// # Errors
    ///
    /// Fails when the key count differs from the frame height or a key repeats.
    pub fn with_index(data: DataFrame, index: Vec<RowKey>) -> Result<Self> {
        validate_index(&index, data.height())?;
        Ok(Self { data, index })
    }

    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    pub fn index(&self) -> &[RowKey] {
        &self.index
    }

    pub fn into_parts(self) -> (DataFrame, Vec<RowKey>) {
        (self.data, self.index)
    }

    /// Returns the number of rows.
    pub fn height(&self) -> usize {
        self.data.height()
    }

    /// Returns the number of columns.
    pub fn width(&self) -> usize {
        self.data.width()
    }

    /// Column names in frame order.
    pub fn column_names(&self) -> Vec<String> {
        self.data
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn column_set(&self) -> BTreeSet<String> {
        self.column_names().into_iter().collect()
    }

    pub fn row_set(&self) -> BTreeSet<RowKey> {
        self.index.iter().copied().collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.data.get_column_index(name).is_some()
    }

    /// Declared dtype of a column, if present.
    pub fn dtype_of(&self, name: &str) -> Option<DataType> {
        self.data.column(name).ok().map(|column| column.dtype().clone())
    }

    /// Replaces the frame while keeping the row index.
    ///
    /// Used by column-level transforms; the new frame must have the same height.
    pub fn with_data(&self, data: DataFrame) -> Result<Self> {
        Self::with_index(data, self.index.clone())
    }

    /// Selects rows by position, carrying their keys along.
    pub fn take_rows(&self, positions: &[IdxSize]) -> Result<Self> {
        let idx = IdxCa::from_vec("rows".into(), positions.to_vec());
        let data = self.data.take(&idx)?;
        let index = positions
            .iter()
            .map(|&pos| self.index[pos as usize])
            .collect();
        Self::with_index(data, index)
    }

    /// Keeps the rows where `mask` is true (nulls count as false).
    pub fn filter_rows(&self, mask: &BooleanChunked) -> Result<Self> {
        let data = self.data.filter(mask)?;
        let index = self
            .index
            .iter()
            .zip(mask.into_iter())
            .filter_map(|(key, keep)| (keep == Some(true)).then_some(*key))
            .collect();
        Self::with_index(data, index)
    }

    /// Convenience wrapper around [`Table::filter_rows`] for a plain bool slice.
    pub fn retain_rows(&self, keep: &[bool]) -> Result<Self> {
        let mask = BooleanChunked::from_slice("retain".into(), keep);
        self.filter_rows(&mask)
    }

    /// Discards the row keys and assigns `0..height`.
    pub fn reset_index(self) -> Self {
        Self::new(self.data)
    }

    /// Structural equality: column names and order, dtypes, values
    /// (nulls equal) and row keys.
    pub fn equals(&self, other: &Table) -> bool {
        self.index == other.index
            && self.data.get_column_names() == other.data.get_column_names()
            && self.data.dtypes() == other.data.dtypes()
            && self.data.equals_missing(&other.data)
    }
}

fn validate_index(index: &[RowKey], rows: usize) -> Result<()> {
    if index.len() != rows {
        return Err(PipelineError::IndexLength {
            keys: index.len(),
            rows,
        });
    }
    let mut seen = HashSet::with_capacity(index.len());
    for key in index {
        if !seen.insert(*key) {
            return Err(PipelineError::DuplicateRowKey { key: *key });
        }
    }
    Ok(())
}
