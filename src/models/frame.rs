//! In-memory tabular model shared by every stage.
//!
//! [`Frame`] and [`Series`] wrap a polars `DataFrame` and `Series`; the
//! row-level transforms (dedup, null handling, counting) run in polars.
//! [`Cell`] is the scalar view used wherever single values leave the frame:
//! labels, fill values, JSON records and report tables.

use crate::error::DataError;
use indexmap::IndexMap;
use ndarray::Array2;
use polars::prelude as pl;
use polars::prelude::*;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// One value of a column.
#[derive(Debug, Clone)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Parse a raw text field, the way a CSV or spreadsheet value is read.
    ///
    /// Empty strings and the usual missing markers become [`Cell::Null`].
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || matches!(trimmed, "NA" | "NaN" | "nan" | "null" | "NULL" | "None")
        {
            return Cell::Null;
        }
        if let Ok(v) = trimmed.parse::<i64>() {
            return Cell::Int(v);
        }
        if let Ok(v) = trimmed.parse::<f64>() {
            return Cell::Float(v);
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Cell::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Cell::Bool(false);
        }
        Cell::Text(raw.to_string())
    }

    /// Convert a JSON scalar. Nested values are kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
            },
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    /// Null cells, and floats holding NaN, count as missing.
    pub fn is_null(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Cell::Int(_) | Cell::Float(_))
    }

    /// Numeric view. Booleans map to 0/1; text has none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Null => None,
            Cell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            Cell::Text(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Int(v) => Value::from(*v),
            Cell::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Cell::Null => 0,
            Cell::Bool(_) => 1,
            Cell::Int(_) | Cell::Float(_) => 2,
            Cell::Text(_) => 3,
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cell::Null, Cell::Null) => true,
            (Cell::Bool(a), Cell::Bool(b)) => a == b,
            (Cell::Int(a), Cell::Int(b)) => a == b,
            (Cell::Float(a), Cell::Float(b)) => a.to_bits() == b.to_bits(),
            (Cell::Text(a), Cell::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Cell::Null => {}
            Cell::Bool(b) => b.hash(state),
            Cell::Int(v) => v.hash(state),
            Cell::Float(v) => v.to_bits().hash(state),
            Cell::Text(s) => s.hash(state),
        }
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Nulls first, then booleans, numbers (compared by value), and text.
impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Cell::Bool(a), Cell::Bool(b)) => a.cmp(b),
            (Cell::Int(a), Cell::Int(b)) => a.cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                x.total_cmp(&y)
                    .then_with(|| matches!(a, Cell::Float(_)).cmp(&matches!(b, Cell::Float(_))))
            }
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{:?}", v),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_none(),
            Cell::Bool(b) => serializer.serialize_bool(*b),
            Cell::Int(v) => serializer.serialize_i64(*v),
            Cell::Float(v) if v.is_nan() => serializer.serialize_none(),
            Cell::Float(v) => serializer.serialize_f64(*v),
            Cell::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Cell::Bool(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

/// A named column backed by a polars `Series`.
#[derive(Debug, Clone)]
pub struct Series(pl::Series);

impl Series {
    /// Build from cells; the dtype follows the non-null values.
    pub fn new(name: impl AsRef<str>, values: Vec<Cell>) -> Self {
        Self(build_series(name.as_ref(), &values))
    }

    pub fn from_polars(series: pl::Series) -> Self {
        Self(series)
    }

    pub fn as_polars(&self) -> &pl::Series {
        &self.0
    }

    pub fn name(&self) -> &str {
        self.0.name().as_str()
    }

    pub fn with_name(self, name: &str) -> Self {
        Self(self.0.with_name(name.into()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.0.null_count()
    }

    pub fn cells(&self) -> Result<Vec<Cell>, DataError> {
        series_cells(&self.0)
    }

    /// Values as floats, nulls as NaN. Text columns are rejected.
    pub fn to_f64(&self) -> Result<Vec<f64>, DataError> {
        let dtype = self.0.dtype();
        if !is_numeric_dtype(dtype) && *dtype != pl::DataType::Boolean {
            return Err(DataError::NonNumericFeature(self.name().to_string()));
        }
        let values = self.0.cast(&pl::DataType::Float64)?;
        Ok(values
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect())
    }

    /// Distinct non-null values.
    pub fn nunique(&self) -> usize {
        self.0.drop_nulls().n_unique().unwrap_or(0)
    }

    /// Frequency of each distinct non-null value, most frequent first.
    ///
    /// Ties keep the order of first occurrence. With `normalize` the counts
    /// are divided by the number of non-null values.
    pub fn value_counts(&self, normalize: bool) -> Result<Vec<(Cell, f64)>, DataError> {
        let present = self.0.drop_nulls();
        let counts_name = format!("{}_count", self.name());
        let table = present.value_counts(false, false, counts_name.as_str().into(), false)?;
        let [values, counts] = table.get_columns() else {
            return Ok(Vec::new());
        };
        let values = series_cells(values.as_materialized_series())?;
        let counts = counts
            .as_materialized_series()
            .cast(&pl::DataType::Float64)?;
        let by_value: IndexMap<Cell, f64> = values
            .into_iter()
            .zip(counts.f64()?.into_iter().map(|n| n.unwrap_or(0.0)))
            .collect();

        let mut ordered: IndexMap<Cell, f64> = IndexMap::with_capacity(by_value.len());
        for cell in series_cells(&present)? {
            if !ordered.contains_key(&cell) {
                let n = by_value.get(&cell).copied().unwrap_or(0.0);
                ordered.insert(cell, n);
            }
        }
        let total = present.len() as f64;

        let mut ordered: Vec<(Cell, f64)> = ordered.into_iter().collect();
        // stable sort keeps first-occurrence order among equal counts
        ordered.sort_by(|a, b| b.1.total_cmp(&a.1));
        if normalize && total > 0.0 {
            for (_, n) in &mut ordered {
                *n /= total;
            }
        }
        Ok(ordered)
    }

    /// Sorted distinct non-null values.
    pub fn classes(&self) -> Result<Vec<Cell>, DataError> {
        let mut classes = series_cells(&self.0.drop_nulls().unique()?)?;
        classes.sort();
        Ok(classes)
    }
}

impl PartialEq for Series {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name() && self.0.equals_missing(&other.0)
    }
}

/// Ordered named columns of equal length, backed by a polars `DataFrame`.
#[derive(Debug, Clone)]
pub struct Frame(pl::DataFrame);

impl Default for Frame {
    fn default() -> Self {
        Self(pl::DataFrame::empty())
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.0.equals_missing(&other.0)
    }
}

impl From<pl::DataFrame> for Frame {
    fn from(df: pl::DataFrame) -> Self {
        Self(df)
    }
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_polars(&self) -> &pl::DataFrame {
        &self.0
    }

    /// Build from columns, rejecting ragged input.
    pub fn from_columns(columns: IndexMap<String, Vec<Cell>>) -> Result<Self, DataError> {
        let n_rows = columns.values().next().map(Vec::len).unwrap_or(0);
        for (name, values) in &columns {
            if values.len() != n_rows {
                return Err(DataError::RaggedColumn {
                    column: name.clone(),
                    found: values.len(),
                    expected: n_rows,
                });
            }
        }
        let columns = columns
            .iter()
            .map(|(name, values)| build_series(name, values).into_column())
            .collect();
        Ok(Self(pl::DataFrame::new(columns)?))
    }

    /// Build from records. Columns follow first appearance; absent keys are null.
    pub fn from_records(records: &[IndexMap<String, Cell>]) -> Result<Self, DataError> {
        let mut columns: IndexMap<String, Vec<Cell>> = IndexMap::new();
        for record in records {
            for key in record.keys() {
                columns.entry(key.clone()).or_default();
            }
        }
        for (name, values) in columns.iter_mut() {
            values.extend(
                records
                    .iter()
                    .map(|r| r.get(name).cloned().unwrap_or(Cell::Null)),
            );
        }
        Self::from_columns(columns)
    }

    /// Build a fully numeric frame from a matrix.
    pub fn from_matrix(names: &[String], matrix: &Array2<f64>) -> Result<Self, DataError> {
        if names.len() != matrix.ncols() {
            return Err(DataError::LengthMismatch {
                features: matrix.ncols(),
                target: names.len(),
            });
        }
        let columns = names
            .iter()
            .enumerate()
            .map(|(j, name)| {
                pl::Series::new(name.as_str().into(), matrix.column(j).to_vec()).into_column()
            })
            .collect();
        Ok(Self(pl::DataFrame::new(columns)?))
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        self.0.shape()
    }

    pub fn n_rows(&self) -> usize {
        self.0.height()
    }

    pub fn n_cols(&self) -> usize {
        self.0.width()
    }

    pub fn is_empty(&self) -> bool {
        self.0.height() == 0 || self.0.width() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.0
            .get_columns()
            .iter()
            .map(|c| c.name().as_str().to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.0.column(name).is_ok()
    }

    /// Cells of one column.
    pub fn column(&self, name: &str) -> Option<Vec<Cell>> {
        self.series(name).and_then(|s| s.cells().ok())
    }

    pub fn series(&self, name: &str) -> Option<Series> {
        self.0
            .column(name)
            .ok()
            .map(|c| Series(c.as_materialized_series().clone()))
    }

    pub fn columns(&self) -> impl Iterator<Item = Series> + '_ {
        self.0
            .get_columns()
            .iter()
            .map(|c| Series(c.as_materialized_series().clone()))
    }

    /// Integer, float or all-null dtype.
    pub fn is_numeric(&self, name: &str) -> bool {
        self.0
            .column(name)
            .map(|c| is_numeric_dtype(c.dtype()))
            .unwrap_or(false)
    }

    pub fn numeric_columns(&self) -> Vec<String> {
        self.0
            .get_columns()
            .iter()
            .filter(|c| is_numeric_dtype(c.dtype()))
            .map(|c| c.name().as_str().to_string())
            .collect()
    }

    /// Distinct non-null values of a column.
    pub fn nunique(&self, name: &str) -> usize {
        self.series(name).map(|s| s.nunique()).unwrap_or(0)
    }

    pub fn null_counts(&self) -> IndexMap<String, usize> {
        self.0
            .get_columns()
            .iter()
            .map(|c| (c.name().as_str().to_string(), c.null_count()))
            .collect()
    }

    /// Rows identical to an earlier row.
    pub fn duplicated_count(&self) -> Result<usize, DataError> {
        Ok(self.n_rows() - self.drop_duplicates()?.n_rows())
    }

    /// Keep the first occurrence of every distinct row, in row order.
    pub fn drop_duplicates(&self) -> Result<Self, DataError> {
        if self.0.width() == 0 {
            return Ok(self.clone());
        }
        Ok(Self(self.0.unique_stable(
            None,
            UniqueKeepStrategy::First,
            None,
        )?))
    }

    /// Drop every row holding at least one missing value.
    pub fn dropna(&self) -> Result<Self, DataError> {
        Ok(Self(self.0.drop_nulls::<String>(None)?))
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Self {
        Self(self.0.head(Some(n)))
    }

    /// Drop the named columns; names not present are ignored.
    pub fn drop_columns(&self, names: &[String]) -> Result<Self, DataError> {
        let mut df = self.0.clone();
        for name in names {
            if df.column(name).is_ok() {
                df = df.drop(name)?;
            }
        }
        Ok(Self(df))
    }

    /// Split off `target`, returning the remaining features and the target.
    pub fn split_target(&self, target: &str) -> Result<(Frame, Series), DataError> {
        let series = self
            .series(target)
            .ok_or_else(|| DataError::ColumnNotFound(target.to_string()))?;
        let features = self.drop_columns(&[target.to_string()])?;
        Ok((features, series))
    }

    /// Append (or replace) a column built from cells.
    pub fn with_column(
        self,
        name: impl AsRef<str>,
        values: Vec<Cell>,
    ) -> Result<Self, DataError> {
        self.with_series(Series::new(name, values))
    }

    /// Append (or replace) a column.
    pub fn with_series(mut self, series: Series) -> Result<Self, DataError> {
        if self.0.width() > 0 && series.len() != self.0.height() {
            return Err(DataError::RaggedColumn {
                column: series.name().to_string(),
                found: series.len(),
                expected: self.0.height(),
            });
        }
        self.0.with_column(series.0)?;
        Ok(self)
    }

    /// Dense numeric matrix. Nulls become NaN, booleans 0/1; text is rejected.
    pub fn to_matrix(&self) -> Result<Array2<f64>, DataError> {
        let mut matrix = Array2::<f64>::zeros(self.0.shape());
        for (j, series) in self.columns().enumerate() {
            for (i, v) in series.to_f64()?.into_iter().enumerate() {
                matrix[[i, j]] = v;
            }
        }
        Ok(matrix)
    }

    /// Column names with their cells, in column order.
    pub fn cell_columns(&self) -> Result<Vec<(String, Vec<Cell>)>, DataError> {
        self.columns()
            .map(|s| Ok((s.name().to_string(), s.cells()?)))
            .collect()
    }

    /// Row-oriented JSON records.
    pub fn to_records(
        &self,
    ) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, DataError> {
        let columns = self.cell_columns()?;
        Ok((0..self.n_rows())
            .map(|i| {
                columns
                    .iter()
                    .map(|(name, values)| (name.clone(), values[i].to_json()))
                    .collect()
            })
            .collect())
    }
}

fn is_numeric_dtype(dtype: &pl::DataType) -> bool {
    dtype.is_integer() || dtype.is_float() || *dtype == pl::DataType::Null
}

/// Int64 when every present cell is an int, Float64 for mixed numbers,
/// Boolean for flags and String for anything else. All-null columns are Int64.
fn build_series(name: &str, cells: &[Cell]) -> pl::Series {
    let present = || cells.iter().filter(|c| !c.is_null());
    if present().all(|c| matches!(c, Cell::Int(_))) {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|c| match c {
                Cell::Int(v) => Some(*v),
                _ => None,
            })
            .collect();
        pl::Series::new(name.into(), values)
    } else if present().all(Cell::is_numeric) {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|c| c.as_f64().filter(|v| !v.is_nan()))
            .collect();
        pl::Series::new(name.into(), values)
    } else if present().all(|c| matches!(c, Cell::Bool(_))) {
        let values: Vec<Option<bool>> = cells
            .iter()
            .map(|c| match c {
                Cell::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        pl::Series::new(name.into(), values)
    } else {
        let text: Vec<Option<String>> = cells
            .iter()
            .map(|c| (!c.is_null()).then(|| c.to_string()))
            .collect();
        let values: Vec<Option<&str>> = text.iter().map(Option::as_deref).collect();
        pl::Series::new(name.into(), values)
    }
}

fn series_cells(series: &pl::Series) -> Result<Vec<Cell>, DataError> {
    let dtype = series.dtype();
    let cells = if dtype.is_integer() {
        let values = series.cast(&pl::DataType::Int64)?;
        values
            .i64()?
            .into_iter()
            .map(|v| v.map_or(Cell::Null, Cell::Int))
            .collect()
    } else if dtype.is_float() {
        let values = series.cast(&pl::DataType::Float64)?;
        values
            .f64()?
            .into_iter()
            .map(|v| match v {
                Some(v) if !v.is_nan() => Cell::Float(v),
                _ => Cell::Null,
            })
            .collect()
    } else {
        match dtype {
            pl::DataType::Null => vec![Cell::Null; series.len()],
            pl::DataType::Boolean => series
                .bool()?
                .into_iter()
                .map(|v| v.map_or(Cell::Null, Cell::Bool))
                .collect(),
            _ => {
                let values = series.cast(&pl::DataType::String)?;
                values
                    .str()?
                    .into_iter()
                    .map(|v| v.map_or(Cell::Null, Cell::from))
                    .collect()
            }
        }
    };
    Ok(cells)
}

/// Input accepted by the data stage before normalization.
#[derive(Debug, Clone)]
pub enum RawData {
    Frame(Frame),
    Json(serde_json::Value),
}

impl From<Frame> for RawData {
    fn from(frame: Frame) -> Self {
        RawData::Frame(frame)
    }
}
