//! In-memory tabular data model.
//!
//! A [`Dataset`] wraps a polars [`DataFrame`] whose columns all carry one of the engine's
//! semantic [`DType`]s. Construction normalizes the physical types: integers of any
//! width become `Int64`, floats become `Float64`, dates and datetimes become millisecond
//! `Datetime`, and all-null columns become `String`. Every operation can therefore rely
//! on five storage types only. A null cell is a missing cell regardless of the type.
//!
//! Datasets are treated as immutable snapshots: operations build a new dataset instead of
//! editing cells in place.

use crate::error::{EngineError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

pub const DATETIME_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Storage type of every datetime column.
pub(crate) fn datetime_dtype() -> DataType {
    DataType::Datetime(TimeUnit::Milliseconds, None)
}

/// Semantic type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Integer,
    Float,
    Text,
    Boolean,
    DateTime,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    /// Semantic type of a normalized polars column type.
    pub fn of(dtype: &DataType) -> Option<Self> {
        match dtype {
            DataType::Int64 => Some(Self::Integer),
            DataType::Float64 => Some(Self::Float),
            DataType::String => Some(Self::Text),
            DataType::Boolean => Some(Self::Boolean),
            DataType::Datetime(_, _) => Some(Self::DateTime),
            _ => None,
        }
    }

    pub fn to_polars(&self) -> DataType {
        match self {
            Self::Integer => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Text => DataType::String,
            Self::Boolean => DataType::Boolean,
            Self::DateTime => datetime_dtype(),
        }
    }

    /// Zero-like placeholder used when a column has no value to derive a fill from.
    pub fn zero_value(&self) -> Value {
        match self {
            Self::Integer => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::Text => Value::Text("0".to_owned()),
            Self::Boolean => Value::Bool(false),
            Self::DateTime => Value::DateTime(DateTime::<Utc>::UNIX_EPOCH.naive_utc()),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Physical type a column has to be cast to, `None` when it is already normalized.
fn storage_dtype(name: &str, dtype: &DataType) -> Result<Option<DataType>> {
    let target = match dtype {
        DataType::Int64 | DataType::Float64 | DataType::String | DataType::Boolean => None,
        DataType::Datetime(TimeUnit::Milliseconds, None) => None,
        DataType::Date | DataType::Datetime(_, _) => Some(datetime_dtype()),
        DataType::Null => Some(DataType::String),
        d if d.is_integer() => Some(DataType::Int64),
        d if d.is_float() => Some(DataType::Float64),
        other => {
            return Err(EngineError::validation(format!(
                "Column '{name}' has unsupported type {other}"
            )));
        }
    };
    Ok(target)
}

pub(crate) fn datetime_from_millis(ms: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

pub(crate) fn datetime_to_millis(dt: &NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_millis()
}

fn datetime_from_unit(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Milliseconds => DateTime::<Utc>::from_timestamp_millis(value),
        TimeUnit::Microseconds => DateTime::<Utc>::from_timestamp_micros(value),
        TimeUnit::Nanoseconds => Some(DateTime::<Utc>::from_timestamp_nanos(value)),
    };
    dt.map(|dt| dt.naive_utc())
}

/// A single non-missing cell value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn dtype(&self) -> DType {
        match self {
            Self::Int(_) => DType::Integer,
            Self::Float(_) => DType::Float,
            Self::Text(_) => DType::Text,
            Self::Bool(_) => DType::Boolean,
            Self::DateTime(_) => DType::DateTime,
        }
    }

    /// Numeric view of integer and float values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Engine value of a polars cell; `None` for null.
    pub(crate) fn from_any(value: AnyValue<'_>) -> Option<Self> {
        match value {
            AnyValue::Null => None,
            AnyValue::Boolean(b) => Some(Self::Bool(b)),
            AnyValue::String(s) => Some(Self::Text(s.to_owned())),
            AnyValue::StringOwned(s) => Some(Self::Text(s.to_string())),
            AnyValue::Float64(v) => Some(Self::Float(v)),
            AnyValue::Float32(v) => Some(Self::Float(f64::from(v))),
            AnyValue::Datetime(v, unit, _) => datetime_from_unit(v, unit).map(Self::DateTime),
            other => other.extract::<i64>().map(Self::Int),
        }
    }

    /// Literal expression with the column storage type of this value.
    pub(crate) fn to_lit(&self) -> Expr {
        match self {
            Self::Int(v) => lit(*v),
            Self::Float(v) => lit(*v),
            Self::Text(s) => lit(s.clone()),
            Self::Bool(b) => lit(*b),
            Self::DateTime(dt) => lit(datetime_to_millis(dt)).cast(datetime_dtype()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            // Integral floats keep a trailing ".0" so they stay distinguishable from ints.
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{v:.1}")
            }
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_DISPLAY_FORMAT)),
        }
    }
}

/// Collects the cells of one storage type, rejecting values of any other type.
fn typed_cells<T>(
    name: &str,
    dtype: DType,
    values: &[Option<Value>],
    pick: impl Fn(&Value) -> Option<T>,
) -> Result<Vec<Option<T>>> {
    values
        .iter()
        .enumerate()
        .map(|(row, cell)| match cell {
            None => Ok(None),
            Some(value) => pick(value).map(Some).ok_or_else(|| {
                EngineError::validation(format!(
                    "Column '{name}' is declared {dtype} but row {row} holds a {} value",
                    value.dtype()
                ))
            }),
        })
        .collect()
}

/// Builds a typed series from engine values.
pub(crate) fn series_from_values(
    name: &str,
    dtype: DType,
    values: &[Option<Value>],
) -> Result<Series> {
    let series_name = PlSmallStr::from(name);
    let series = match dtype {
        DType::Integer => {
            let cells = typed_cells(name, dtype, values, |v| match v {
                Value::Int(i) => Some(*i),
                _ => None,
            })?;
            Series::new(series_name, cells)
        }
        DType::Float => {
            let cells = typed_cells(name, dtype, values, |v| match v {
                Value::Float(f) => Some(*f),
                _ => None,
            })?;
            Series::new(series_name, cells)
        }
        DType::Text => {
            let cells = typed_cells(name, dtype, values, |v| v.as_str().map(str::to_owned))?;
            Series::new(series_name, cells)
        }
        DType::Boolean => {
            let cells = typed_cells(name, dtype, values, |v| match v {
                Value::Bool(b) => Some(*b),
                _ => None,
            })?;
            Series::new(series_name, cells)
        }
        DType::DateTime => {
            let cells = typed_cells(name, dtype, values, |v| match v {
                Value::DateTime(dt) => Some(datetime_to_millis(dt)),
                _ => None,
            })?;
            Series::new(series_name, cells).cast(&datetime_dtype())?
        }
    };
    Ok(series)
}

/// Plain column-wise form of a dataset, used for serialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnValues {
    pub name: String,
    pub dtype: DType,
    pub values: Vec<Option<Value>>,
}

/// Ordered collection of equally long, uniquely named, typed columns.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(try_from = "Vec<ColumnValues>")]
pub struct Dataset {
    frame: DataFrame,
}

impl Dataset {
    /// Wraps a frame, casting its columns to the engine storage types.
    pub fn new(frame: DataFrame) -> Result<Self> {
        let mut columns = Vec::with_capacity(frame.width());
        for column in frame.get_columns() {
            let column = match storage_dtype(column.name().as_str(), column.dtype())? {
                Some(target) => column.cast(&target)?,
                None => column.clone(),
            };
            columns.push(column);
        }
        let frame = DataFrame::new(columns)?;
        Ok(Self { frame })
    }

    /// Creates a dataset from series, rejecting duplicate names and unequal lengths.
    pub fn from_series(series: Vec<Series>) -> Result<Self> {
        let frame = DataFrame::new(series.into_iter().map(Column::from).collect())
            .map_err(|e| EngineError::validation(e.to_string()))?;
        Self::new(frame)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Lazy view of the frame for expression-based operations.
    pub(crate) fn lazy(&self) -> LazyFrame {
        self.frame.clone().lazy()
    }

    pub fn n_rows(&self) -> usize {
        self.frame.height()
    }

    pub fn n_cols(&self) -> usize {
        self.frame.width()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows(), self.n_cols())
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(PlSmallStr::as_str)
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    /// Looks a column up, turning an unknown name into a validation error.
    pub fn require_column(&self, name: &str) -> Result<&Series> {
        if name.trim().is_empty() {
            return Err(EngineError::validation("No column selected"));
        }
        self.frame
            .column(name)
            .map(Column::as_materialized_series)
            .map_err(|_| EngineError::validation(format!("Column '{name}' not found")))
    }

    pub fn dtype(&self, name: &str) -> Result<DType> {
        let series = self.require_column(name)?;
        Ok(DType::of(series.dtype()).unwrap_or(DType::Text))
    }

    /// Semantic type of every column, left to right.
    pub fn dtypes(&self) -> Vec<DType> {
        self.frame
            .get_columns()
            .iter()
            .map(|c| DType::of(c.dtype()).unwrap_or(DType::Text))
            .collect()
    }

    /// Names of the columns whose type satisfies `keep`.
    pub fn columns_where(&self, keep: impl Fn(DType) -> bool) -> Vec<&str> {
        self.column_names()
            .into_iter()
            .zip(self.dtypes())
            .filter_map(|(name, dtype)| keep(dtype).then_some(name))
            .collect()
    }

    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns_where(|d| d.is_numeric())
    }

    pub fn missing_count(&self) -> usize {
        self.frame.get_columns().iter().map(Column::null_count).sum()
    }

    pub fn total_cells(&self) -> usize {
        self.n_rows() * self.n_cols()
    }

    /// Cells of one column in row order.
    pub fn values(&self, name: &str) -> Result<Vec<Option<Value>>> {
        let series = self.require_column(name)?;
        (0..series.len())
            .map(|row| Ok(Value::from_any(series.get(row)?)))
            .collect()
    }

    pub fn value(&self, name: &str, row: usize) -> Result<Option<Value>> {
        let series = self.require_column(name)?;
        if row >= series.len() {
            return Err(EngineError::validation(format!(
                "Row {row} is out of range for {} rows",
                series.len()
            )));
        }
        Ok(Value::from_any(series.get(row)?))
    }

    /// Numeric cells of a column as floats; missing and non-numeric cells are `None`.
    pub fn f64_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let series = self.require_column(name)?;
        if !DType::of(series.dtype()).is_some_and(|d| d.is_numeric()) {
            return Ok(vec![None; series.len()]);
        }
        let floats = series.cast(&DataType::Float64)?;
        Ok(floats.f64()?.into_iter().collect())
    }

    /// New dataset holding the given rows in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Result<Self> {
        let indices = rows
            .iter()
            .map(|&r| {
                IdxSize::try_from(r)
                    .map_err(|_| EngineError::validation(format!("Row {r} is out of range")))
            })
            .collect::<Result<Vec<_>>>()?;
        let idx = IdxCa::from_vec("rows".into(), indices);
        Self::new(self.frame.take(&idx)?)
    }

    /// New dataset with `series` replacing the column of the same name.
    pub fn with_series(&self, series: Series) -> Result<Self> {
        let mut frame = self.frame.clone();
        frame.with_column(series)?;
        Self::new(frame)
    }

    /// Runs a lazy query on the frame and wraps the result.
    pub(crate) fn query(&self, build: impl FnOnce(LazyFrame) -> LazyFrame) -> Result<Self> {
        Self::new(build(self.lazy()).collect()?)
    }

    /// New dataset holding the rows whose mask entry is `true`.
    pub fn filter_rows(&self, mask: &BooleanChunked) -> Result<Self> {
        Self::new(self.frame.filter(mask)?)
    }

    /// Plain values of every column.
    pub fn column_values(&self) -> Result<Vec<ColumnValues>> {
        self.column_names()
            .into_iter()
            .zip(self.dtypes())
            .map(|(name, dtype)| {
                Ok(ColumnValues {
                    name: name.to_owned(),
                    dtype,
                    values: self.values(name)?,
                })
            })
            .collect()
    }
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.frame.schema() == other.frame.schema() && self.frame.equals_missing(&other.frame)
    }
}

impl TryFrom<DataFrame> for Dataset {
    type Error = EngineError;

    fn try_from(frame: DataFrame) -> Result<Self> {
        Self::new(frame)
    }
}

impl TryFrom<Vec<ColumnValues>> for Dataset {
    type Error = EngineError;

    fn try_from(columns: Vec<ColumnValues>) -> Result<Self> {
        let series = columns
            .iter()
            .map(|c| series_from_values(&c.name, c.dtype, &c.values))
            .collect::<Result<Vec<_>>>()?;
        Self::from_series(series)
    }
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.column_values()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}
