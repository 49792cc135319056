use super::dataset::{DType, Dataset, Value, datetime_from_millis, datetime_to_millis, series_from_values};
use super::types::{
    ColumnCast, MissingStrategy, OperationKind, OperationReport, OutlierConfig, OutlierMode,
};
use crate::error::{EngineError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;

const ROW_INDEX: &str = "__row";
const COUNT: &str = "__count";
const FIRST_ROW: &str = "__first_row";

/// Distinct non-missing values of a column with their counts, most frequent first.
/// Ties go to the value seen first.
pub(crate) fn ranked_values(df: &Dataset, name: &str) -> Result<Vec<(Value, usize)>> {
    df.require_column(name)?;
    let ranked = df
        .lazy()
        .select([col(name)])
        .with_row_index(ROW_INDEX, None)
        .filter(col(name).is_not_null())
        .group_by([col(name)])
        .agg([len().alias(COUNT), col(ROW_INDEX).first().alias(FIRST_ROW)])
        .sort_by_exprs(
            [col(COUNT), col(FIRST_ROW)],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .collect()?;

    let values = ranked.column(name)?;
    let counts = ranked.column(COUNT)?;
    let mut out = Vec::with_capacity(ranked.height());
    for row in 0..ranked.height() {
        let count = counts.get(row)?.extract::<usize>().unwrap_or(0);
        if let Some(value) = Value::from_any(values.get(row)?) {
            out.push((value, count));
        }
    }
    Ok(out)
}

/// Most frequent non-missing value; ties go to the value seen first.
pub(crate) fn mode_of(df: &Dataset, name: &str) -> Result<Option<Value>> {
    Ok(ranked_values(df, name)?.into_iter().next().map(|(v, _)| v))
}

/// Number of rows that repeat an earlier row across all columns.
pub fn duplicate_count(df: &Dataset) -> Result<usize> {
    Ok(df.n_rows().saturating_sub(unique_rows(df)?.n_rows()))
}

/// First occurrence of every distinct row, in order. Missing cells compare equal.
fn unique_rows(df: &Dataset) -> Result<Dataset> {
    df.query(|lf| lf.unique_stable(None, UniqueKeepStrategy::First))
}

pub fn deduplicate(df: &Dataset) -> Result<(Dataset, OperationReport)> {
    let out = unique_rows(df)?;
    let mut report = OperationReport::new(OperationKind::Deduplicate, df.n_rows(), out.n_rows());
    report.columns = out.n_cols();
    Ok((out, report))
}

pub fn handle_missing(
    df: &Dataset,
    strategy: MissingStrategy,
) -> Result<(Dataset, OperationReport)> {
    let missing_before = df.missing_count();

    let out = match strategy {
        MissingStrategy::Drop => df.query(|lf| lf.drop_nulls(None))?,
        MissingStrategy::Mode => fill_mode(df)?,
        _ => {
            let mut out = df.clone();
            for name in df.column_names() {
                if let Some(filled) = fill_column(df.require_column(name)?, strategy)? {
                    out = out.with_series(filled)?;
                }
            }
            out
        }
    };

    let missing_after = out.missing_count();
    let mut report = OperationReport::new(OperationKind::HandleMissing, df.n_rows(), out.n_rows());
    report.columns = out.n_cols();
    report.cells_changed = missing_before.saturating_sub(missing_after);
    tracing::debug!(
        "Missing values ({}): {missing_before} → {missing_after}",
        strategy.as_str()
    );
    Ok((out, report))
}

/// Filled copy of a column, `None` when the strategy leaves it as it is.
fn fill_column(series: &Series, strategy: MissingStrategy) -> Result<Option<Series>> {
    if series.null_count() == 0 {
        return Ok(None);
    }
    let numeric = DType::of(series.dtype()).is_some_and(|d| d.is_numeric());
    let filled = match strategy {
        MissingStrategy::ForwardFill => series.fill_null(FillNullStrategy::Forward(None))?,
        MissingStrategy::BackwardFill => series.fill_null(FillNullStrategy::Backward(None))?,
        // Entirely missing columns have nothing to derive a fill from.
        _ if !numeric || series.null_count() == series.len() => return Ok(None),
        // Filled integer columns become float columns so the fill keeps its fraction.
        MissingStrategy::Median => {
            let floats = series.cast(&DataType::Float64)?;
            let ca = floats.f64()?;
            match ca.median() {
                Some(median) => ca.fill_null_with_values(median)?.into_series(),
                None => return Ok(None),
            }
        }
        _ => series
            .cast(&DataType::Float64)?
            .fill_null(FillNullStrategy::Mean)?,
    };
    Ok(Some(filled))
}

fn fill_mode(df: &Dataset) -> Result<Dataset> {
    let mut fills = Vec::new();
    for (name, dtype) in df.column_names().into_iter().zip(df.dtypes()) {
        if df.require_column(name)?.null_count() == 0 {
            continue;
        }
        let fill = mode_of(df, name)?.unwrap_or_else(|| dtype.zero_value());
        fills.push(col(name).fill_null(fill.to_lit()));
    }
    if fills.is_empty() {
        return Ok(df.clone());
    }
    df.query(|lf| lf.with_columns(fills))
}

fn outlier_targets<'a>(df: &'a Dataset, config: &OutlierConfig) -> Result<Vec<&'a str>> {
    let targets = match &config.columns {
        None => df.numeric_columns(),
        Some(names) => names
            .iter()
            .map(|name| {
                let series = df.require_column(name)?;
                if DType::of(series.dtype()).is_some_and(|d| d.is_numeric()) {
                    Ok(series.name().as_str())
                } else {
                    Err(EngineError::validation(format!(
                        "Column '{name}' is not numeric"
                    )))
                }
            })
            .collect::<Result<Vec<_>>>()?,
    };
    if targets.is_empty() {
        return Err(EngineError::validation(
            "Outlier removal needs at least one numeric column",
        ));
    }
    Ok(targets)
}

/// IQR fences `[Q1 - k·IQR, Q3 + k·IQR]` of a column; `None` when it has no values.
fn iqr_bounds(df: &Dataset, name: &str, multiplier: f64) -> Result<Option<(f64, f64)>> {
    let floats = df.require_column(name)?.cast(&DataType::Float64)?;
    let ca = floats.f64()?;
    let q1 = ca.quantile(0.25, QuantileMethod::Linear)?;
    let q3 = ca.quantile(0.75, QuantileMethod::Linear)?;
    Ok(q1.zip(q3).map(|(q1, q3)| {
        let iqr = q3 - q1;
        (q1 - multiplier * iqr, q3 + multiplier * iqr)
    }))
}

/// Keeps rows whose value lies inside the fences. Missing cells never satisfy the
/// comparison, so a column without values keeps no rows.
fn within(name: &str, bounds: Option<(f64, f64)>) -> Expr {
    match bounds {
        Some((lower, upper)) => {
            let x = col(name).cast(DataType::Float64);
            x.clone()
                .gt_eq(lit(lower))
                .and(x.lt_eq(lit(upper)))
                .fill_null(lit(false))
        }
        // No bounds only happens when every cell is missing.
        None => col(name).is_not_null(),
    }
}

pub fn remove_outliers(df: &Dataset, config: &OutlierConfig) -> Result<(Dataset, OperationReport)> {
    if !(config.multiplier.is_finite() && config.multiplier >= 0.0) {
        return Err(EngineError::validation(format!(
            "IQR multiplier must be a non-negative number, got {}",
            config.multiplier
        )));
    }
    let targets = outlier_targets(df, config)?;

    let out = match config.mode {
        OutlierMode::Sequential => {
            let mut current = df.clone();
            for name in targets {
                let bounds = iqr_bounds(&current, name, config.multiplier)?;
                let before = current.n_rows();
                current = current.query(|lf| lf.filter(within(name, bounds)))?;
                tracing::debug!(
                    "IQR '{name}': bounds {bounds:?}, dropped {} rows",
                    before - current.n_rows()
                );
            }
            current
        }
        OutlierMode::Simultaneous => {
            let mut keep = lit(true);
            for name in targets {
                let bounds = iqr_bounds(df, name, config.multiplier)?;
                keep = keep.and(within(name, bounds));
            }
            df.query(|lf| lf.filter(keep))?
        }
    };

    let mut report = OperationReport::new(OperationKind::RemoveOutliers, df.n_rows(), out.n_rows());
    report.columns = out.n_cols();
    Ok((out, report))
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%Y%m%d"];

/// Parses a datetime from text, trying `extra_formats` first, then common ISO-like
/// layouts, RFC 3339 and plain dates (at midnight).
pub fn parse_datetime(text: &str, extra_formats: &[String]) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let custom = extra_formats.iter().map(String::as_str);
    for fmt in custom.clone().chain(DATETIME_FORMATS.iter().copied()) {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    custom
        .chain(DATE_FORMATS.iter().copied())
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

enum Cast {
    Value(Value),
    /// Datetime parse failure; the cell becomes missing.
    Coerced,
    Failed,
}

fn cast_value(value: &Value, target: DType, formats: &[String]) -> Cast {
    let cast = match (target, value) {
        (DType::Integer, Value::Int(v)) => Some(Value::Int(*v)),
        (DType::Integer, Value::Float(v)) => {
            (v.is_finite() && v.abs() < 9.2e18).then(|| Value::Int(v.trunc() as i64))
        }
        (DType::Integer, Value::Text(s)) => s.trim().parse::<i64>().ok().map(Value::Int),
        (DType::Integer, Value::Bool(b)) => Some(Value::Int(i64::from(*b))),
        (DType::Integer, Value::DateTime(dt)) => Some(Value::Int(datetime_to_millis(dt))),

        (DType::Float, Value::Text(s)) => s.trim().parse::<f64>().ok().map(Value::Float),
        (DType::Float, Value::Bool(b)) => Some(Value::Float(f64::from(u8::from(*b)))),
        (DType::Float, Value::DateTime(dt)) => {
            Some(Value::Float(datetime_to_millis(dt) as f64))
        }
        (DType::Float, v) => v.as_f64().map(Value::Float),

        (DType::Text, v) => Some(Value::Text(v.to_string())),

        (DType::Boolean, Value::Bool(b)) => Some(Value::Bool(*b)),
        (DType::Boolean, Value::Int(v)) => Some(Value::Bool(*v != 0)),
        (DType::Boolean, Value::Float(v)) => Some(Value::Bool(*v != 0.0)),
        (DType::Boolean, Value::Text(s)) => parse_bool(s).map(Value::Bool),
        (DType::Boolean, Value::DateTime(_)) => None,

        (DType::DateTime, v) => {
            let parsed = match v {
                Value::DateTime(dt) => Some(*dt),
                Value::Text(s) => parse_datetime(s, formats),
                Value::Int(ms) => datetime_from_millis(*ms),
                Value::Float(ms) if ms.is_finite() && ms.abs() < 9.2e18 => {
                    datetime_from_millis(*ms as i64)
                }
                Value::Float(_) | Value::Bool(_) => None,
            };
            return parsed.map_or(Cast::Coerced, |dt| Cast::Value(Value::DateTime(dt)));
        }
    };
    cast.map_or(Cast::Failed, Cast::Value)
}

/// Converted column plus the number of cells set missing by failed datetime parses.
fn convert_column(
    df: &Dataset,
    name: &str,
    target: DType,
    formats: &[String],
) -> Result<(Series, usize)> {
    let source = df.dtype(name)?;
    let mut coerced = 0;
    let cells = df.values(name)?;
    let mut values = Vec::with_capacity(cells.len());
    for (row, cell) in cells.iter().enumerate() {
        let Some(value) = cell else {
            values.push(None);
            continue;
        };
        match cast_value(value, target, formats) {
            Cast::Value(v) => values.push(Some(v)),
            Cast::Coerced => {
                coerced += 1;
                values.push(None);
            }
            Cast::Failed => {
                return Err(EngineError::type_conversion(format!(
                    "Column '{name}': cannot convert {source} value '{value}' at row {row} to {target}"
                )));
            }
        }
    }
    Ok((series_from_values(name, target, &values)?, coerced))
}

/// Applies every cast or none of them.
pub fn convert_types(
    df: &Dataset,
    casts: &[ColumnCast],
    datetime_formats: &[String],
) -> Result<(Dataset, OperationReport)> {
    if casts.is_empty() {
        return Err(EngineError::validation("No column conversions requested"));
    }
    // Validate every selection before touching data.
    for cast in casts {
        df.require_column(&cast.column)?;
    }

    let mut working = df.clone();
    let mut report = OperationReport::new(OperationKind::ConvertTypes, df.n_rows(), df.n_rows());
    for cast in casts {
        if working.dtype(&cast.column)? == cast.target {
            continue;
        }
        let present = working.n_rows() - working.require_column(&cast.column)?.null_count();
        let (converted, coerced) =
            convert_column(&working, &cast.column, cast.target, datetime_formats)?;
        report.cells_changed += present - coerced;
        if coerced > 0 {
            let msg = format!(
                "{coerced} values in '{}' could not be parsed as datetimes and were set missing",
                cast.column
            );
            tracing::warn!("{msg}");
            report.warnings.push(msg);
        }
        working = working.with_series(converted)?;
    }
    report.columns = working.n_cols();
    Ok((working, report))
}

/// Z-score standardization of every numeric column using the population standard
/// deviation. Constant columns map to 0.
pub fn normalize(df: &Dataset) -> Result<(Dataset, OperationReport)> {
    let numeric = df.numeric_columns();
    if numeric.is_empty() {
        return Err(EngineError::validation(
            "Normalization needs at least one numeric column",
        ));
    }
    let mut changed = 0;
    let mut exprs = Vec::with_capacity(numeric.len());
    for name in numeric {
        changed += df.n_rows() - df.require_column(name)?.null_count();
        let x = col(name).cast(DataType::Float64);
        let std = x.clone().std(0);
        let scale = when(std.clone().gt(lit(0.0)))
            .then(std)
            .otherwise(lit(1.0));
        exprs.push(((x.clone() - x.mean()) / scale).alias(name));
    }
    let out = df.query(|lf| lf.with_columns(exprs))?;
    let mut report = OperationReport::new(OperationKind::Normalize, df.n_rows(), out.n_rows());
    report.columns = out.n_cols();
    report.cells_changed = changed;
    Ok((out, report))
}
