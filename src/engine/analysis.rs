use super::cleaning::{duplicate_count, parse_datetime, ranked_values};
use super::dataset::{DType, Dataset, Value};
use super::types::{
    AggFunc, CategoricalSummary, ColumnMissing, CorrelationMatrix, DataOverview,
    GroupAggregationConfig, GroupAggregationResult, GroupComparison, GroupDistribution,
    NumericSummary, PivotConfig, PivotResult, QualityGrade, StatsReport, TimeSeries,
};
use crate::error::{EngineError, Result};
use polars::prelude::*;
use std::collections::{BTreeMap, HashMap};

const TOP_VALUES: usize = 3;
const VALUE: &str = "__value";

pub fn describe(df: &Dataset) -> Result<StatsReport> {
    let rows = df.n_rows();

    let mut dtype_counts = BTreeMap::new();
    for dtype in df.dtypes() {
        *dtype_counts.entry(dtype).or_insert(0) += 1;
    }

    let missing = df
        .column_names()
        .into_iter()
        .map(|name| {
            let count = df.require_column(name)?.null_count();
            Ok(ColumnMissing {
                column: name.to_owned(),
                missing: count,
                percent: percent(count, rows),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let numeric = df
        .numeric_columns()
        .into_iter()
        .map(|name| numeric_summary(df, name))
        .collect::<Result<Vec<_>>>()?;

    let categorical = df
        .columns_where(|d| d == DType::Text)
        .into_iter()
        .map(|name| categorical_summary(df, name))
        .collect::<Result<Vec<_>>>()?;

    let total_cells = df.total_cells();
    let missing_cells: usize = missing.iter().map(|m| m.missing).sum();
    let completeness = if total_cells == 0 {
        1.0
    } else {
        (total_cells - missing_cells) as f64 / total_cells as f64
    };
    let duplicate_rows = duplicate_count(df)?;

    let quality = if completeness > 0.95 {
        QualityGrade::Good
    } else if completeness > 0.80 {
        QualityGrade::Fair
    } else {
        QualityGrade::Poor
    };

    let mut recommendations = Vec::new();
    if missing_cells > 0 {
        recommendations.push(format!(
            "Handle the {missing_cells} missing values (drop rows or impute)."
        ));
    }
    if duplicate_rows > 0 {
        recommendations.push(format!("Remove the {duplicate_rows} duplicate rows."));
    }
    match quality {
        QualityGrade::Good => recommendations.push("Data quality is good.".to_owned()),
        QualityGrade::Fair => {
            recommendations.push("Data quality is fair; cleaning is advised.".to_owned());
        }
        QualityGrade::Poor => {
            recommendations.push("Data quality is poor; thorough cleaning is needed.".to_owned());
        }
    }

    Ok(StatsReport {
        rows,
        columns: df.n_cols(),
        dtype_counts,
        missing,
        numeric,
        categorical,
        completeness,
        duplicate_rows,
        quality,
        recommendations,
    })
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

const SUMMARY_FIELDS: [&str; 8] = [
    "__count", "__mean", "__std", "__min", "__q1", "__median", "__q3", "__max",
];

/// Aggregations behind a [`NumericSummary`], in [`SUMMARY_FIELDS`] order.
fn summary_exprs(name: &str) -> Vec<Expr> {
    let x = col(name).cast(DataType::Float64);
    let exprs = [
        x.clone().count(),
        x.clone().mean(),
        x.clone().std(1),
        x.clone().min(),
        x.clone().quantile(lit(0.25), QuantileMethod::Linear),
        x.clone().median(),
        x.clone().quantile(lit(0.75), QuantileMethod::Linear),
        x.max(),
    ];
    exprs
        .into_iter()
        .zip(SUMMARY_FIELDS)
        .map(|(expr, field)| expr.alias(field))
        .collect()
}

/// Float cell of an aggregation result; null and non-numeric cells are `None`.
fn f64_cell(frame: &DataFrame, name: &str, row: usize) -> Result<Option<f64>> {
    Ok(frame.column(name)?.get(row)?.extract::<f64>())
}

fn read_summary(frame: &DataFrame, column: &str, row: usize) -> Result<NumericSummary> {
    let [count, mean, std, min, q1, median, q3, max] = SUMMARY_FIELDS;
    Ok(NumericSummary {
        column: column.to_owned(),
        count: frame.column(count)?.get(row)?.extract::<usize>().unwrap_or(0),
        mean: f64_cell(frame, mean, row)?,
        std_dev: f64_cell(frame, std, row)?,
        min: f64_cell(frame, min, row)?,
        q1: f64_cell(frame, q1, row)?,
        median: f64_cell(frame, median, row)?,
        q3: f64_cell(frame, q3, row)?,
        max: f64_cell(frame, max, row)?,
    })
}

pub(crate) fn numeric_summary(df: &Dataset, name: &str) -> Result<NumericSummary> {
    let summary = df.lazy().select(summary_exprs(name)).collect()?;
    read_summary(&summary, name, 0)
}

fn categorical_summary(df: &Dataset, name: &str) -> Result<CategoricalSummary> {
    let ranked = ranked_values(df, name)?;
    let non_missing = df.n_rows() - df.require_column(name)?.null_count();
    let unique = ranked.len();
    let top_values = ranked
        .into_iter()
        .take(TOP_VALUES)
        .map(|(value, count)| (value.to_string(), count))
        .collect();

    Ok(CategoricalSummary {
        column: name.to_owned(),
        unique,
        unique_percent: percent(unique, non_missing),
        top_values,
    })
}

pub fn overview(df: &Dataset) -> DataOverview {
    DataOverview {
        rows: df.n_rows(),
        columns: df.n_cols(),
        numeric_columns: df.numeric_columns().len(),
        text_columns: df.columns_where(|d| d == DType::Text).len(),
        missing_cells: df.missing_count(),
        approx_bytes: df.frame().estimated_size(),
    }
}

/// Pearson correlation of two columns over the rows where both are present.
fn pearson(df: &Dataset, a: &str, b: &str) -> Result<f64> {
    let x = col(a).cast(DataType::Float64);
    let y = col(b).cast(DataType::Float64);
    let dx = x.clone() - x.clone().mean();
    let dy = y.clone() - y.clone().mean();
    let sums = df
        .lazy()
        .filter(x.is_not_null().and(y.is_not_null()))
        .select([
            (dx.clone() * dy.clone()).sum().alias("sxy"),
            (dx.clone() * dx).sum().alias("sxx"),
            (dy.clone() * dy).sum().alias("syy"),
            len().alias("n"),
        ])
        .collect()?;

    let n = sums.column("n")?.get(0)?.extract::<usize>().unwrap_or(0);
    let sxy = f64_cell(&sums, "sxy", 0)?.unwrap_or(0.0);
    let sxx = f64_cell(&sums, "sxx", 0)?.unwrap_or(0.0);
    let syy = f64_cell(&sums, "syy", 0)?.unwrap_or(0.0);
    if n < 2 || sxx == 0.0 || syy == 0.0 {
        return Err(EngineError::computation(format!(
            "Correlation between '{a}' and '{b}' is undefined (constant values or fewer than 2 complete rows)"
        )));
    }
    Ok((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Pearson correlation between every pair of numeric columns, over the rows where both
/// columns are present.
#[expect(clippy::indexing_slicing)]
pub fn correlation_matrix(df: &Dataset) -> Result<CorrelationMatrix> {
    let numeric = df.numeric_columns();
    if numeric.len() < 2 {
        return Err(EngineError::validation(format!(
            "Correlation needs at least 2 numeric columns, found {}",
            numeric.len()
        )));
    }

    let n = numeric.len();
    let mut data = vec![vec![0.0; n]; n];
    for i in 0..n {
        data[i][i] = 1.0;
        for j in (i + 1)..n {
            let r = pearson(df, numeric[i], numeric[j])?;
            data[i][j] = r;
            data[j][i] = r;
        }
    }

    Ok(CorrelationMatrix {
        columns: numeric.iter().map(|c| (*c).to_owned()).collect(),
        data,
    })
}

fn require_numeric(df: &Dataset, name: &str) -> Result<()> {
    let dtype = df.dtype(name)?;
    if !dtype.is_numeric() {
        return Err(EngineError::validation(format!(
            "Column '{name}' must be numeric, it is {dtype}"
        )));
    }
    Ok(())
}

/// Aggregation of a value column within each group. `count_rows` makes `Count` count
/// rows instead of non-missing values.
fn agg_expr(value: &str, function: AggFunc, count_rows: bool) -> Expr {
    let x = col(value).cast(DataType::Float64);
    let expr = match function {
        AggFunc::Count if count_rows => len(),
        AggFunc::Count => x.count(),
        AggFunc::Mean => x.mean(),
        AggFunc::Median => x.median(),
        AggFunc::Sum => x.sum(),
        AggFunc::Max => x.max(),
        AggFunc::Min => x.min(),
        AggFunc::Std => x.std(1),
        AggFunc::Var => x.var(1),
    };
    expr.cast(DataType::Float64).alias(VALUE)
}

/// Groups by `keys`, dropping rows with a missing key, and sorts ascending by key.
fn grouped(df: &Dataset, keys: &[&str], aggs: Vec<Expr>) -> Result<DataFrame> {
    let mut complete = lit(true);
    for key in keys {
        complete = complete.and(col(*key).is_not_null());
    }
    let by: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();
    let out = df
        .lazy()
        .filter(complete)
        .group_by(by)
        .agg(aggs)
        .sort(
            keys.iter().map(|k| PlSmallStr::from(*k)).collect::<Vec<_>>(),
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()?;
    Ok(out)
}

fn key_values(frame: &DataFrame, name: &str) -> Result<Vec<Value>> {
    let column = frame.column(name)?;
    let mut keys = Vec::with_capacity(column.len());
    for row in 0..column.len() {
        if let Some(value) = Value::from_any(column.get(row)?) {
            keys.push(value);
        }
    }
    Ok(keys)
}

pub fn group_aggregate(
    df: &Dataset,
    config: &GroupAggregationConfig,
) -> Result<GroupAggregationResult> {
    if config.group_column.trim().is_empty() {
        return Err(EngineError::validation("Select a column to group by"));
    }
    if config.value_column.trim().is_empty() {
        return Err(EngineError::validation("Select a column to aggregate"));
    }
    df.require_column(&config.group_column)?;
    if config.function == AggFunc::Count {
        df.require_column(&config.value_column)?;
    } else {
        require_numeric(df, &config.value_column)?;
    }

    let out = grouped(
        df,
        &[config.group_column.as_str()],
        vec![agg_expr(&config.value_column, config.function, true)],
    )?;
    let values = (0..out.height())
        .map(|row| f64_cell(&out, VALUE, row))
        .collect::<Result<Vec<_>>>()?;

    Ok(GroupAggregationResult {
        group_column: config.group_column.clone(),
        value_column: config.value_column.clone(),
        function: config.function,
        groups: key_values(&out, &config.group_column)?,
        values,
    })
}

/// Cross-tabulation of `values` by `index` and optional `columns`. Missing
/// combinations are 0; `count` counts non-missing values.
pub fn pivot_table(df: &Dataset, config: &PivotConfig) -> Result<PivotResult> {
    if config.index.trim().is_empty() {
        return Err(EngineError::validation("Select a row index column"));
    }
    if config.values.trim().is_empty() {
        return Err(EngineError::validation("Select a value column"));
    }
    df.require_column(&config.index)?;
    require_numeric(df, &config.values)?;
    let function = AggFunc::from(config.function);
    let agg = || vec![agg_expr(&config.values, function, false)];

    let by_index = grouped(df, &[config.index.as_str()], agg())?;
    let row_index = key_values(&by_index, &config.index)?;

    let column_key = match config.columns.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => {
            df.require_column(name)?;
            name
        }
        _ => {
            let matrix = (0..by_index.height())
                .map(|row| Ok(vec![f64_cell(&by_index, VALUE, row)?.unwrap_or(0.0)]))
                .collect::<Result<Vec<_>>>()?;
            return Ok(PivotResult {
                row_index,
                col_index: None,
                matrix,
            });
        }
    };
    if column_key == config.index {
        return Err(EngineError::validation(
            "Pivot index and columns must be different columns",
        ));
    }

    let col_index = key_values(&grouped(df, &[column_key], vec![len()])?, column_key)?;
    let cells = grouped(df, &[config.index.as_str(), column_key], agg())?;

    // Keys within one column share a dtype, so their display form identifies them.
    let row_position: HashMap<String, usize> = row_index
        .iter()
        .enumerate()
        .map(|(i, k)| (k.to_string(), i))
        .collect();
    let col_position: HashMap<String, usize> = col_index
        .iter()
        .enumerate()
        .map(|(j, k)| (k.to_string(), j))
        .collect();

    let mut matrix = vec![vec![0.0; col_index.len()]; row_index.len()];
    let row_keys = cells.column(&config.index)?;
    let col_keys = cells.column(column_key)?;
    for row in 0..cells.height() {
        let (Some(r), Some(c)) = (
            Value::from_any(row_keys.get(row)?),
            Value::from_any(col_keys.get(row)?),
        ) else {
            continue;
        };
        let slot = row_position
            .get(&r.to_string())
            .zip(col_position.get(&c.to_string()))
            .and_then(|(&i, &j)| matrix.get_mut(i).and_then(|cells| cells.get_mut(j)));
        if let Some(slot) = slot {
            *slot = f64_cell(&cells, VALUE, row)?.unwrap_or(0.0);
        }
    }

    Ok(PivotResult {
        row_index,
        col_index: Some(col_index),
        matrix,
    })
}

/// Distribution summary of a numeric column for each group.
pub fn group_comparison(
    df: &Dataset,
    group_column: &str,
    value_column: &str,
) -> Result<GroupComparison> {
    df.require_column(group_column)?;
    require_numeric(df, value_column)?;
    let out = grouped(df, &[group_column], summary_exprs(value_column))?;
    let groups = key_values(&out, group_column)?
        .into_iter()
        .enumerate()
        .map(|(row, group)| {
            Ok(GroupDistribution {
                group,
                summary: read_summary(&out, value_column, row)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(GroupComparison {
        group_column: group_column.to_owned(),
        value_column: value_column.to_owned(),
        groups,
    })
}

/// (time, value) pairs sorted chronologically. Text time columns are parsed on the fly.
pub fn time_series(
    df: &Dataset,
    time_column: &str,
    value_column: &str,
    datetime_formats: &[String],
) -> Result<TimeSeries> {
    let time_dtype = df.dtype(time_column)?;
    if !matches!(time_dtype, DType::DateTime | DType::Text) {
        return Err(EngineError::validation(format!(
            "Column '{time_column}' holds {time_dtype} values, expected datetimes"
        )));
    }
    require_numeric(df, value_column)?;

    let times = df.values(time_column)?;
    let values = df.f64_values(value_column)?;
    let mut points: Vec<_> = times
        .iter()
        .zip(values)
        .filter_map(|(time, value)| {
            let time = match time {
                Some(Value::DateTime(dt)) => Some(*dt),
                Some(Value::Text(s)) => parse_datetime(s, datetime_formats),
                _ => None,
            };
            time.zip(value)
        })
        .collect();
    let skipped = df.n_rows() - points.len();
    points.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(TimeSeries {
        time_column: time_column.to_owned(),
        value_column: value_column.to_owned(),
        points,
        skipped,
    })
}
