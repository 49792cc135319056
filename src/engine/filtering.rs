use super::cleaning::parse_datetime;
use super::dataset::{DATETIME_DISPLAY_FORMAT, DType, Dataset, datetime_to_millis};
use super::types::{
    FilterConfig, FilterOp, OperationKind, OperationReport, SampleConfig, SampleSize, SortConfig,
};
use crate::error::{EngineError, Result};
use polars::prelude::*;

/// Cells of a column as the text a user sees.
fn display_form(name: &str, dtype: DType) -> Expr {
    match dtype {
        DType::Text => col(name),
        DType::DateTime => col(name).dt().strftime(DATETIME_DISPLAY_FORMAT),
        _ => col(name).cast(DataType::String),
    }
}

fn compare(lhs: Expr, op: FilterOp, rhs: Expr) -> Expr {
    match op {
        FilterOp::Eq => lhs.eq(rhs),
        FilterOp::Ne => lhs.neq(rhs),
        FilterOp::Gt => lhs.gt(rhs),
        FilterOp::Lt => lhs.lt(rhs),
        FilterOp::Ge => lhs.gt_eq(rhs),
        FilterOp::Le => lhs.lt_eq(rhs),
        FilterOp::Contains => lhs.str().contains_literal(rhs),
        FilterOp::NotContains => lhs.str().contains_literal(rhs).not(),
    }
}

/// Row predicate for `column op literal`, before missing cells are accounted for.
fn predicate(
    name: &str,
    dtype: DType,
    config: &FilterConfig,
    datetime_formats: &[String],
) -> Result<Expr> {
    let literal = config.value.trim();
    if matches!(config.op, FilterOp::Contains | FilterOp::NotContains) {
        // Substring tests always run on the literal as typed.
        return Ok(compare(display_form(name, dtype), config.op, lit(literal)));
    }

    let number = literal.parse::<f64>().ok();
    match dtype {
        DType::Integer | DType::Float => {
            if let Some(n) = number {
                return Ok(compare(col(name).cast(DataType::Float64), config.op, lit(n)));
            }
            if config.op.is_ordering() {
                return Err(EngineError::validation(format!(
                    "Column '{name}' is numeric, '{}' needs a numeric value but got '{literal}'",
                    config.op.as_str()
                )));
            }
        }
        DType::Text if number.is_some() && config.op.is_ordering() => {
            return Err(EngineError::validation(format!(
                "Column '{name}' holds text, '{}' cannot compare it with the number '{literal}'",
                config.op.as_str()
            )));
        }
        DType::DateTime => {
            if let Some(t) = parse_datetime(literal, datetime_formats) {
                let ms = datetime_to_millis(&t);
                return Ok(compare(col(name).cast(DataType::Int64), config.op, lit(ms)));
            }
        }
        _ => {}
    }
    Ok(compare(display_form(name, dtype), config.op, lit(literal)))
}

/// Keeps the rows whose `column` satisfies `op value`.
pub fn filter(
    df: &Dataset,
    config: &FilterConfig,
    datetime_formats: &[String],
) -> Result<(Dataset, OperationReport)> {
    if config.value.trim().is_empty() {
        return Err(EngineError::validation("Enter a value to filter by"));
    }
    let dtype = df.dtype(&config.column)?;
    // A missing cell neither equals nor contains anything.
    let missing_matches = matches!(config.op, FilterOp::Ne | FilterOp::NotContains);
    let keep = predicate(&config.column, dtype, config, datetime_formats)?
        .fill_null(lit(missing_matches));

    let out = df.query(|lf| lf.filter(keep))?;
    let mut report = OperationReport::new(OperationKind::Filter, df.n_rows(), out.n_rows());
    report.columns = out.n_cols();
    Ok((out, report))
}

/// Random subset of the rows, in random order.
pub fn sample(df: &Dataset, config: &SampleConfig) -> Result<(Dataset, OperationReport)> {
    let rows = df.n_rows();
    let amount = match config.size {
        SampleSize::Count(n) => {
            if n > rows {
                return Err(EngineError::validation(format!(
                    "Sample size {n} exceeds the {rows} available rows"
                )));
            }
            n
        }
        SampleSize::Fraction(f) => {
            if f.is_nan() || f <= 0.0 || f > 1.0 {
                return Err(EngineError::validation(format!(
                    "Sample fraction must be in (0, 1], got {f}"
                )));
            }
            ((rows as f64 * f).round() as usize).min(rows)
        }
    };

    let sampled = df
        .frame()
        .sample_n_literal(amount, false, true, Some(config.seed))?;
    let out = Dataset::new(sampled)?;
    let mut report = OperationReport::new(OperationKind::Sample, rows, out.n_rows());
    report.columns = out.n_cols();
    Ok((out, report))
}

/// Stable sort on one column; missing cells go last in either direction.
pub fn sort(df: &Dataset, config: &SortConfig) -> Result<(Dataset, OperationReport)> {
    df.require_column(&config.column)?;
    let options = SortMultipleOptions::default()
        .with_order_descending(config.descending)
        .with_nulls_last(true)
        .with_maintain_order(true);
    let out = Dataset::new(df.frame().sort([config.column.as_str()], options)?)?;
    let mut report = OperationReport::new(OperationKind::Sort, df.n_rows(), out.n_rows());
    report.columns = out.n_cols();
    Ok((out, report))
}
