use super::{loaded, people};
use crate::engine::analysis;
use crate::engine::*;
use crate::error::ErrorKind;
use anyhow::Result;
use chrono::NaiveDate;
use polars::prelude::df;

fn groups() -> Dataset {
    let df = df! {
        "g" => ["A", "A", "B", "B", "B"],
        "v" => [10i64, 20, 30, 40, 50],
    }
    .expect("valid frame");
    Dataset::new(df).expect("valid dataset")
}

fn agg(group_column: &str, value_column: &str, function: AggFunc) -> GroupAggregationConfig {
    GroupAggregationConfig {
        group_column: group_column.into(),
        value_column: value_column.into(),
        function,
    }
}

fn text(s: &str) -> Value {
    Value::Text(s.to_owned())
}

fn assert_all_close(actual: &[Option<f64>], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        let a = a.expect("value present");
        assert!((a - e).abs() < 1e-9, "{a} != {e}");
    }
}

#[test]
fn test_describe_reports_shape_and_quality() -> Result<()> {
    let report = analysis::describe(&people())?;
    assert_eq!(report.rows, 5);
    assert_eq!(report.columns, 3);
    assert_eq!(report.dtype_counts.get(&DType::Text), Some(&1));
    assert_eq!(report.dtype_counts.get(&DType::Integer), Some(&1));
    assert_eq!(report.total_missing(), 2);
    assert_eq!(report.duplicate_rows, 1);
    // 13 of 15 cells present
    assert!((report.completeness - 13.0 / 15.0).abs() < 1e-12);
    assert_eq!(report.quality, QualityGrade::Fair);
    assert_eq!(report.recommendations.len(), 3);

    let age = &report.numeric[0];
    assert_eq!(age.column, "age");
    assert_eq!(age.count, 4);
    assert_eq!(age.mean, Some(31.25));
    assert_eq!(age.min, Some(25.0));
    assert_eq!(age.max, Some(40.0));
    assert_eq!(age.median, Some(30.0));

    let missing_age = &report.missing[1];
    assert_eq!(missing_age.missing, 1);
    assert!((missing_age.percent - 20.0).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_describe_top_values() -> Result<()> {
    let df = Dataset::new(df! {
        "c" => [Some("x"), Some("y"), Some("z"), Some("y"), Some("w"), Some("x"), None],
    }?)?;
    let report = analysis::describe(&df)?;
    let summary = &report.categorical[0];
    assert_eq!(summary.unique, 4);
    assert_eq!(
        summary.top_values,
        vec![("x".to_owned(), 2), ("y".to_owned(), 2), ("z".to_owned(), 1)]
    );
    Ok(())
}

#[test]
fn test_describe_complete_data_is_good() -> Result<()> {
    let report = analysis::describe(&groups())?;
    assert_eq!(report.quality, QualityGrade::Good);
    assert_eq!(report.recommendations, ["Data quality is good."]);
    Ok(())
}

#[test]
fn test_correlation_is_symmetric_with_unit_diagonal() -> Result<()> {
    let df = Dataset::new(df! {
        "x" => [1.0, 2.0, 3.0, 4.0, 5.0],
        "y" => [2.0, 4.1, 5.9, 8.2, 9.9],
        "z" => [5i64, 3, 4, 1, 2],
        "s" => ["a", "b", "c", "d", "e"],
    }?)?;
    let m = analysis::correlation_matrix(&df)?;
    assert_eq!(m.columns, ["x", "y", "z"]);
    for i in 0..3 {
        assert_eq!(m.data[i][i], 1.0);
        for j in 0..3 {
            assert_eq!(m.data[i][j], m.data[j][i]);
            assert!(m.data[i][j].abs() <= 1.0);
        }
    }
    assert!(m.get("x", "y").unwrap() > 0.99);
    assert!(m.get("x", "z").unwrap() < 0.0);
    Ok(())
}

#[test]
fn test_correlation_uses_pairwise_complete_rows() -> Result<()> {
    let df = Dataset::new(df! {
        "a" => [Some(1.0), Some(2.0), Some(3.0), None],
        "b" => [2.0, 4.0, 6.0, 100.0],
    }?)?;
    let m = analysis::correlation_matrix(&df)?;
    assert!((m.get("a", "b").unwrap() - 1.0).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_correlation_errors() -> Result<()> {
    let one = Dataset::new(df! { "a" => [1i64, 2, 3] }?)?;
    assert_eq!(
        analysis::correlation_matrix(&one).unwrap_err().kind(),
        ErrorKind::Validation
    );

    let constant = Dataset::new(df! {
        "a" => [1i64, 2, 3],
        "b" => [7i64, 7, 7],
    }?)?;
    assert_eq!(
        analysis::correlation_matrix(&constant).unwrap_err().kind(),
        ErrorKind::Computation
    );
    Ok(())
}

#[test]
fn test_group_mean() -> Result<()> {
    let result = analysis::group_aggregate(&groups(), &agg("g", "v", AggFunc::Mean))?;
    assert_eq!(result.groups, vec![text("A"), text("B")]);
    assert_eq!(result.get(&text("A")), Some(15.0));
    assert_eq!(result.get(&text("B")), Some(40.0));
    Ok(())
}

#[test]
fn test_group_functions() -> Result<()> {
    let df = groups();
    let run = |f| analysis::group_aggregate(&df, &agg("g", "v", f)).map(|r| r.values);
    assert_eq!(run(AggFunc::Sum)?, vec![Some(30.0), Some(120.0)]);
    assert_eq!(run(AggFunc::Median)?, vec![Some(15.0), Some(40.0)]);
    assert_eq!(run(AggFunc::Min)?, vec![Some(10.0), Some(30.0)]);
    assert_eq!(run(AggFunc::Max)?, vec![Some(20.0), Some(50.0)]);
    assert_all_close(&run(AggFunc::Var)?, &[50.0, 100.0]);
    assert_all_close(&run(AggFunc::Std)?, &[50.0_f64.sqrt(), 10.0]);
    Ok(())
}

#[test]
fn test_group_count_sums_to_rows() -> Result<()> {
    let df = Dataset::new(df! {
        "k" => ["b", "a", "b", "c", "a", "b"],
        "v" => [Some(1.0), None, Some(2.0), None, Some(3.0), Some(4.0)],
    }?)?;
    let result = analysis::group_aggregate(&df, &agg("k", "v", AggFunc::Count))?;
    assert_eq!(result.groups, vec![text("a"), text("b"), text("c")]);
    let total: f64 = result.values.iter().flatten().sum();
    assert_eq!(total, df.n_rows() as f64);

    let mean = analysis::group_aggregate(&df, &agg("k", "v", AggFunc::Mean))?;
    assert_eq!(mean.get(&text("c")), None);
    Ok(())
}

#[test]
fn test_group_drops_missing_keys_and_sorts_numbers() -> Result<()> {
    let df = Dataset::new(df! {
        "k" => [Some(3i64), None, Some(1), Some(3)],
        "v" => [1.0, 2.0, 3.0, 4.0],
    }?)?;
    let result = analysis::group_aggregate(&df, &agg("k", "v", AggFunc::Std))?;
    assert_eq!(result.groups, vec![Value::Int(1), Value::Int(3)]);
    // A single value has no sample deviation.
    assert_eq!(result.values[0], None);
    Ok(())
}

#[test]
fn test_group_validation() {
    let df = groups();
    for config in [
        agg("", "v", AggFunc::Mean),
        agg("g", "", AggFunc::Mean),
        agg("nope", "v", AggFunc::Mean),
        agg("v", "g", AggFunc::Sum),
    ] {
        let err = analysis::group_aggregate(&df, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    // Count works on any column type.
    assert!(analysis::group_aggregate(&df, &agg("v", "g", AggFunc::Count)).is_ok());
}

fn sales() -> Dataset {
    let df = df! {
        "region" => ["north", "south", "north", "south", "north"],
        "product" => ["tea", "tea", "coffee", "tea", "tea"],
        "amount" => [Some(10.0), Some(5.0), Some(7.0), Some(3.0), None],
    }
    .expect("valid frame");
    Dataset::new(df).expect("valid dataset")
}

#[test]
fn test_pivot_fills_missing_combinations_with_zero() -> Result<()> {
    let config = PivotConfig {
        index: "region".into(),
        columns: Some("product".into()),
        values: "amount".into(),
        function: PivotAgg::Sum,
    };
    let pivot = analysis::pivot_table(&sales(), &config)?;
    assert_eq!(pivot.row_index, vec![text("north"), text("south")]);
    assert_eq!(pivot.col_index, Some(vec![text("coffee"), text("tea")]));
    assert_eq!(pivot.matrix, vec![vec![7.0, 10.0], vec![0.0, 8.0]]);
    assert_eq!(pivot.cell(&text("south"), Some(&text("coffee"))), Some(0.0));
    Ok(())
}

#[test]
fn test_pivot_count_ignores_missing_values() -> Result<()> {
    let config = PivotConfig {
        index: "region".into(),
        columns: Some("product".into()),
        values: "amount".into(),
        function: PivotAgg::Count,
    };
    let pivot = analysis::pivot_table(&sales(), &config)?;
    assert_eq!(pivot.cell(&text("north"), Some(&text("tea"))), Some(1.0));
    assert_eq!(pivot.cell(&text("south"), Some(&text("tea"))), Some(2.0));
    Ok(())
}

#[test]
fn test_pivot_without_columns_is_grouped_aggregation() -> Result<()> {
    let config = PivotConfig {
        index: "region".into(),
        columns: None,
        values: "amount".into(),
        function: PivotAgg::Mean,
    };
    let pivot = analysis::pivot_table(&sales(), &config)?;
    assert_eq!(pivot.col_index, None);
    assert_eq!(pivot.matrix, vec![vec![8.5], vec![4.0]]);
    assert_eq!(pivot.cell(&text("north"), None), Some(8.5));
    Ok(())
}

#[test]
fn test_pivot_requires_numeric_values() {
    let config = PivotConfig {
        index: "region".into(),
        columns: None,
        values: "product".into(),
        function: PivotAgg::Sum,
    };
    let err = analysis::pivot_table(&sales(), &config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_overview() {
    let overview = analysis::overview(&people());
    assert_eq!(overview.rows, 5);
    assert_eq!(overview.columns, 3);
    assert_eq!(overview.numeric_columns, 2);
    assert_eq!(overview.text_columns, 1);
    assert_eq!(overview.missing_cells, 2);
    assert!(overview.approx_bytes > 0);
}

#[test]
fn test_group_comparison_summaries() -> Result<()> {
    let engine = loaded(groups());
    let comparison = engine.group_comparison("g", "v")?;
    assert_eq!(comparison.groups.len(), 2);
    let b = &comparison.groups[1];
    assert_eq!(b.group, text("B"));
    assert_eq!(b.summary.count, 3);
    assert_eq!(b.summary.median, Some(40.0));
    assert_eq!(b.summary.q1, Some(35.0));
    Ok(())
}

#[test]
fn test_time_series_parses_and_sorts() -> Result<()> {
    let df = Dataset::new(df! {
        "day" => ["2024-01-03", "2024-01-01", "garbage", "2024-01-02"],
        "v" => [Some(3.0), Some(1.0), Some(9.0), None],
    }?)?;
    let series = analysis::time_series(&df, "day", "v", &[])?;
    assert_eq!(series.skipped, 2);
    let first = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    assert_eq!(series.points.first(), Some(&(first, 1.0)));
    assert_eq!(series.points.len(), 2);

    let err = analysis::time_series(&df, "v", "v", &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    Ok(())
}

#[test]
fn test_pivot_rejects_same_index_and_columns() {
    let config = PivotConfig {
        index: "region".into(),
        columns: Some("region".into()),
        values: "amount".into(),
        function: PivotAgg::Sum,
    };
    let err = analysis::pivot_table(&sales(), &config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
