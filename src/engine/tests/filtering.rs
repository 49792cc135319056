use super::{loaded, people};
use crate::engine::filtering;
use crate::engine::*;
use crate::error::ErrorKind;
use anyhow::Result;
use polars::prelude::df;

fn ages() -> Dataset {
    let df = df! {
        "name" => ["a", "b", "c", "d"],
        "age" => [25i64, 30, 35, 40],
    }
    .expect("valid frame");
    Dataset::new(df).expect("valid dataset")
}

fn run(df: &Dataset, column: &str, op: FilterOp, value: &str) -> crate::error::Result<Dataset> {
    filtering::filter(df, &FilterConfig::new(column, op, value), &[]).map(|(out, _)| out)
}

fn ints(df: &Dataset, column: &str) -> Vec<f64> {
    df.f64_values(column)
        .expect("column exists")
        .into_iter()
        .flatten()
        .collect()
}

#[test]
fn test_filter_greater_than() -> Result<()> {
    let mut engine = loaded(ages());
    let report = engine.filter(&FilterConfig::new("age", FilterOp::Gt, "30"))?;
    assert_eq!(report.rows_after, 2);
    assert_eq!(report.rows_removed(), 2);
    assert_eq!(ints(engine.current()?, "age"), [35.0, 40.0]);
    Ok(())
}

#[test]
fn test_filter_numeric_operators() -> Result<()> {
    let df = ages();
    assert_eq!(ints(&run(&df, "age", FilterOp::Ge, "30")?, "age"), [30.0, 35.0, 40.0]);
    assert_eq!(ints(&run(&df, "age", FilterOp::Lt, "30.5")?, "age"), [25.0, 30.0]);
    assert_eq!(ints(&run(&df, "age", FilterOp::Le, "25")?, "age"), [25.0]);
    assert_eq!(ints(&run(&df, "age", FilterOp::Eq, "35.0")?, "age"), [35.0]);
    assert_eq!(ints(&run(&df, "age", FilterOp::Ne, "35")?, "age"), [25.0, 30.0, 40.0]);
    Ok(())
}

#[test]
fn test_filter_text_comparisons() -> Result<()> {
    let df = ages();
    assert_eq!(run(&df, "name", FilterOp::Eq, "b")?.n_rows(), 1);
    assert_eq!(run(&df, "name", FilterOp::Gt, "b")?.n_rows(), 2);
    Ok(())
}

#[test]
fn test_filter_text_column_rejects_numeric_ordering() -> Result<()> {
    let df = Dataset::new(df! { "code" => ["10", "9", "100"] }?)?;
    for op in [FilterOp::Gt, FilterOp::Lt, FilterOp::Ge, FilterOp::Le] {
        let err = run(&df, "code", op, "50").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("holds text"), "got: {err}");
    }
    // Equality still compares the text as typed.
    assert_eq!(run(&df, "code", FilterOp::Eq, "9")?.n_rows(), 1);
    assert_eq!(run(&df, "code", FilterOp::Contains, "10")?.n_rows(), 2);
    Ok(())
}

#[test]
fn test_filter_contains_uses_display_form() -> Result<()> {
    let df = ages();
    assert_eq!(ints(&run(&df, "age", FilterOp::Contains, "0")?, "age"), [30.0, 40.0]);
    assert_eq!(ints(&run(&df, "age", FilterOp::NotContains, "0")?, "age"), [25.0, 35.0]);
    Ok(())
}

#[test]
fn test_filter_missing_cells() -> Result<()> {
    // Row 2 has no age.
    let df = people();
    assert_eq!(run(&df, "age", FilterOp::Eq, "30")?.n_rows(), 2);
    assert_eq!(run(&df, "age", FilterOp::Ne, "30")?.n_rows(), 3);
    assert_eq!(run(&df, "age", FilterOp::Gt, "0")?.n_rows(), 4);
    assert_eq!(run(&df, "age", FilterOp::Contains, "3")?.n_rows(), 2);
    assert_eq!(run(&df, "age", FilterOp::NotContains, "3")?.n_rows(), 3);
    Ok(())
}

#[test]
fn test_filter_empty_literal_rejected() {
    let err = run(&ages(), "age", FilterOp::Contains, "  ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_filter_validation() {
    let df = ages();
    let err = run(&df, "age", FilterOp::Gt, "thirty").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = run(&df, "height", FilterOp::Eq, "1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    // Equality against a non-numeric literal compares display forms instead.
    assert_eq!(run(&df, "age", FilterOp::Eq, "thirty").map(|d| d.n_rows()).ok(), Some(0));
}

#[test]
fn test_filter_datetimes_chronologically() -> Result<()> {
    let df = Dataset::new(df! {
        "when" => ["2024-05-01", "2023-12-31", "2024-01-15 12:00:00"],
    }?)?;
    let mut engine = loaded(df);
    engine.convert_types(&[ColumnCast::new("when", DType::DateTime)])?;
    engine.filter(&FilterConfig::new("when", FilterOp::Ge, "2024-01-01"))?;
    assert_eq!(engine.current()?.n_rows(), 2);
    engine.filter(&FilterConfig::new("when", FilterOp::Contains, "12:00"))?;
    assert_eq!(engine.current()?.n_rows(), 1);
    Ok(())
}

#[test]
fn test_sample_count_is_permutation() -> Result<()> {
    let df = ages();
    let config = SampleConfig {
        size: SampleSize::Count(df.n_rows()),
        seed: 7,
    };
    let (out, report) = filtering::sample(&df, &config)?;
    assert_eq!(report.rows_after, 4);
    let mut sampled = ints(&out, "age");
    sampled.sort_by(f64::total_cmp);
    assert_eq!(sampled, ints(&df, "age"));
    Ok(())
}

#[test]
fn test_sample_fraction_and_seed() -> Result<()> {
    let df = Dataset::new(df! { "x" => (0..100i64).collect::<Vec<_>>() }?)?;
    let config = SampleConfig {
        size: SampleSize::Fraction(0.25),
        seed: 42,
    };
    let (a, _) = filtering::sample(&df, &config)?;
    let (b, _) = filtering::sample(&df, &config)?;
    assert_eq!(a.n_rows(), 25);
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn test_sample_validation() {
    let df = ages();
    for size in [
        SampleSize::Count(5),
        SampleSize::Fraction(0.0),
        SampleSize::Fraction(1.5),
        SampleSize::Fraction(f64::NAN),
    ] {
        let err = filtering::sample(&df, &SampleConfig { size, seed: 1 }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

#[test]
fn test_sort_missing_last_both_directions() -> Result<()> {
    let df = people();
    let asc = SortConfig {
        column: "age".into(),
        descending: false,
    };
    let (out, _) = filtering::sort(&df, &asc)?;
    let ages = out.f64_values("age")?;
    assert_eq!(ages, [Some(25.0), Some(30.0), Some(30.0), Some(40.0), None]);

    let desc = SortConfig {
        column: "age".into(),
        descending: true,
    };
    let (out, _) = filtering::sort(&df, &desc)?;
    let ages = out.f64_values("age")?;
    assert_eq!(ages, [Some(40.0), Some(30.0), Some(30.0), Some(25.0), None]);
    Ok(())
}

#[test]
fn test_sort_is_stable() -> Result<()> {
    let df = Dataset::new(df! {
        "k" => ["b", "a", "b", "a"],
        "order" => [0i64, 1, 2, 3],
    }?)?;
    let config = SortConfig {
        column: "k".into(),
        descending: true,
    };
    let (out, _) = filtering::sort(&df, &config)?;
    assert_eq!(ints(&out, "order"), [0.0, 2.0, 1.0, 3.0]);
    Ok(())
}
