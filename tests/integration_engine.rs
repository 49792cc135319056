//! Integration tests for full engine workflows
//!
//! These tests load the fixture files under `testdata/`, drive the engine and the
//! pipeline runner end to end, and verify the results.

#![expect(clippy::unwrap_used, clippy::indexing_slicing)]

use datainsight::config::EngineSettings;
use datainsight::engine::{
    AggFunc, DType, Engine, FilterConfig, FilterOp, GroupAggregationConfig, MissingStrategy,
    QualityGrade, Value,
};
use datainsight::error::ErrorKind;
use datainsight::io;
use datainsight::pipeline::{PipelineSpec, run_pipeline_file};
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(name)
}

fn sales_engine() -> Engine {
    let mut engine = Engine::new();
    engine.load(io::read_csv(fixture("sales.csv")).unwrap()).unwrap();
    engine
}

#[test]
fn test_load_infers_types_and_describes() {
    let engine = sales_engine();
    let df = engine.current().unwrap();
    assert_eq!(df.shape(), (12, 4));

    assert_eq!(df.dtypes(), [DType::Text, DType::Text, DType::Integer, DType::Float]);

    let stats = engine.describe().unwrap();
    assert_eq!(stats.rows, 12);
    assert_eq!(stats.duplicate_rows, 1);
    assert_eq!(stats.total_missing(), 2);
    assert_eq!(stats.quality, QualityGrade::Good);
}

#[test]
fn test_pipeline_file_cleans_and_saves() {
    let tmp = tempfile::tempdir().unwrap();
    let output = tmp.path().join("cleaned.csv");
    let spec = PipelineSpec::from_file(fixture("clean_sales.json")).unwrap();

    let report =
        run_pipeline_file(&spec, EngineSettings::default(), fixture("sales.csv"), &output)
            .unwrap();
    assert_eq!(report.rows_before, 12);
    assert_eq!(report.steps_applied, 4);
    // 1 duplicate, 2 rows with gaps, 1 unit outlier
    assert_eq!(report.rows_after, 8);

    let saved = io::read_csv(&output).unwrap();
    assert_eq!(saved.n_rows(), 8);
    assert_eq!(saved.dtype("units").unwrap(), DType::Integer);
    assert_eq!(saved.value("units", 0).unwrap(), Some(Value::Int(13)));
    assert_eq!(saved.missing_count(), 0);
}

#[test]
fn test_interactive_session_then_reset() {
    let mut engine = sales_engine();
    engine.deduplicate().unwrap();
    engine.handle_missing(MissingStrategy::Drop).unwrap();
    let removed = engine.remove_outliers_default().unwrap();
    assert_eq!(removed.rows_removed(), 1);

    let by_region = engine
        .group_aggregate(&GroupAggregationConfig {
            group_column: "region".into(),
            value_column: "units".into(),
            function: AggFunc::Mean,
        })
        .unwrap();
    assert_eq!(by_region.get(&Value::Text("North".into())), Some(9.0));
    assert_eq!(by_region.get(&Value::Text("East".into())), Some(10.0));
    assert_eq!(by_region.get(&Value::Text("South".into())), Some(12.5));

    engine
        .filter(&FilterConfig::new("region", FilterOp::Eq, "North"))
        .unwrap();
    assert_eq!(engine.current().unwrap().n_rows(), 3);

    // Too few complete rows left to cluster.
    let err = engine.cluster_default().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    engine.reset().unwrap();
    assert_eq!(engine.current().unwrap(), engine.original().unwrap());
    assert_eq!(engine.current().unwrap().n_rows(), 12);
}

#[test]
fn test_time_series_from_text_dates() {
    let engine = sales_engine();
    let series = engine.time_series("date", "units").unwrap();
    assert_eq!(series.skipped, 1);
    assert_eq!(series.points.len(), 11);
    assert!(series.points.windows(2).all(|w| w[0].0 <= w[1].0));
    assert_eq!(
        series.points.first().map(|p| p.0.date().to_string()),
        Some("2024-01-01".to_owned())
    );
}

#[test]
fn test_failed_operation_keeps_state() {
    let mut engine = sales_engine();
    engine.deduplicate().unwrap();
    let before = engine.current().unwrap().clone();

    let err = engine
        .filter(&FilterConfig::new("units", FilterOp::Gt, "lots"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(engine.current().unwrap(), &before);
}
