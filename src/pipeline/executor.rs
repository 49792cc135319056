//! Pipeline execution.
//!
//! Applies the steps of a spec to an [`Engine`] in order and reports what each one did.
//! Execution stops at the first failing step; the engine keeps the dataset produced by
//! the last step that succeeded.

use super::spec::PipelineSpec;
use super::validation::validate_pipeline;
use crate::config::EngineSettings;
use crate::engine::Engine;
use crate::engine::types::OperationReport;
use crate::io;
use anyhow::{Context as _, Result};
use std::path::Path;
use std::time::{Duration, Instant};

/// Report generated after pipeline execution
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Number of rows before processing
    pub rows_before: usize,

    /// Number of rows after processing
    pub rows_after: usize,

    /// Number of steps successfully applied
    pub steps_applied: usize,

    /// Per-step change reports, in execution order
    pub reports: Vec<OperationReport>,

    /// Time taken for execution
    pub duration: Duration,
}

impl RunReport {
    /// Warnings raised by any step
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.reports
            .iter()
            .flat_map(|r| r.warnings.iter().map(String::as_str))
    }

    pub fn summary(&self) -> String {
        format!(
            "Pipeline completed: rows {} ({} → {}), {} steps, {:.2}s",
            if self.rows_after > self.rows_before {
                "added"
            } else if self.rows_after < self.rows_before {
                "removed"
            } else {
                "unchanged"
            },
            self.rows_before,
            self.rows_after,
            self.steps_applied,
            self.duration.as_secs_f64()
        )
    }
}

/// Execute a pipeline spec on the engine's current dataset
pub fn run_pipeline(engine: &mut Engine, spec: &PipelineSpec) -> Result<RunReport> {
    let start = Instant::now();
    let input = engine.current().context("Pipeline needs a loaded dataset")?;
    let rows_before = input.n_rows();

    let issues = validate_pipeline(spec, input);
    if !issues.is_empty() {
        return Err(anyhow::anyhow!(
            "Pipeline validation failed:\n{}",
            issues
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        ));
    }

    tracing::info!(
        "Running pipeline '{}' ({} steps) on {rows_before} rows",
        spec.name,
        spec.steps.len()
    );

    let mut reports = Vec::with_capacity(spec.steps.len());
    for (idx, step) in spec.steps.iter().enumerate() {
        let report = step
            .apply(engine)
            .with_context(|| format!("Step {} ({}) failed", idx + 1, step.name()))?;
        reports.push(report);
    }

    let report = RunReport {
        rows_before,
        rows_after: engine.current()?.n_rows(),
        steps_applied: reports.len(),
        reports,
        duration: start.elapsed(),
    };
    tracing::info!("{}", report.summary());
    Ok(report)
}

/// Load a CSV, run the pipeline on it and write the result as CSV.
pub fn run_pipeline_file(
    spec: &PipelineSpec,
    settings: EngineSettings,
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> Result<RunReport> {
    let input_path = input_path.as_ref();
    let output_path = output_path.as_ref();

    let dataset = io::read_csv(input_path)
        .with_context(|| format!("Failed to load input file {}", input_path.display()))?;
    let mut engine = Engine::with_settings(settings);
    engine.load(dataset)?;

    let report = run_pipeline(&mut engine, spec)?;

    io::write_csv(engine.current()?, output_path)
        .with_context(|| format!("Failed to write output file {}", output_path.display()))?;
    Ok(report)
}
