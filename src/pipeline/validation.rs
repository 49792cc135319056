//! Pipeline specification validation.
//!
//! Checks a pipeline spec against the dataset it will run on before any step executes,
//! so column typos surface as one list of actionable messages.

use super::spec::{PipelineSpec, SPEC_VERSION, Step};
use crate::engine::Dataset;
use crate::engine::types::SampleSize;
use std::collections::HashSet;

/// Problem found in a pipeline spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecIssue {
    pub step_index: Option<usize>,
    pub message: String,
}

impl SpecIssue {
    fn new(step_index: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            step_index,
            message: message.into(),
        }
    }

    fn step(step_index: usize, message: impl Into<String>) -> Self {
        Self::new(Some(step_index), message)
    }

    fn schema(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }
}

impl std::fmt::Display for SpecIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(idx) = self.step_index {
            write!(f, "Step {}: {}", idx + 1, self.message)
        } else {
            write!(f, "Schema: {}", self.message)
        }
    }
}

/// Validate a pipeline spec against the dataset it is about to transform
pub fn validate_pipeline(spec: &PipelineSpec, input: &Dataset) -> Vec<SpecIssue> {
    let mut issues = Vec::new();

    if spec.version != SPEC_VERSION {
        issues.push(SpecIssue::schema(format!(
            "Unsupported spec version '{}', expected '{SPEC_VERSION}'",
            spec.version
        )));
    }

    let columns: HashSet<&str> = input.column_names().into_iter().collect();
    validate_schema_requirements(spec, &columns, &mut issues);

    // Engine operations never add, drop or rename columns, so every step sees the
    // input's column set.
    for (idx, step) in spec.steps.iter().enumerate() {
        validate_step(step, idx, &columns, &mut issues);
    }

    issues
}

fn validate_schema_requirements(
    spec: &PipelineSpec,
    columns: &HashSet<&str>,
    issues: &mut Vec<SpecIssue>,
) {
    for required in &spec.required_columns {
        if !columns.contains(required.as_str()) {
            issues.push(SpecIssue::schema(format!(
                "Required column '{required}' not found in input"
            )));
        }
    }

    if spec.strict_columns {
        let required: HashSet<&str> = spec.required_columns.iter().map(String::as_str).collect();
        let mut extra: Vec<&str> = columns.difference(&required).copied().collect();
        if !extra.is_empty() {
            extra.sort_unstable();
            issues.push(SpecIssue::schema(format!(
                "Strict mode: unexpected columns found: {extra:?}"
            )));
        }
    }
}

fn validate_step(step: &Step, idx: usize, columns: &HashSet<&str>, issues: &mut Vec<SpecIssue>) {
    for column in step.referenced_columns() {
        if !columns.contains(column) {
            issues.push(SpecIssue::step(
                idx,
                format!("{} references unknown column '{column}'", step.name()),
            ));
        }
    }

    match step {
        Step::ConvertTypes { casts } if casts.is_empty() => {
            issues.push(SpecIssue::step(idx, "convert_types has no casts"));
        }
        Step::RemoveOutliers {
            multiplier: Some(k),
            ..
        } if !(k.is_finite() && *k >= 0.0) => {
            issues.push(SpecIssue::step(
                idx,
                format!("IQR multiplier must be a non-negative number, got {k}"),
            ));
        }
        Step::Sample {
            size: SampleSize::Fraction(f),
            ..
        } if f.is_nan() || *f <= 0.0 || *f > 1.0 => {
            issues.push(SpecIssue::step(
                idx,
                format!("Sample fraction must be in (0, 1], got {f}"),
            ));
        }
        Step::Filter { value, .. } if value.trim().is_empty() => {
            issues.push(SpecIssue::step(idx, "filter value is empty"));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{FilterOp, SampleSize};
    use polars::prelude::df;

    fn input() -> Dataset {
        let df = df! {
            "id" => [1i64, 2],
            "name" => ["a", "b"],
        }
        .expect("valid frame");
        Dataset::new(df).expect("valid dataset")
    }

    #[test]
    fn test_valid_spec_has_no_issues() {
        let spec = PipelineSpec::new("ok")
            .with_step(Step::Deduplicate)
            .with_step(Step::Sort {
                column: "id".into(),
                descending: false,
            });
        assert!(validate_pipeline(&spec, &input()).is_empty());
    }

    #[test]
    fn test_reports_every_problem() {
        let mut spec = PipelineSpec::new("bad")
            .with_step(Step::Filter {
                column: "age".into(),
                operator: FilterOp::Gt,
                value: " ".into(),
            })
            .with_step(Step::Sample {
                size: SampleSize::Fraction(2.0),
                seed: None,
            });
        spec.version = "9".into();
        spec.required_columns = vec!["id".into(), "email".into()];
        spec.strict_columns = true;

        let issues = validate_pipeline(&spec, &input());
        let messages: Vec<String> = issues.iter().map(ToString::to_string).collect();
        assert_eq!(issues.len(), 6, "{messages:?}");
        assert!(messages.contains(&"Step 1: filter references unknown column 'age'".to_owned()));
        assert!(messages.contains(&"Schema: Required column 'email' not found in input".to_owned()));
        assert!(messages.iter().any(|m| m.starts_with("Step 2: Sample fraction")));
    }
}
