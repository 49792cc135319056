//! Pipeline specification data structures.
//!
//! A pipeline is an ordered list of mutating engine operations stored as JSON, so a
//! cleaning session can be replayed on new data.

use crate::engine::Engine;
use crate::engine::types::{
    ColumnCast, FilterConfig, FilterOp, MissingStrategy, OperationReport, OutlierConfig,
    OutlierMode, SampleConfig, SampleSize, SortConfig,
};
use crate::error::Result as EngineResult;
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current pipeline spec version
pub const SPEC_VERSION: &str = "0.1";

/// Root pipeline specification structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSpec {
    /// Specification version for future migrations
    pub version: String,

    /// Human-readable pipeline name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Columns the input must provide
    #[serde(default)]
    pub required_columns: Vec<String>,

    /// When set, the input may not carry columns beyond `required_columns`
    #[serde(default)]
    pub strict_columns: bool,

    /// Ordered sequence of operations
    pub steps: Vec<Step>,
}

impl PipelineSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: SPEC_VERSION.to_owned(),
            name: name.into(),
            description: None,
            required_columns: Vec::new(),
            strict_columns: false,
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Load a pipeline spec from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline spec file {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse pipeline spec JSON")
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path.as_ref(), json).context("Failed to write pipeline spec file")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize pipeline spec")
    }
}

/// One mutating engine operation (tagged enum)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Drop every row that repeats an earlier one
    Deduplicate,

    HandleMissing { strategy: MissingStrategy },

    /// IQR outlier rejection; unset fields take the engine settings
    RemoveOutliers {
        #[serde(default)]
        columns: Option<Vec<String>>,
        #[serde(default)]
        multiplier: Option<f64>,
        #[serde(default)]
        mode: Option<OutlierMode>,
    },

    ConvertTypes { casts: Vec<ColumnCast> },

    /// Z-score every numeric column
    Normalize,

    /// `operator` is one of `==`, `!=`, `>`, `<`, `>=`, `<=`, `contains`, `not_contains`
    Filter {
        column: String,
        operator: FilterOp,
        value: String,
    },

    /// Random sample; the engine seed is used when `seed` is unset
    Sample {
        size: SampleSize,
        #[serde(default)]
        seed: Option<u64>,
    },

    Sort {
        column: String,
        #[serde(default)]
        descending: bool,
    },

    /// Return to the dataset as loaded
    Reset,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deduplicate => "deduplicate",
            Self::HandleMissing { .. } => "handle_missing",
            Self::RemoveOutliers { .. } => "remove_outliers",
            Self::ConvertTypes { .. } => "convert_types",
            Self::Normalize => "normalize",
            Self::Filter { .. } => "filter",
            Self::Sample { .. } => "sample",
            Self::Sort { .. } => "sort",
            Self::Reset => "reset",
        }
    }

    /// Columns the step refers to by name.
    pub fn referenced_columns(&self) -> Vec<&str> {
        match self {
            Self::RemoveOutliers {
                columns: Some(columns),
                ..
            } => columns.iter().map(String::as_str).collect(),
            Self::ConvertTypes { casts } => casts.iter().map(|c| c.column.as_str()).collect(),
            Self::Filter { column, .. } | Self::Sort { column, .. } => vec![column.as_str()],
            _ => Vec::new(),
        }
    }

    /// Runs the step against `engine`, committing on success.
    pub fn apply(&self, engine: &mut Engine) -> EngineResult<OperationReport> {
        match self {
            Self::Deduplicate => engine.deduplicate(),
            Self::HandleMissing { strategy } => engine.handle_missing(*strategy),
            Self::RemoveOutliers {
                columns,
                multiplier,
                mode,
            } => {
                let defaults = engine.settings().outlier_config();
                let config = OutlierConfig {
                    columns: columns.clone(),
                    multiplier: multiplier.unwrap_or(defaults.multiplier),
                    mode: mode.unwrap_or(defaults.mode),
                };
                engine.remove_outliers(&config)
            }
            Self::ConvertTypes { casts } => engine.convert_types(casts),
            Self::Normalize => engine.normalize(),
            Self::Filter {
                column,
                operator,
                value,
            } => engine.filter(&FilterConfig::new(column.clone(), *operator, value.clone())),
            Self::Sample { size, seed } => {
                let config = SampleConfig {
                    size: *size,
                    seed: seed.unwrap_or(engine.settings().random_seed),
                };
                engine.sample(&config)
            }
            Self::Sort { column, descending } => engine.sort(&SortConfig {
                column: column.clone(),
                descending: *descending,
            }),
            Self::Reset => engine.reset(),
        }
    }
}
