use super::dataset::{DType, Value};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// OPERATION CONFIGURATION

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum MissingStrategy {
    /// Remove every row holding at least one missing cell
    Drop,
    Mean,
    Median,
    Mode,
    ForwardFill,
    BackwardFill,
}

impl MissingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Mode => "mode",
            Self::ForwardFill => "forward_fill",
            Self::BackwardFill => "backward_fill",
        }
    }
}

/// How per-column IQR bounds are combined.
#[derive(Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMode {
    /// Columns are filtered one after another; later columns see the rows that survived
    /// the earlier ones.
    #[default]
    Sequential,
    /// Bounds for every column are computed on the input rows and a row must lie within
    /// all of them.
    Simultaneous,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct OutlierConfig {
    /// Numeric columns to inspect; all numeric columns when `None`
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default = "default_iqr_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub mode: OutlierMode,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            columns: None,
            multiplier: default_iqr_multiplier(),
            mode: OutlierMode::Sequential,
        }
    }
}

fn default_iqr_multiplier() -> f64 {
    1.5
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct ColumnCast {
    pub column: String,
    pub target: DType,
}

impl ColumnCast {
    pub fn new(column: impl Into<String>, target: DType) -> Self {
        Self {
            column: column.into(),
            target,
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum AggFunc {
    Mean,
    Median,
    Sum,
    Count,
    Max,
    Min,
    Std,
    Var,
}

impl AggFunc {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Max => "max",
            Self::Min => "min",
            Self::Std => "std",
            Self::Var => "var",
        }
    }
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregations available in pivot tables.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum PivotAgg {
    Mean,
    Sum,
    Count,
    Max,
    Min,
}

impl From<PivotAgg> for AggFunc {
    fn from(agg: PivotAgg) -> Self {
        match agg {
            PivotAgg::Mean => Self::Mean,
            PivotAgg::Sum => Self::Sum,
            PivotAgg::Count => Self::Count,
            PivotAgg::Max => Self::Max,
            PivotAgg::Min => Self::Min,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct GroupAggregationConfig {
    pub group_column: String,
    pub value_column: String,
    pub function: AggFunc,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct PivotConfig {
    pub index: String,
    #[serde(default)]
    pub columns: Option<String>,
    pub values: String,
    pub function: PivotAgg,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct ClusterConfig {
    /// Numeric columns to cluster on; all numeric columns when `None`
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    pub clusters: usize,
    pub max_iter: usize,
    pub n_init: usize,
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        crate::config::EngineSettings::default().cluster_config()
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "not_contains")]
    NotContains,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
        }
    }

    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::Gt | Self::Lt | Self::Ge | Self::Le)
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct FilterConfig {
    pub column: String,
    pub op: FilterOp,
    /// Literal as typed by the user; parsed as a number where the operator allows
    pub value: String,
}

impl FilterConfig {
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum SampleSize {
    Count(usize),
    /// Fraction of the rows in `(0, 1]`
    Fraction(f64),
}

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Debug)]
pub struct SampleConfig {
    pub size: SampleSize,
    pub seed: u64,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct SortConfig {
    pub column: String,
    #[serde(default)]
    pub descending: bool,
}

// OPERATION REPORTS

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Load,
    Reset,
    Deduplicate,
    HandleMissing,
    RemoveOutliers,
    ConvertTypes,
    Normalize,
    Filter,
    Sample,
    Sort,
}

/// Change metrics of a committed mutating operation.
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct OperationReport {
    pub operation: OperationKind,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns: usize,
    /// Cells whose value changed (missing cells filled, values rescaled or recast)
    pub cells_changed: usize,
    pub warnings: Vec<String>,
}

impl OperationReport {
    pub fn new(operation: OperationKind, rows_before: usize, rows_after: usize) -> Self {
        Self {
            operation,
            rows_before,
            rows_after,
            columns: 0,
            cells_changed: 0,
            warnings: Vec::new(),
        }
    }

    pub fn rows_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }

    pub fn summary(&self) -> String {
        let mut msg = format!(
            "{:?}: {} → {} rows",
            self.operation, self.rows_before, self.rows_after
        );
        if self.cells_changed > 0 {
            msg.push_str(&format!(", {} cells changed", self.cells_changed));
        }
        if !self.warnings.is_empty() {
            msg.push_str(&format!(", {} warnings", self.warnings.len()));
        }
        msg
    }
}

// ANALYSIS RESULTS

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct ColumnMissing {
    pub column: String,
    pub missing: usize,
    pub percent: f64,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug, Default)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct CategoricalSummary {
    pub column: String,
    pub unique: usize,
    /// Unique values as a percentage of the non-missing values
    pub unique_percent: f64,
    pub top_values: Vec<(String, usize)>,
}

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum QualityGrade {
    Good,
    Fair,
    Poor,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct StatsReport {
    pub rows: usize,
    pub columns: usize,
    pub dtype_counts: BTreeMap<DType, usize>,
    pub missing: Vec<ColumnMissing>,
    pub numeric: Vec<NumericSummary>,
    pub categorical: Vec<CategoricalSummary>,
    /// Fraction of non-missing cells in `[0, 1]`
    pub completeness: f64,
    pub duplicate_rows: usize,
    pub quality: QualityGrade,
    pub recommendations: Vec<String>,
}

impl StatsReport {
    pub fn total_missing(&self) -> usize {
        self.missing.iter().map(|m| m.missing).sum()
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub data: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.data.get(i).and_then(|row| row.get(j)).copied()
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct ClusterResult {
    pub columns: Vec<String>,
    /// Indices (into the clustered dataset) of the complete rows that were clustered
    pub row_indices: Vec<usize>,
    /// Cluster label per clustered row, aligned with `row_indices`
    pub labels: Vec<usize>,
    /// Share of variance explained by the two principal components
    pub explained_variance: [f64; 2],
    /// Rows projected onto the two principal components
    pub projection: Vec<[f64; 2]>,
    /// Centroids in standardized space
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
}

impl ClusterResult {
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &label in &self.labels {
            if let Some(size) = sizes.get_mut(label) {
                *size += 1;
            }
        }
        sizes
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct GroupAggregationResult {
    pub group_column: String,
    pub value_column: String,
    pub function: AggFunc,
    /// Group keys in ascending order
    pub groups: Vec<Value>,
    /// Aggregate per group; `None` where the aggregate is undefined
    pub values: Vec<Option<f64>>,
}

impl GroupAggregationResult {
    pub fn get(&self, key: &Value) -> Option<f64> {
        self.groups
            .iter()
            .position(|g| g == key)
            .and_then(|i| self.values.get(i).copied().flatten())
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct PivotResult {
    pub row_index: Vec<Value>,
    /// Column keys; `None` when the pivot degraded to a grouped aggregation
    pub col_index: Option<Vec<Value>>,
    /// `row_index.len()` rows of `col_index.len()` (or 1) cells
    pub matrix: Vec<Vec<f64>>,
}

impl PivotResult {
    pub fn cell(&self, row: &Value, col: Option<&Value>) -> Option<f64> {
        let i = self.row_index.iter().position(|r| r == row)?;
        let j = match (&self.col_index, col) {
            (Some(cols), Some(col)) => cols.iter().position(|c| c == col)?,
            (None, None) => 0,
            _ => return None,
        };
        self.matrix.get(i).and_then(|r| r.get(j)).copied()
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct DataOverview {
    pub rows: usize,
    pub columns: usize,
    pub numeric_columns: usize,
    pub text_columns: usize,
    pub missing_cells: usize,
    /// Rough in-memory footprint of the cell values
    pub approx_bytes: usize,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct GroupDistribution {
    pub group: Value,
    pub summary: NumericSummary,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct GroupComparison {
    pub group_column: String,
    pub value_column: String,
    pub groups: Vec<GroupDistribution>,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct TimeSeries {
    pub time_column: String,
    pub value_column: String,
    pub points: Vec<(NaiveDateTime, f64)>,
    /// Rows skipped because the time or the value was missing or unparseable
    pub skipped: usize,
}
