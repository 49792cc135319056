//! The dataset engine: a loaded [`Dataset`] plus the cleaning, analysis and
//! filter/sort/sample operations that run on it.
//!
//! Mutating operations compute a new dataset from the current one and only replace the
//! current dataset once the whole operation has succeeded. Analysis operations never
//! modify state.

pub mod analysis;
pub mod cleaning;
pub mod dataset;
pub mod filtering;
pub mod ml;
pub mod state;
pub mod types;

pub use dataset::{ColumnValues, DType, Dataset, Value};
pub use state::DatasetState;
pub use types::{
    AggFunc, ClusterConfig, ClusterResult, ColumnCast, CorrelationMatrix, DataOverview,
    FilterConfig, FilterOp, GroupAggregationConfig, GroupAggregationResult, GroupComparison,
    MissingStrategy, OperationKind, OperationReport, OutlierConfig, OutlierMode, PivotAgg,
    PivotConfig, PivotResult, QualityGrade, SampleConfig, SampleSize, SortConfig, StatsReport,
    TimeSeries,
};

use crate::config::EngineSettings;
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct Engine {
    state: DatasetState,
    settings: EngineSettings,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        Self {
            state: DatasetState::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_loaded()
    }

    /// Installs `dataset` as both the original snapshot and the working copy.
    pub fn load(&mut self, dataset: Dataset) -> Result<OperationReport> {
        let mut report = OperationReport::new(OperationKind::Load, 0, dataset.n_rows());
        report.columns = dataset.n_cols();
        self.state.load(dataset)?;
        tracing::info!(
            "Loaded dataset with {} rows and {} columns",
            report.rows_after,
            report.columns
        );
        Ok(report)
    }

    /// Discards every change since the last load.
    pub fn reset(&mut self) -> Result<OperationReport> {
        let rows_before = self.state.current()?.n_rows();
        self.state.reset()?;
        let current = self.state.current()?;
        let mut report = OperationReport::new(OperationKind::Reset, rows_before, current.n_rows());
        report.columns = current.n_cols();
        tracing::info!("Dataset reset to original ({} rows)", report.rows_after);
        Ok(report)
    }

    pub fn current(&self) -> Result<&Dataset> {
        self.state.current()
    }

    pub fn original(&self) -> Result<&Dataset> {
        self.state.original()
    }

    fn commit(&mut self, (dataset, report): (Dataset, OperationReport)) -> OperationReport {
        self.state.replace_current(dataset);
        tracing::info!("{}", report.summary());
        report
    }

    // CLEANING

    pub fn deduplicate(&mut self) -> Result<OperationReport> {
        let result = cleaning::deduplicate(self.current()?)?;
        Ok(self.commit(result))
    }

    pub fn handle_missing(&mut self, strategy: MissingStrategy) -> Result<OperationReport> {
        let result = cleaning::handle_missing(self.current()?, strategy)?;
        tracing::debug!("Missing values handled with strategy '{}'", strategy.as_str());
        Ok(self.commit(result))
    }

    pub fn remove_outliers(&mut self, config: &OutlierConfig) -> Result<OperationReport> {
        let result = cleaning::remove_outliers(self.current()?, config)?;
        Ok(self.commit(result))
    }

    /// IQR outlier removal with the multiplier and mode from the engine settings.
    pub fn remove_outliers_default(&mut self) -> Result<OperationReport> {
        let config = self.settings.outlier_config();
        self.remove_outliers(&config)
    }

    /// Applies every cast or none of them.
    pub fn convert_types(&mut self, casts: &[ColumnCast]) -> Result<OperationReport> {
        let result =
            cleaning::convert_types(self.current()?, casts, &self.settings.datetime_formats)?;
        Ok(self.commit(result))
    }

    pub fn normalize(&mut self) -> Result<OperationReport> {
        let result = cleaning::normalize(self.current()?)?;
        Ok(self.commit(result))
    }

    // FILTER / SORT / SAMPLE

    pub fn filter(&mut self, config: &FilterConfig) -> Result<OperationReport> {
        let result =
            filtering::filter(self.current()?, config, &self.settings.datetime_formats)?;
        Ok(self.commit(result))
    }

    pub fn sample(&mut self, config: &SampleConfig) -> Result<OperationReport> {
        let result = filtering::sample(self.current()?, config)?;
        Ok(self.commit(result))
    }

    /// Samples with the engine's configured seed.
    pub fn sample_seeded(&mut self, size: SampleSize) -> Result<OperationReport> {
        let config = SampleConfig {
            size,
            seed: self.settings.random_seed,
        };
        self.sample(&config)
    }

    pub fn sort(&mut self, config: &SortConfig) -> Result<OperationReport> {
        let result = filtering::sort(self.current()?, config)?;
        Ok(self.commit(result))
    }

    // ANALYSIS

    pub fn describe(&self) -> Result<StatsReport> {
        analysis::describe(self.current()?)
    }

    pub fn overview(&self) -> Result<DataOverview> {
        Ok(analysis::overview(self.current()?))
    }

    pub fn correlation(&self) -> Result<CorrelationMatrix> {
        analysis::correlation_matrix(self.current()?)
    }

    pub fn cluster(&self, config: &ClusterConfig) -> Result<ClusterResult> {
        ml::cluster(self.current()?, config)
    }

    /// Clusters all numeric columns with the engine settings.
    pub fn cluster_default(&self) -> Result<ClusterResult> {
        self.cluster(&self.settings.cluster_config())
    }

    pub fn group_aggregate(&self, config: &GroupAggregationConfig) -> Result<GroupAggregationResult> {
        analysis::group_aggregate(self.current()?, config)
    }

    pub fn pivot(&self, config: &PivotConfig) -> Result<PivotResult> {
        analysis::pivot_table(self.current()?, config)
    }

    pub fn group_comparison(&self, group_column: &str, value_column: &str) -> Result<GroupComparison> {
        analysis::group_comparison(self.current()?, group_column, value_column)
    }

    pub fn time_series(&self, time_column: &str, value_column: &str) -> Result<TimeSeries> {
        analysis::time_series(
            self.current()?,
            time_column,
            value_column,
            &self.settings.datetime_formats,
        )
    }
}
