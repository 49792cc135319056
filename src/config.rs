use crate::engine::types::{ClusterConfig, OutlierConfig, OutlierMode};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_SEED: u64 = 42;

/// Engine-wide defaults.
///
/// Every operation still takes its own explicit configuration value; the settings only
/// seed those values (see [`EngineSettings::cluster_config`] and friends) and pin the
/// random seed that keeps sampling and clustering reproducible.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    /// Seed for sampling and k-means initialisation
    pub random_seed: u64,
    /// Number of clusters produced by clustering
    pub cluster_count: usize,
    pub kmeans_max_iter: usize,
    /// Independent k-means restarts; the run with the lowest inertia wins
    pub kmeans_n_init: usize,
    pub kmeans_tolerance: f64,
    /// Whisker multiplier for IQR outlier rejection
    pub iqr_multiplier: f64,
    pub outlier_mode: OutlierMode,
    /// Extra `chrono` formats tried before the built-in ones when parsing datetimes
    pub datetime_formats: Vec<String>,
    /// Directory for rolling log files; console only when unset
    pub log_dir: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            random_seed: DEFAULT_SEED,
            cluster_count: 3,
            kmeans_max_iter: 300,
            kmeans_n_init: 10,
            kmeans_tolerance: 1e-4,
            iqr_multiplier: 1.5,
            outlier_mode: OutlierMode::Sequential,
            datetime_formats: Vec::new(),
            log_dir: None,
        }
    }
}

impl EngineSettings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Like [`Self::from_file`] but falls back to defaults when the file is absent or
    /// unreadable.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::from_file(path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(
                    "Failed to load settings from {}: {e}. Using defaults.",
                    path.display()
                );
                Self::default()
            }
        }
    }

    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            columns: None,
            clusters: self.cluster_count,
            max_iter: self.kmeans_max_iter,
            n_init: self.kmeans_n_init,
            tolerance: self.kmeans_tolerance,
            seed: self.random_seed,
        }
    }

    pub fn outlier_config(&self) -> OutlierConfig {
        OutlierConfig {
            columns: None,
            multiplier: self.iqr_multiplier,
            mode: self.outlier_mode,
        }
    }
}
