//! Clustering: standardize the selected numeric columns, run seeded k-means and project
//! the rows onto the first two principal components.

use super::dataset::Dataset;
use super::types::{ClusterConfig, ClusterResult};
use crate::error::{EngineError, Result};
use linfa::DatasetBase;
use linfa::traits::{Fit as _, Predict as _};
use linfa_clustering::KMeans;
use linfa_reduction::Pca;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::SeedableRng as _;
use rand::rngs::StdRng;
use std::time::Instant;

pub const MIN_CLUSTER_ROWS: usize = 10;
const ROW_INDEX: &str = "__row";

pub fn cluster(df: &Dataset, config: &ClusterConfig) -> Result<ClusterResult> {
    let start = Instant::now();
    if config.clusters == 0 {
        return Err(EngineError::validation("Cluster count must be at least 1"));
    }

    let columns = select_columns(df, config.columns.as_deref())?;
    let (row_indices, scaled) = standardized_rows(df, &columns)?;
    if row_indices.len() < MIN_CLUSTER_ROWS {
        return Err(EngineError::validation(format!(
            "Clustering needs at least {MIN_CLUSTER_ROWS} complete rows, found {}",
            row_indices.len()
        )));
    }

    let distinct = scaled
        .clone()
        .lazy()
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()?
        .height();
    let records = to_records(&scaled, &columns)?;
    if records.iter().all(|v| *v == 0.0) {
        return Err(EngineError::computation(
            "All selected columns are constant, total variance is zero",
        ));
    }
    if distinct < config.clusters {
        return Err(EngineError::computation(format!(
            "Only {distinct} distinct rows, cannot form {} clusters",
            config.clusters
        )));
    }

    let dataset = DatasetBase::from(records.clone());
    let rng = StdRng::seed_from_u64(config.seed);
    let model = KMeans::params_with_rng(config.clusters, rng)
        .n_runs(config.n_init.max(1))
        .max_n_iterations(config.max_iter.max(1) as u64)
        .tolerance(config.tolerance)
        .fit(&dataset)
        .map_err(|e| EngineError::computation(format!("k-means failed: {e}")))?;
    let labels: Array1<usize> = model.predict(&records);
    let centroids = model.centroids();

    let inertia = records
        .rows()
        .into_iter()
        .zip(labels.iter())
        .map(|(row, &label)| {
            row.iter()
                .zip(centroids.row(label).iter())
                .map(|(x, c)| (x - c).powi(2))
                .sum::<f64>()
        })
        .sum::<f64>();

    let (explained_variance, projection) = pca_projection(dataset)?;

    tracing::debug!(
        "Clustered {} rows on {} columns into {} clusters (inertia {:.4}) in {:?}",
        row_indices.len(),
        columns.len(),
        config.clusters,
        inertia,
        start.elapsed()
    );

    Ok(ClusterResult {
        columns,
        row_indices,
        labels: labels.to_vec(),
        explained_variance,
        projection,
        centroids: centroids.rows().into_iter().map(|r| r.to_vec()).collect(),
        inertia,
    })
}

fn select_columns(df: &Dataset, names: Option<&[String]>) -> Result<Vec<String>> {
    let columns = match names {
        Some(names) => names
            .iter()
            .map(|name| {
                let dtype = df.dtype(name)?;
                if dtype.is_numeric() {
                    Ok(name.clone())
                } else {
                    Err(EngineError::validation(format!(
                        "Column '{name}' is {dtype}, clustering needs numeric columns"
                    )))
                }
            })
            .collect::<Result<Vec<_>>>()?,
        None => df.numeric_columns().into_iter().map(str::to_owned).collect(),
    };
    if columns.len() < 2 {
        return Err(EngineError::validation(format!(
            "Clustering needs at least 2 numeric columns, found {}",
            columns.len()
        )));
    }
    Ok(columns)
}

/// Rows where every selected column is present, z-scored with the population standard
/// deviation. Constant columns become all zeros. Returns the original row positions too.
fn standardized_rows(df: &Dataset, columns: &[String]) -> Result<(Vec<usize>, DataFrame)> {
    let mut complete = lit(true);
    for name in columns {
        complete = complete.and(col(name.as_str()).is_not_null());
    }
    let scaled = columns.iter().map(|name| {
        let x = col(name.as_str()).cast(DataType::Float64);
        let std = x.clone().std(0);
        when(std.clone().gt(lit(0.0)))
            .then((x.clone() - x.mean()) / std)
            .otherwise(lit(0.0))
            .alias(name.as_str())
    });
    let mut frame = df
        .lazy()
        .with_row_index(ROW_INDEX, None)
        .filter(complete)
        .select(std::iter::once(col(ROW_INDEX)).chain(scaled).collect::<Vec<_>>())
        .collect()?;

    let rows = frame
        .column(ROW_INDEX)?
        .as_materialized_series()
        .idx()?
        .into_no_null_iter()
        .map(|i| i as usize)
        .collect();
    frame.drop_in_place(ROW_INDEX)?;
    Ok((rows, frame))
}

fn to_records(frame: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let values = columns
        .iter()
        .map(|name| {
            let series = frame.column(name)?.as_materialized_series();
            Ok(series.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect())
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;
    Ok(Array2::from_shape_fn(
        (frame.height(), columns.len()),
        |(i, j)| values.get(j).and_then(|c| c.get(i)).copied().unwrap_or(0.0),
    ))
}

/// Explained variance ratios and row scores of the first two principal components.
fn pca_projection(dataset: DatasetBase<Array2<f64>, Array1<()>>) -> Result<([f64; 2], Vec<[f64; 2]>)> {
    let pca = Pca::params(2)
        .fit(&dataset)
        .map_err(|e| EngineError::computation(format!("PCA failed: {e}")))?;
    let ratios = pca.explained_variance_ratio();
    let ratio = |i: usize| ratios.get(i).copied().unwrap_or(0.0);

    let scores: Array2<f64> = pca.predict(dataset.records());
    let projection = scores
        .rows()
        .into_iter()
        .map(|row| {
            [
                row.get(0).copied().unwrap_or(0.0),
                row.get(1).copied().unwrap_or(0.0),
            ]
        })
        .collect();
    Ok(([ratio(0), ratio(1)], projection))
}
