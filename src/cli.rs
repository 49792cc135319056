use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use datainsight::config::EngineSettings;
use datainsight::engine::{AggFunc, Engine, GroupAggregationConfig, PivotAgg, PivotConfig};
use datainsight::io;
use datainsight::pipeline::{self, PipelineSpec};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "datainsight", about = "Clean, transform and analyse tabular data")]
pub struct Cli {
    /// Path to a JSON engine settings file
    #[arg(long, global = true, env = "DATAINSIGHT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for rolling log files (overrides the settings file)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print descriptive statistics and a quality assessment
    Stats { file: PathBuf },
    /// Print shape, column type counts and missing cells
    Overview { file: PathBuf },
    /// Print the Pearson correlation matrix of the numeric columns
    Correlate { file: PathBuf },
    /// Cluster rows with k-means and project them onto two principal components
    Cluster {
        file: PathBuf,

        /// Number of clusters. Defaults to the settings value.
        #[arg(short = 'k', long)]
        clusters: Option<usize>,

        /// Comma-separated numeric columns. Defaults to all numeric columns.
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,
    },
    /// Aggregate a value column per group
    Group {
        file: PathBuf,

        #[arg(long)]
        by: String,

        #[arg(long)]
        value: String,

        /// mean, median, sum, count, max, min, std or var
        #[arg(long, default_value = "mean", value_parser = parse_name::<AggFunc>)]
        agg: AggFunc,
    },
    /// Build a pivot table
    Pivot {
        file: PathBuf,

        #[arg(long)]
        index: String,

        #[arg(long)]
        columns: Option<String>,

        #[arg(long)]
        values: String,

        /// mean, sum, count, max or min
        #[arg(long, default_value = "mean", value_parser = parse_name::<PivotAgg>)]
        agg: PivotAgg,
    },
    /// Compare the distribution of a numeric column across groups
    Compare {
        file: PathBuf,

        #[arg(long)]
        by: String,

        #[arg(long)]
        value: String,
    },
    /// Print a value column ordered by a time column
    Trend {
        file: PathBuf,

        #[arg(long)]
        time: String,

        #[arg(long)]
        value: String,
    },
    /// Run a pipeline spec on a CSV file and save the result
    Run {
        /// Input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Pipeline spec (JSON)
        #[arg(short, long)]
        pipeline: PathBuf,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Check a pipeline spec against a CSV file without running it
    Validate {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        pipeline: PathBuf,
    },
}

/// Parses a snake_case name with the type's serde representation.
fn parse_name<T: DeserializeOwned>(name: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(name.to_owned()))
        .map_err(|e| format!("invalid value '{name}': {e}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize result")?
    );
    Ok(())
}

fn load(file: &Path, settings: &EngineSettings) -> Result<Engine> {
    let dataset = io::read_csv(file)
        .with_context(|| format!("Failed to load {}", file.display()))?;
    let mut engine = Engine::with_settings(settings.clone());
    engine.load(dataset)?;
    Ok(engine)
}

pub fn run_command(command: Commands, settings: &EngineSettings) -> Result<()> {
    match command {
        Commands::Stats { file } => print_json(&load(&file, settings)?.describe()?),
        Commands::Overview { file } => print_json(&load(&file, settings)?.overview()?),
        Commands::Correlate { file } => print_json(&load(&file, settings)?.correlation()?),
        Commands::Cluster {
            file,
            clusters,
            columns,
        } => {
            let mut config = settings.cluster_config();
            if let Some(k) = clusters {
                config.clusters = k;
            }
            config.columns = columns;
            print_json(&load(&file, settings)?.cluster(&config)?)
        }
        Commands::Group {
            file,
            by,
            value,
            agg,
        } => {
            let config = GroupAggregationConfig {
                group_column: by,
                value_column: value,
                function: agg,
            };
            print_json(&load(&file, settings)?.group_aggregate(&config)?)
        }
        Commands::Pivot {
            file,
            index,
            columns,
            values,
            agg,
        } => {
            let config = PivotConfig {
                index,
                columns,
                values,
                function: agg,
            };
            print_json(&load(&file, settings)?.pivot(&config)?)
        }
        Commands::Compare { file, by, value } => {
            print_json(&load(&file, settings)?.group_comparison(&by, &value)?)
        }
        Commands::Trend { file, time, value } => {
            print_json(&load(&file, settings)?.time_series(&time, &value)?)
        }
        Commands::Run {
            input,
            pipeline,
            output,
        } => handle_run(&input, &pipeline, &output, settings),
        Commands::Validate { input, pipeline } => handle_validate(&input, &pipeline, settings),
    }
}

fn handle_run(input: &Path, spec_path: &Path, output: &Path, settings: &EngineSettings) -> Result<()> {
    let spec = PipelineSpec::from_file(spec_path)?;
    println!("Running pipeline '{}' on {}...", spec.name, input.display());

    let report = pipeline::run_pipeline_file(&spec, settings.clone(), input, output)?;
    for step in &report.reports {
        println!("  {}", step.summary());
    }
    for warning in report.warnings() {
        println!("  warning: {warning}");
    }
    println!("{}", report.summary());
    println!("Saved to {}", output.display());
    Ok(())
}

fn handle_validate(input: &Path, spec_path: &Path, settings: &EngineSettings) -> Result<()> {
    let spec = PipelineSpec::from_file(spec_path)?;
    let engine = load(input, settings)?;
    let issues = pipeline::validate_pipeline(&spec, engine.current()?);
    if issues.is_empty() {
        println!("Pipeline '{}' is valid for {}", spec.name, input.display());
        return Ok(());
    }
    for issue in &issues {
        println!("{issue}");
    }
    anyhow::bail!("{} issue(s) found", issues.len())
}
