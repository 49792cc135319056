//! Pipeline specification and execution for replaying cleaning sessions.
//!
//! A pipeline spec is a versioned JSON document listing engine operations in order:
//!
//! ```json
//! {
//!   "version": "0.1",
//!   "name": "Adults only",
//!   "steps": [
//!     { "op": "deduplicate" },
//!     { "op": "handle_missing", "strategy": "median" },
//!     { "op": "filter", "column": "age", "operator": ">=", "value": "18" },
//!     { "op": "sort", "column": "age", "descending": true }
//!   ]
//! }
//! ```
//!
//! # Example
//!
//! ```no_run
//! use datainsight::engine::Engine;
//! use datainsight::pipeline::{PipelineSpec, Step, run_pipeline};
//!
//! let mut engine = Engine::new();
//! engine.load(datainsight::io::read_csv("data.csv")?)?;
//!
//! let spec = PipelineSpec::new("Dedupe").with_step(Step::Deduplicate);
//! let report = run_pipeline(&mut engine, &spec)?;
//! println!("Processed {} rows", report.rows_after);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod executor;
pub mod spec;
pub mod validation;

pub use executor::{RunReport, run_pipeline, run_pipeline_file};
pub use spec::{PipelineSpec, SPEC_VERSION, Step};
pub use validation::{SpecIssue, validate_pipeline};
