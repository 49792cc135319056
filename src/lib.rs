//! # `datainsight` - stateful cleaning and analysis of tabular data
//!
//! Load a table into an [`Engine`](engine::Engine), clean and reshape it step by step,
//! and analyse whatever the current state is. The dataset as loaded is always kept, so
//! any sequence of operations can be undone with a reset.
//!
//! ## Quick Start
//!
//! ```no_run
//! use datainsight::engine::{Engine, FilterConfig, FilterOp, MissingStrategy};
//!
//! let mut engine = Engine::new();
//! engine.load(datainsight::io::read_csv("people.csv")?)?;
//!
//! engine.deduplicate()?;
//! engine.handle_missing(MissingStrategy::Median)?;
//! engine.filter(&FilterConfig::new("age", FilterOp::Gt, "30"))?;
//!
//! let stats = engine.describe()?;
//! println!("{} rows, quality {:?}", stats.rows, stats.quality);
//!
//! engine.reset()?; // back to the file as loaded
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Core Modules
//!
//! - [`engine`]: dataset model, state, cleaning, analysis, clustering, filter/sample/sort
//! - [`pipeline`]: JSON pipeline specs that replay a sequence of engine operations
//! - [`io`]: CSV loading with type inference, and CSV saving
//! - [`config`]: engine-wide defaults (seed, cluster count, IQR multiplier, ...)
//! - [`error`]: the engine error type and its error kinds
//! - [`logging`]: `tracing` subscriber setup for the binary

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod logging;
pub mod pipeline;
