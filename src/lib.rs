//! Strata — experiment harness around the hierarchical sequence predictor
//!
//! The predictor itself lives in `strata-core`. This crate supplies what the
//! core leaves to its callers: reading symbol streams from disk, scoring
//! next-symbol predictions, and writing `(state, shape, prediction)` reports.

pub mod config;
pub mod experiment;
pub mod report;
pub mod source;

pub use config::ExperimentConfig;
pub use experiment::{compare, Accuracy, Comparison, Experiment, Outcome, StepRecord};
pub use report::{format_summary, ReportLine, ReportWriter};
pub use source::TokenMode;
