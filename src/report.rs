//! JSON Lines run reports
//!
//! One header line (run id, start time, config, inputs), optionally one line
//! per step, and one summary line. Every line carries a `type` tag so readers
//! can stream the file without knowing its length.

use crate::config::ExperimentConfig;
use crate::experiment::{Accuracy, Outcome, StepRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use strata_core::HierarchySnapshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportLine<S> {
    Header {
        run_id: String,
        started_at: DateTime<Utc>,
        label: String,
        inputs: Vec<String>,
        config: ExperimentConfig,
    },
    Step(StepRecord<S>),
    Summary {
        run_id: String,
        label: String,
        accuracy: Accuracy,
        rate: f64,
        breakdowns: u64,
        snapshot: HierarchySnapshot,
    },
}

pub struct ReportWriter<W: Write> {
    out: W,
    run_id: String,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            run_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Write header, trajectory and summary for one labelled run.
    pub fn write_run<S: Serialize + Clone>(
        &mut self,
        label: &str,
        inputs: &[String],
        config: &ExperimentConfig,
        outcome: &Outcome<S>,
    ) -> anyhow::Result<()> {
        self.line(&ReportLine::<S>::Header {
            run_id: self.run_id.clone(),
            started_at: Utc::now(),
            label: label.to_string(),
            inputs: inputs.to_vec(),
            config: config.clone(),
        })?;
        for record in &outcome.trajectory {
            self.line(&ReportLine::Step(record.clone()))?;
        }
        self.line(&ReportLine::<S>::Summary {
            run_id: self.run_id.clone(),
            label: label.to_string(),
            accuracy: outcome.accuracy,
            rate: outcome.accuracy.rate(),
            breakdowns: outcome.breakdowns,
            snapshot: outcome.snapshot.clone(),
        })?;
        self.out.flush()?;
        Ok(())
    }

    fn line<S: Serialize>(&mut self, line: &ReportLine<S>) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.out, line)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Human-readable one-run summary for the terminal.
pub fn format_summary<S>(label: &str, outcome: &Outcome<S>) -> String {
    format!(
        "{:<9} accuracy {:>6.2}% ({}/{})  breakdowns {}  depth {}  state {:?}  shape {:?}",
        label,
        outcome.accuracy.rate() * 100.0,
        outcome.accuracy.hits,
        outcome.accuracy.total,
        outcome.breakdowns,
        outcome.depth(),
        outcome.snapshot.state,
        outcome.snapshot.shape,
    )
}
