//! Experiment runner — feeds a symbol stream through a predictor tower
//!
//! Before every update the tower is asked what follows the cause; the guess is
//! scored against the observed effect. A run produces accuracy counters, the
//! final hierarchy snapshot, and optionally the full per-step trajectory of
//! `(state, shape, prediction)` for reporting.

use crate::source::pairs;
use serde::{Deserialize, Serialize};
use strata_core::{HierarchySnapshot, Level, LevelConfig, ShapeId, Step, Symbol};
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accuracy {
    pub hits: u64,
    pub total: u64,
}

impl Accuracy {
    pub fn observe(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.hits += 1;
        }
    }

    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.hits as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord<S> {
    pub step: u64,
    pub cause: S,
    pub observed: S,
    pub prediction: Option<S>,
    pub correct: bool,
    pub breakdown: bool,
    pub state: Vec<ShapeId>,
    pub shape: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "S: Deserialize<'de>"))]
pub struct Outcome<S> {
    pub accuracy: Accuracy,
    pub breakdowns: u64,
    pub snapshot: HierarchySnapshot,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub trajectory: Vec<StepRecord<S>>,
}

impl<S> Outcome<S> {
    pub fn depth(&self) -> usize {
        self.snapshot.state.len()
    }
}

pub struct Experiment {
    config: LevelConfig,
    record_trajectory: bool,
}

impl Experiment {
    pub fn new(config: LevelConfig) -> Self {
        Self {
            config,
            record_trajectory: false,
        }
    }

    pub fn with_trajectory(mut self, record: bool) -> Self {
        self.record_trajectory = record;
        self
    }

    pub fn config(&self) -> &LevelConfig {
        &self.config
    }

    pub fn run<S: Symbol>(&self, symbols: &[S]) -> strata_core::Result<Outcome<S>> {
        self.run_on(Level::new(self.config.clone()), symbols)
    }

    /// Run this experiment and a frozen single-model baseline on `symbols`.
    pub fn compare<S: Symbol>(&self, symbols: &[S]) -> strata_core::Result<Comparison<S>> {
        let adaptive = self.run(symbols)?;
        let baseline = Experiment {
            config: self.config.clone().frozen(true),
            record_trajectory: self.record_trajectory,
        }
        .run(symbols)?;
        Ok(Comparison { adaptive, baseline })
    }

    /// Run on a caller-built tower, e.g. one from [`Level::build`].
    pub fn run_on<S: Symbol>(&self, mut level: Level<S>, symbols: &[S]) -> strata_core::Result<Outcome<S>> {
        let mut accuracy = Accuracy::default();
        let mut breakdowns = 0;
        let mut trajectory = Vec::new();

        for (i, (cause, effect)) in pairs(symbols).enumerate() {
            let prediction = level.predict(cause, None);
            let correct = prediction.as_ref() == Some(effect);
            accuracy.observe(correct);

            let step = level.update(cause, effect, 1)?;
            if matches!(step, Step::Breakdown(_)) {
                breakdowns += 1;
            }

            if self.record_trajectory {
                let snapshot = level.snapshot();
                trajectory.push(StepRecord {
                    step: i as u64,
                    cause: cause.clone(),
                    observed: effect.clone(),
                    prediction,
                    correct,
                    breakdown: step.is_breakdown(),
                    state: snapshot.state,
                    shape: snapshot.shape,
                });
            }
        }

        let snapshot = level.snapshot();
        info!(
            hits = accuracy.hits,
            total = accuracy.total,
            breakdowns,
            depth = snapshot.state.len(),
            "run complete"
        );
        Ok(Outcome {
            accuracy,
            breakdowns,
            snapshot,
            trajectory,
        })
    }
}

/// Adaptive tower against a single frozen first-order model on the same stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison<S> {
    pub adaptive: Outcome<S>,
    pub baseline: Outcome<S>,
}

impl<S> Comparison<S> {
    /// Accuracy of the adaptive tower minus the baseline's.
    pub fn gain(&self) -> f64 {
        self.adaptive.accuracy.rate() - self.baseline.accuracy.rate()
    }
}

pub fn compare<S: Symbol>(symbols: &[S], config: &LevelConfig) -> strata_core::Result<Comparison<S>> {
    Experiment::new(config.clone()).compare(symbols)
}
