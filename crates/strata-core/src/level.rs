//! Level — one tier of the predictor tower
//!
//! A level owns a pool of representations (index == shape id) and the single
//! active one. Each observation is scored against the active representation:
//!
//! - fit at or above the threshold → the active model absorbs it
//! - below → breakdown: pick the next model (parent expectation, best of pool,
//!   or a freshly minted one), record the observation there, and report the
//!   switch `(old shape, new shape, duration)` to the parent level
//!
//! The parent is created on the first switch and observes shape ids, so the
//! tower grows one level each time breakdowns nest. Levels only know their
//! parent; a parent sees its child purely through shape ids.

use crate::config::{LevelConfig, SwitchStrategy};
use crate::error::{Error, Result};
use crate::representation::{Representation, ShapeId, Symbol};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

/// How a breakdown was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// The parent's expected representation fit the observation.
    Expected,
    /// The joint (previous, current) search found a fitting representation.
    Joint,
    /// The best-fitting existing representation was adopted.
    Adopted,
    /// A new representation was minted.
    Minted,
    /// Nothing better was found; the active representation stays.
    Retained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub from: ShapeId,
    pub to: ShapeId,
    pub resolution: Resolution,
    /// Steps `from` ruled, including the step that broke it.
    pub duration: u64,
}

impl Breakdown {
    pub fn switched(&self) -> bool {
        self.from != self.to
    }
}

/// Outcome of one [`Level::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Step {
    Absorbed,
    Breakdown(Breakdown),
}

impl Step {
    pub fn is_breakdown(&self) -> bool {
        matches!(self, Step::Breakdown(_))
    }

    pub fn breakdown(&self) -> Option<&Breakdown> {
        match self {
            Step::Absorbed => None,
            Step::Breakdown(b) => Some(b),
        }
    }
}

/// Active shapes and pool sizes of the whole tower, leaf level first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchySnapshot {
    pub state: Vec<ShapeId>,
    pub shape: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Level<S> {
    level: usize,
    config: LevelConfig,
    predictors: Vec<Representation<S>>,
    active: ShapeId,
    last_active_shape: Option<ShapeId>,
    duration: u64,
    likelihood: f64,
    breakdowns: u64,
    /// Previous observation, kept only for the joint strategy.
    last_observation: Option<(S, S)>,
    parent: Option<Box<Level<ShapeId>>>,
}

impl<S: Symbol> Level<S> {
    /// A leaf level with one empty representation.
    pub fn new(config: LevelConfig) -> Self {
        Self::with_level(0, config)
    }

    pub fn with_level(level: usize, config: LevelConfig) -> Self {
        Self {
            level,
            config,
            predictors: vec![Representation::new(0)],
            active: 0,
            last_active_shape: None,
            duration: 0,
            likelihood: 1.0,
            breakdowns: 0,
            last_observation: None,
            parent: None,
        }
    }

    /// Pre-build a tower with `counts[k]` empty representations at level `k`.
    /// Usually paired with a frozen config to study adaptation of contents only.
    pub fn build(counts: &[usize], config: LevelConfig) -> Result<Self> {
        config.validate()?;
        Self::build_at(0, counts, config)
    }

    fn build_at(level: usize, counts: &[usize], config: LevelConfig) -> Result<Self> {
        let (&count, rest) = counts
            .split_first()
            .ok_or_else(|| Error::invalid_layout("at least one level is required"))?;
        if count == 0 {
            return Err(Error::invalid_layout(format!(
                "level {} needs at least one representation",
                level
            )));
        }
        let mut built = Self::with_level(level, config.clone());
        for _ in 1..count {
            built.mint();
        }
        if !rest.is_empty() {
            built.parent = Some(Box::new(Level::<ShapeId>::build_at(level + 1, rest, config)?));
        }
        Ok(built)
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn config(&self) -> &LevelConfig {
        &self.config
    }

    pub fn active_shape(&self) -> ShapeId {
        self.active
    }

    pub fn active(&self) -> &Representation<S> {
        &self.predictors[self.active]
    }

    pub fn last_active_shape(&self) -> Option<ShapeId> {
        self.last_active_shape
    }

    pub fn predictors(&self) -> &[Representation<S>] {
        &self.predictors
    }

    pub fn representation(&self, shape: ShapeId) -> Option<&Representation<S>> {
        self.predictors.get(shape)
    }

    /// Steps since the active representation last changed.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Running product of normalized fits since the last breakdown.
    pub fn likelihood(&self) -> f64 {
        self.likelihood
    }

    pub fn breakdowns(&self) -> u64 {
        self.breakdowns
    }

    pub fn parent(&self) -> Option<&Level<ShapeId>> {
        self.parent.as_deref()
    }

    /// Number of levels from here to the top of the tower.
    pub fn depth(&self) -> usize {
        1 + self.parent.as_ref().map_or(0, |p| p.depth())
    }

    /// Active shape ids, this level first.
    pub fn state(&self) -> Vec<ShapeId> {
        let mut state = vec![self.active];
        if let Some(parent) = &self.parent {
            state.extend(parent.state());
        }
        state
    }

    /// Pool sizes, this level first.
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = vec![self.predictors.len()];
        if let Some(parent) = &self.parent {
            shape.extend(parent.shape());
        }
        shape
    }

    pub fn snapshot(&self) -> HierarchySnapshot {
        HierarchySnapshot {
            state: self.state(),
            shape: self.shape(),
        }
    }

    /// Most likely effect after `cause` under the active representation.
    pub fn predict(&self, cause: &S, default: Option<S>) -> Option<S> {
        self.active().predict(cause, default)
    }

    /// Absorb one observation that lasted `duration` steps of the level below
    /// (1 at the leaf level).
    pub fn update(&mut self, cause: &S, effect: &S, duration: u64) -> Result<Step> {
        if duration == 0 {
            return Err(Error::InvalidDuration(duration));
        }

        let fit = self
            .config
            .normalize(self.active().max_scaled_fit(cause, effect));
        self.likelihood *= fit;
        self.duration += 1;

        if fit >= self.config.threshold {
            trace!(level = self.level, shape = self.active, fit, "absorbed");
            self.predictors[self.active].record(cause, effect, duration)?;
            self.remember(cause, effect);
            return Ok(Step::Absorbed);
        }

        self.breakdowns += 1;
        let from = self.active;
        let (to, resolution) = self.resolve(cause, effect);
        let resolution = if to == from {
            Resolution::Retained
        } else {
            resolution
        };
        debug!(
            level = self.level,
            from,
            to,
            ?resolution,
            ruled = self.duration,
            "breakdown"
        );

        self.predictors[to].record(cause, effect, duration)?;
        self.likelihood = 1.0;
        self.remember(cause, effect);

        // A retained breakdown carries no switch, so the parent sees nothing.
        let ruled = self.duration;
        if to != from {
            self.notify_parent(from, to, ruled)?;
            self.active = to;
        }
        self.last_active_shape = Some(from);
        self.duration = 0;

        Ok(Step::Breakdown(Breakdown {
            from,
            to,
            resolution,
            duration: ruled,
        }))
    }

    fn remember(&mut self, cause: &S, effect: &S) {
        if self.config.strategy == SwitchStrategy::Joint {
            self.last_observation = Some((cause.clone(), effect.clone()));
        }
    }

    fn resolve(&mut self, cause: &S, effect: &S) -> (ShapeId, Resolution) {
        let found = match self.config.strategy {
            SwitchStrategy::Expected => self
                .expected(cause, effect)
                .map(|shape| (shape, Resolution::Expected)),
            SwitchStrategy::Joint => self
                .joint(cause, effect)
                .map(|shape| (shape, Resolution::Joint)),
        };
        match found {
            Some(found) => found,
            None => self.unexpected(cause, effect),
        }
    }

    /// The parent's prediction for what follows the active shape, if it fits.
    fn expected(&self, cause: &S, effect: &S) -> Option<ShapeId> {
        let parent = self.parent.as_ref()?;
        let expected = parent
            .predict(&self.active, Some(self.active))
            .filter(|shape| *shape < self.predictors.len())
            .unwrap_or(self.active);
        let fit = self.predictors[expected].prop_scaled_fit(cause, effect);
        let accepted = if fit < 0.0 {
            self.config.open_world
        } else {
            fit >= self.config.expected_threshold()
        };
        accepted.then_some(expected)
    }

    /// Best `current` over all `(previous, current)` pairs, scored by how well
    /// `previous` explained the last observation, how often the parent saw
    /// `previous → current`, and how well `current` explains this observation.
    fn joint(&self, cause: &S, effect: &S) -> Option<ShapeId> {
        let weights: Vec<f64> = self
            .predictors
            .iter()
            .map(|prev| match &self.last_observation {
                Some((c, e)) => self.config.normalize(prev.prop_scaled_fit(c, e)),
                None if prev.shape() == self.active => 1.0,
                None => 0.0,
            })
            .collect();

        let mut best: Option<(ShapeId, f64)> = None;
        for (prev, weight) in weights.iter().enumerate() {
            if *weight == 0.0 {
                continue;
            }
            for current in &self.predictors {
                if current.shape() == self.active {
                    continue;
                }
                let transition = match &self.parent {
                    Some(parent) => self
                        .config
                        .normalize(parent.active().prop_scaled_fit(&prev, &current.shape())),
                    None => 1.0,
                };
                let fit = self.config.normalize(current.prop_scaled_fit(cause, effect));
                let score = weight * transition * fit;
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((current.shape(), score));
                }
            }
        }

        best.filter(|(_, score)| *score >= self.config.expected_threshold())
            .map(|(shape, _)| shape)
    }

    /// Best-of-pool by prop-scaled fit; mint when even the best one misses.
    fn unexpected(&mut self, cause: &S, effect: &S) -> (ShapeId, Resolution) {
        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for rep in &self.predictors {
            let score = self.config.normalize(rep.prop_scaled_fit(cause, effect));
            if score > best_score {
                best = rep.shape();
                best_score = score;
            }
        }

        let strict = self
            .config
            .normalize(self.predictors[best].strict_fit(cause, effect));
        if strict >= self.config.mint_threshold() || self.config.frozen {
            return (best, Resolution::Adopted);
        }

        // An empty representation is as good as a new one.
        if let Some(empty) = self.predictors.iter().find(|r| r.is_empty()) {
            return (empty.shape(), Resolution::Adopted);
        }
        (self.mint(), Resolution::Minted)
    }

    fn mint(&mut self) -> ShapeId {
        let shape = self.predictors.len();
        self.predictors.push(Representation::new(shape));
        debug!(level = self.level, shape, "minted representation");
        shape
    }

    fn notify_parent(&mut self, from: ShapeId, to: ShapeId, ruled: u64) -> Result<()> {
        let level = self.level;
        let config = &self.config;
        let parent = self.parent.get_or_insert_with(|| {
            info!(level = level + 1, "created parent level");
            Box::new(Level::with_level(level + 1, config.clone()))
        });
        parent.update(&from, &to, ruled)?;
        Ok(())
    }
}
