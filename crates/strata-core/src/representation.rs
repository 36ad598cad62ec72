//! Representation — a first-order transition table with fit metrics
//!
//! Every entry maps a `(cause, effect)` pair to a [`TransitionInfo`]. Effects
//! under a cause keep their insertion order, so argmax ties always resolve to
//! the effect seen first.
//!
//! Fit metrics return `-1.0` when the cause has never been seen. That value is
//! "no information", not a score; the owning level decides what it means.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::ops::Add;

/// Fit value reported for an unknown cause.
pub const NO_INFORMATION: f64 = -1.0;

/// Anything usable as an observation: compared by value, hashed as a map key.
pub trait Symbol: Clone + Eq + Hash + fmt::Debug {}

impl<T: Clone + Eq + Hash + fmt::Debug> Symbol for T {}

/// Id of a representation within its level. Parent levels observe these.
pub type ShapeId = usize;

/// Statistics for one `(cause, effect)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionInfo {
    pub frequency: u64,
    pub average_duration: f64,
    /// Sum of all recorded durations. Weight for the fit metrics.
    pub total_sub_frequencies: u64,
}

impl TransitionInfo {
    fn new(duration: u64) -> Self {
        Self {
            frequency: 1,
            average_duration: duration as f64,
            total_sub_frequencies: duration,
        }
    }

    fn record(&mut self, duration: u64) {
        self.total_sub_frequencies += duration;
        let freq = self.frequency as f64;
        self.average_duration = (self.average_duration * freq + duration as f64) / (freq + 1.0);
        self.frequency += 1;
    }

    fn absorb(&mut self, other: &TransitionInfo) {
        self.frequency += other.frequency;
        self.total_sub_frequencies += other.total_sub_frequencies;
        self.average_duration = self.total_sub_frequencies as f64 / self.frequency as f64;
    }
}

/// Effects observed after one cause, in insertion order.
#[derive(Debug, Clone)]
struct Row<S> {
    effects: Vec<(S, TransitionInfo)>,
}

impl<S: Symbol> Row<S> {
    fn new() -> Self {
        Self {
            effects: Vec::new(),
        }
    }

    fn get(&self, effect: &S) -> Option<&TransitionInfo> {
        self.effects.iter().find(|(e, _)| e == effect).map(|(_, info)| info)
    }

    fn weight(&self, effect: &S) -> u64 {
        self.get(effect).map_or(0, |info| info.total_sub_frequencies)
    }

    fn upsert(&mut self, effect: &S, duration: u64) {
        match self.effects.iter_mut().find(|(e, _)| e == effect) {
            Some((_, info)) => info.record(duration),
            None => self.effects.push((effect.clone(), TransitionInfo::new(duration))),
        }
    }

    fn absorb(&mut self, effect: &S, other: &TransitionInfo) {
        match self.effects.iter_mut().find(|(e, _)| e == effect) {
            Some((_, info)) => info.absorb(other),
            None => self.effects.push((effect.clone(), *other)),
        }
    }

    /// First effect with the largest weight.
    fn argmax(&self) -> Option<&S> {
        let mut best: Option<(&S, u64)> = None;
        for (effect, info) in &self.effects {
            match best {
                Some((_, w)) if info.total_sub_frequencies <= w => {}
                _ => best = Some((effect, info.total_sub_frequencies)),
            }
        }
        best.map(|(effect, _)| effect)
    }

    fn max_weight(&self) -> u64 {
        self.effects
            .iter()
            .map(|(_, info)| info.total_sub_frequencies)
            .max()
            .unwrap_or(0)
    }

    fn total_weight(&self) -> u64 {
        self.effects.iter().map(|(_, info)| info.total_sub_frequencies).sum()
    }
}

/// A first-order model over `cause → effect`, identified by its shape.
#[derive(Debug, Clone)]
pub struct Representation<S> {
    shape: ShapeId,
    table: HashMap<S, Row<S>>,
    size: u64,
    origin: Option<(ShapeId, ShapeId)>,
}

impl<S: Symbol> Representation<S> {
    pub fn new(shape: ShapeId) -> Self {
        Self {
            shape,
            table: HashMap::new(),
            size: 0,
            origin: None,
        }
    }

    pub fn shape(&self) -> ShapeId {
        self.shape
    }

    /// Total number of recorded transitions.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Shapes this representation was combined from, if any.
    pub fn origin(&self) -> Option<(ShapeId, ShapeId)> {
        self.origin
    }

    pub fn knows(&self, cause: &S) -> bool {
        self.table.contains_key(cause)
    }

    pub fn causes(&self) -> impl Iterator<Item = &S> {
        self.table.keys()
    }

    /// Every stored `(cause, effect, info)` triple. Cause order is unspecified;
    /// effects under one cause come in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&S, &S, &TransitionInfo)> {
        self.table.iter().flat_map(|(cause, row)| {
            row.effects.iter().map(move |(effect, info)| (cause, effect, info))
        })
    }

    pub fn transition(&self, cause: &S, effect: &S) -> Option<&TransitionInfo> {
        self.table.get(cause).and_then(|row| row.get(effect))
    }

    pub fn frequency(&self, cause: &S, effect: &S) -> u64 {
        self.transition(cause, effect).map_or(0, |info| info.frequency)
    }

    pub fn total_sub_frequencies(&self, cause: &S, effect: &S) -> u64 {
        self.transition(cause, effect)
            .map_or(0, |info| info.total_sub_frequencies)
    }

    /// Record one transition that lasted `duration` steps.
    pub fn record(&mut self, cause: &S, effect: &S, duration: u64) -> Result<()> {
        if duration == 0 {
            return Err(Error::InvalidDuration(duration));
        }
        self.table
            .entry(cause.clone())
            .or_insert_with(Row::new)
            .upsert(effect, duration);
        self.size += 1;
        Ok(())
    }

    /// Most weighted effect after `cause`, or `default` for an unknown cause.
    pub fn predict(&self, cause: &S, default: Option<S>) -> Option<S> {
        match self.table.get(cause).and_then(Row::argmax) {
            Some(effect) => Some(effect.clone()),
            None => default,
        }
    }

    /// `1.0` if `effect` is the argmax after `cause`, else `0.0`.
    pub fn strict_fit(&self, cause: &S, effect: &S) -> f64 {
        match self.table.get(cause).and_then(Row::argmax) {
            None => NO_INFORMATION,
            Some(best) if best == effect => 1.0,
            Some(_) => 0.0,
        }
    }

    /// Weight of `effect` relative to the heaviest effect after `cause`.
    pub fn max_scaled_fit(&self, cause: &S, effect: &S) -> f64 {
        let Some(row) = self.table.get(cause) else {
            return NO_INFORMATION;
        };
        let max = row.max_weight();
        if max == 0 {
            return NO_INFORMATION;
        }
        row.weight(effect) as f64 / max as f64
    }

    /// Weight of `effect` as a share of all effects after `cause`.
    pub fn prop_scaled_fit(&self, cause: &S, effect: &S) -> f64 {
        let Some(row) = self.table.get(cause) else {
            return NO_INFORMATION;
        };
        let total = row.total_weight();
        if total == 0 {
            return NO_INFORMATION;
        }
        row.weight(effect) as f64 / total as f64
    }

    /// Product of max-scaled fits over every entry of `probe`.
    pub fn max_scaled_likelihood(&self, probe: &Representation<S>, open_world: bool) -> f64 {
        self.likelihood(probe, open_world, Self::max_scaled_fit)
    }

    /// Product of prop-scaled fits over every entry of `probe`.
    pub fn prop_scaled_likelihood(&self, probe: &Representation<S>, open_world: bool) -> f64 {
        self.likelihood(probe, open_world, Self::prop_scaled_fit)
    }

    fn likelihood(
        &self,
        probe: &Representation<S>,
        open_world: bool,
        fit: fn(&Self, &S, &S) -> f64,
    ) -> f64 {
        let mut product = 1.0;
        for (cause, effect, _) in probe.entries() {
            let score = fit(self, cause, effect);
            product *= if score >= 0.0 {
                score
            } else if open_world {
                score.abs()
            } else {
                0.0
            };
            if product == 0.0 {
                break;
            }
        }
        product
    }

    pub fn clear(&mut self) {
        self.table.clear();
        self.size = 0;
    }

    /// Add every transition of `other` into this table.
    pub fn merge(&mut self, other: &Representation<S>) {
        for (cause, row) in &other.table {
            let target = self.table.entry(cause.clone()).or_insert_with(Row::new);
            for (effect, info) in &row.effects {
                target.absorb(effect, info);
            }
        }
        self.size += other.size;
    }

    /// A fresh representation holding both tables. Keeps `a`'s shape and
    /// remembers `(a, b)` as its origin.
    pub fn combine(a: &Representation<S>, b: &Representation<S>) -> Representation<S> {
        let mut combined = a.clone();
        combined.merge(b);
        combined.origin = Some((a.shape, b.shape));
        combined
    }
}

impl<S: Symbol> Add for &Representation<S> {
    type Output = Representation<S>;

    fn add(self, other: Self) -> Representation<S> {
        Representation::combine(self, other)
    }
}
