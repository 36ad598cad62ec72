//! Strata Core - hierarchical sequence predictor
//!
//! A [`Level`] keeps a pool of first-order [`Representation`]s and one active
//! model. When the active model fails on an observation (a breakdown) the level
//! switches to the model its parent expects, adopts the best existing one, or
//! mints a new one. Switches are reported upward as observations over shape ids,
//! so parent levels grow on demand into an arbitrarily deep tower.

pub mod config;
pub mod error;
pub mod level;
pub mod representation;

pub use config::{LevelConfig, SwitchStrategy};
pub use error::{Error, Result};
pub use level::{Breakdown, HierarchySnapshot, Level, Resolution, Step};
pub use representation::{Representation, ShapeId, Symbol, TransitionInfo};
