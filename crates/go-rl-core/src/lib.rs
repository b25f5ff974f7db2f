//! Reinforcement-learning core for a Go-playing engine.
//!
//! Layered bottom-up: a minimal [`board`] behind the [`board::GoBoard`]
//! trait, binary [`features`] over it (local shapes, equivalence classes,
//! sums, products), incremental [`trackers`] that keep each feature set's
//! active set in sync with the board, a linear [`evaluator`] over the
//! tracked features, [`learning`] rules that adjust its weights from played
//! games, move-selection [`policy`] implementations, and [`persistence`]
//! for weights and the precomputed tables the trackers rely on.

pub mod board;
pub mod error;
pub mod evaluator;
pub mod features;
pub mod history;
pub mod learning;
pub mod move_filter;
pub mod persistence;
pub mod point;
pub mod policy;
pub mod sgf;
pub mod trackers;
pub mod trainer;
pub mod weight;

pub use board::{area_score, Disc, GoBoard, SimpleBoard};
pub use error::{ConfigError, PersistenceError, RuntimeError};
pub use point::{Color, Move, Point};
