//! Distance metrics and distance-to-score transforms.
//!
//! A vector collection is configured with one [`DistanceMetric`]. Stores
//! report raw distances under that metric (smaller is nearer); the retrieval
//! pipeline turns them into caller-facing scores (larger is better) with the
//! metric's [`ScoreTransform`].
//!
//! | Metric | Distance | Score |
//! |--------|----------|-------|
//! | `cosine` | `1 - cos(a, b)`, in `[0, 2]` | `1 - d` |
//! | `ip` | `1 - a · b` | `1 - d` |
//! | `l2` | `‖a - b‖²` | `1 / (1 + d)` |
//!
//! The distance definitions match the `hnsw:space` options of Chroma, so a
//! remote collection and the local stores rank identically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    L2,
    Ip,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::L2 => "l2",
            DistanceMetric::Ip => "ip",
        }
    }

    /// Distance between two vectors. Vectors of different lengths are
    /// maximally distant.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => {
                if a.len() != b.len() {
                    return 2.0;
                }
                1.0 - cosine_similarity(a, b)
            }
            DistanceMetric::L2 => {
                if a.len() != b.len() {
                    return f32::INFINITY;
                }
                a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
            }
            DistanceMetric::Ip => {
                if a.len() != b.len() {
                    return f32::INFINITY;
                }
                1.0 - a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>()
            }
        }
    }

    /// The score transform keyed to this metric.
    pub fn score_transform(&self) -> ScoreTransform {
        match self {
            DistanceMetric::Cosine | DistanceMetric::Ip => ScoreTransform::ONE_MINUS_DISTANCE,
            DistanceMetric::L2 => ScoreTransform::INVERSE_DISTANCE,
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" => Ok(DistanceMetric::L2),
            "ip" => Ok(DistanceMetric::Ip),
            other => Err(Error::Configuration(format!(
                "unknown distance metric '{}'. Must be cosine, l2, or ip.",
                other
            ))),
        }
    }
}

/// Maps a raw distance to a relevance score.
///
/// `monotonic` records whether the function is strictly decreasing in the
/// distance. When it is, the store's ascending-distance order is already
/// descending-score order; otherwise results must be re-sorted by score.
#[derive(Clone, Copy)]
pub struct ScoreTransform {
    pub name: &'static str,
    pub apply: fn(f32) -> f32,
    pub monotonic: bool,
}

impl ScoreTransform {
    pub const ONE_MINUS_DISTANCE: ScoreTransform = ScoreTransform {
        name: "one_minus_distance",
        apply: one_minus,
        monotonic: true,
    };

    pub const INVERSE_DISTANCE: ScoreTransform = ScoreTransform {
        name: "inverse_distance",
        apply: inverse,
        monotonic: true,
    };

    pub fn score(&self, distance: f32) -> f32 {
        (self.apply)(distance)
    }
}

impl fmt::Debug for ScoreTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoreTransform")
            .field("name", &self.name)
            .field("monotonic", &self.monotonic)
            .finish()
    }
}

fn one_minus(distance: f32) -> f32 {
    1.0 - distance
}

fn inverse(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty, zero-norm, or
/// mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
