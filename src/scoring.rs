//! Score accumulation and type classification.
//!
//! The only deterministic business logic in the crate. Everything here is pure
//! and synchronous: choices go in, a [`ScoreVector`] comes out, a
//! [`RankedOrder`] is derived from it, and a [`TypeKey`] is derived from that.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::axis::Axis;

/// Weight of the confirmed (final) pick.
pub const CONFIRMED_WEIGHT: f64 = 1.0;
/// Weight of an abandoned first pick that differs from the final one.
pub const ABANDONED_WEIGHT: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoringError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ScoringError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

// =============================================================================
// Choice
// =============================================================================

/// One user decision in a quiz step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub axis: Axis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Choice {
    pub fn new(axis: Axis) -> Self {
        Self { axis, label: None }
    }

    pub fn labeled(axis: Axis, label: impl Into<String>) -> Self {
        Self {
            axis,
            label: Some(label.into()),
        }
    }
}

// =============================================================================
// ScoreVector
// =============================================================================

/// Weight per axis. Always complete: every axis has a finite, non-negative value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "ScoreVectorRepr", try_from = "ScoreVectorRepr")]
pub struct ScoreVector {
    weights: [f64; 4],
}

#[derive(Serialize, Deserialize)]
struct ScoreVectorRepr {
    #[serde(rename = "E")]
    e: f64,
    #[serde(rename = "V")]
    v: f64,
    #[serde(rename = "Λ")]
    lambda: f64,
    #[serde(rename = "Ǝ")]
    mirror_e: f64,
}

impl From<ScoreVector> for ScoreVectorRepr {
    fn from(v: ScoreVector) -> Self {
        let [e, v_, lambda, mirror_e] = v.weights;
        Self {
            e,
            v: v_,
            lambda,
            mirror_e,
        }
    }
}

impl TryFrom<ScoreVectorRepr> for ScoreVector {
    type Error = ScoringError;

    fn try_from(r: ScoreVectorRepr) -> Result<Self, Self::Error> {
        ScoreVector::from_weights([r.e, r.v, r.lambda, r.mirror_e])
    }
}

impl ScoreVector {
    /// Build from weights in [`Axis::ALL`] order.
    pub fn from_weights(weights: [f64; 4]) -> Result<Self, ScoringError> {
        for (axis, w) in Axis::ALL.iter().zip(weights) {
            if !w.is_finite() || w < 0.0 {
                return Err(ScoringError::invalid(format!(
                    "weight for {axis} must be finite and >= 0, got {w}"
                )));
            }
        }
        Ok(Self { weights })
    }

    pub fn get(&self, axis: Axis) -> f64 {
        self.weights[axis.index()]
    }

    fn add(&mut self, axis: Axis, weight: f64) {
        self.weights[axis.index()] += weight;
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Axis, f64)> + '_ {
        Axis::ALL.iter().map(move |a| (*a, self.get(*a)))
    }
}

/// Convert a sequence of choices into a [`ScoreVector`].
///
/// The last choice is the confirmed pick and gets [`CONFIRMED_WEIGHT`]. The
/// first choice, when it differs from the last, was abandoned and gets
/// [`ABANDONED_WEIGHT`]. Intermediate choices carry no weight.
pub fn accumulate(choices: &[Choice]) -> Result<ScoreVector, ScoringError> {
    let (first, last) = match (choices.first(), choices.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(ScoringError::invalid("at least one choice is required")),
    };

    let mut vector = ScoreVector::default();
    vector.add(last.axis, CONFIRMED_WEIGHT);
    if first.axis != last.axis {
        vector.add(first.axis, ABANDONED_WEIGHT);
    }
    Ok(vector)
}

// =============================================================================
// RankedOrder
// =============================================================================

/// All four axes, descending by weight. Ties resolve by [`Axis::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<Axis>", try_from = "Vec<Axis>")]
pub struct RankedOrder([Axis; 4]);

impl RankedOrder {
    pub fn axes(&self) -> &[Axis; 4] {
        &self.0
    }

    /// Highest-ranked axis.
    pub fn winner(&self) -> Axis {
        self.0[0]
    }

    pub fn top2(&self) -> [Axis; 2] {
        [self.0[0], self.0[1]]
    }
}

impl TryFrom<&[Axis]> for RankedOrder {
    type Error = ScoringError;

    fn try_from(axes: &[Axis]) -> Result<Self, Self::Error> {
        let arr: [Axis; 4] = axes.try_into().map_err(|_| {
            ScoringError::invalid(format!(
                "ranked order must contain exactly 4 axes, got {}",
                axes.len()
            ))
        })?;
        let mut seen = [false; 4];
        for axis in arr {
            if std::mem::replace(&mut seen[axis.index()], true) {
                return Err(ScoringError::invalid(format!(
                    "ranked order contains {axis} more than once"
                )));
            }
        }
        Ok(Self(arr))
    }
}

impl TryFrom<Vec<Axis>> for RankedOrder {
    type Error = ScoringError;

    fn try_from(axes: Vec<Axis>) -> Result<Self, Self::Error> {
        RankedOrder::try_from(axes.as_slice())
    }
}

impl From<RankedOrder> for Vec<Axis> {
    fn from(order: RankedOrder) -> Self {
        order.0.to_vec()
    }
}

impl fmt::Display for RankedOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for axis in self.0 {
            f.write_str(axis.symbol())?;
        }
        Ok(())
    }
}

/// Sort axes descending by weight.
pub fn rank(vector: &ScoreVector) -> RankedOrder {
    let mut axes = Axis::ALL;
    axes.sort_by(|a, b| {
        vector
            .get(*b)
            .partial_cmp(&vector.get(*a))
            .unwrap_or(Ordering::Equal)
            .then(a.index().cmp(&b.index()))
    });
    RankedOrder(axes)
}

// =============================================================================
// TypeKey
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKey {
    /// E or V in the top two.
    #[serde(rename = "EVΛƎ")]
    Future,
    /// Top two are Λ and Ǝ.
    #[serde(rename = "EΛVƎ")]
    Reality,
}

impl TypeKey {
    pub const ALL: [TypeKey; 2] = [TypeKey::Future, TypeKey::Reality];

    pub fn as_str(self) -> &'static str {
        match self {
            TypeKey::Future => "EVΛƎ",
            TypeKey::Reality => "EΛVƎ",
        }
    }

    pub fn parse(raw: &str) -> Option<TypeKey> {
        match raw.trim() {
            "EVΛƎ" | "EVLR" | "EVL∃" => Some(TypeKey::Future),
            "EΛVƎ" | "ELVR" | "ELV∃" => Some(TypeKey::Reality),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TypeKey::Future => "future-oriented",
            TypeKey::Reality => "reality-oriented",
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify(order: &RankedOrder) -> TypeKey {
    if order
        .top2()
        .iter()
        .any(|a| matches!(a, Axis::E | Axis::V))
    {
        TypeKey::Future
    } else {
        TypeKey::Reality
    }
}

/// Classify an unvalidated axis sequence.
pub fn classify_axes(axes: &[Axis]) -> Result<TypeKey, ScoringError> {
    Ok(classify(&RankedOrder::try_from(axes)?))
}

pub fn classify_vector(vector: &ScoreVector) -> TypeKey {
    classify(&rank(vector))
}
