use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validator::{check_structure, normalize};

/// Tolerance used when checking that active probabilities sum to one.
pub const PROBABILITY_EPSILON: f64 = 1e-6;

/// One reward slice of the wheel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub label: String,
    pub reward: String,
    pub coupon_code: String,
    pub probability: f64,
    #[serde(default)]
    pub color: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

fn default_active() -> bool {
    true
}

impl Segment {
    pub fn new(
        label: impl Into<String>,
        reward: impl Into<String>,
        coupon_code: impl Into<String>,
        probability: f64,
    ) -> Self {
        Self {
            label: label.into(),
            reward: reward.into(),
            coupon_code: coupon_code.into(),
            probability,
            color: String::new(),
            active: true,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Category scope, with an empty string treated as unrestricted.
    pub fn scope(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.is_empty())
    }
}

/// A committed, normalized wheel configuration.
///
/// Only [`crate::validator::SegmentValidator`] builds one, so every
/// `SegmentSet` is non-empty and its active probabilities sum to one.
/// Deserializing runs the same structural checks and normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Segment>", into = "Vec<Segment>")]
pub struct SegmentSet(Vec<Segment>);

impl TryFrom<Vec<Segment>> for SegmentSet {
    type Error = ValidationError;

    fn try_from(segments: Vec<Segment>) -> Result<Self, Self::Error> {
        // already-normalized input is kept as is so stored sets reload unchanged
        if (check_structure(&segments)? - 1.0).abs() <= PROBABILITY_EPSILON {
            return Ok(Self(segments));
        }
        normalize(segments).map(Self)
    }
}

impl From<SegmentSet> for Vec<Segment> {
    fn from(set: SegmentSet) -> Self {
        set.0
    }
}

impl SegmentSet {
    pub(crate) fn from_normalized(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn active(&self) -> impl Iterator<Item = &Segment> {
        self.0.iter().filter(|s| s.active)
    }

    pub fn active_sum(&self) -> f64 {
        self.active().map(|s| s.probability).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<Segment> {
        self.0
    }
}
