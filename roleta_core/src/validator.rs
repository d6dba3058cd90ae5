use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ConfigError, StoreError, ValidationError};
use crate::segment::{Segment, SegmentSet};

/// Existence check into the external coupon catalog.
#[async_trait]
pub trait CouponCatalog: Send + Sync {
    async fn coupon_exists(&self, code: &str) -> Result<bool, StoreError>;
}

/// In-memory catalog, mostly for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    codes: HashSet<String>,
}

impl MemoryCatalog {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl CouponCatalog for MemoryCatalog {
    async fn coupon_exists(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.codes.contains(code))
    }
}

/// Checks a submitted configuration and normalizes its active probabilities.
pub struct SegmentValidator<'a> {
    catalog: &'a dyn CouponCatalog,
}

impl<'a> SegmentValidator<'a> {
    pub fn new(catalog: &'a dyn CouponCatalog) -> Self {
        Self { catalog }
    }

    pub async fn validate(&self, segments: Vec<Segment>) -> Result<SegmentSet, ConfigError> {
        let segments = normalize(segments)?;
        for seg in &segments {
            if !self.catalog.coupon_exists(&seg.coupon_code).await? {
                return Err(ValidationError::UnknownCoupon {
                    code: seg.coupon_code.clone(),
                }
                .into());
            }
        }
        let set = SegmentSet::from_normalized(segments);
        debug!(segments = set.len(), active_sum = set.active_sum(), "configuration validated");
        Ok(set)
    }
}

/// Structural checks plus rescaling of active probabilities by their sum.
/// Inactive segments keep their stored probability.
pub fn normalize(mut segments: Vec<Segment>) -> Result<Vec<Segment>, ValidationError> {
    let active_sum = check_structure(&segments)?;
    for seg in segments.iter_mut().filter(|s| s.active) {
        seg.probability /= active_sum;
    }
    Ok(segments)
}

/// Runs the structural checks and returns the active probability sum.
pub(crate) fn check_structure(segments: &[Segment]) -> Result<f64, ValidationError> {
    if segments.is_empty() {
        return Err(ValidationError::Empty);
    }
    for (index, seg) in segments.iter().enumerate() {
        check_segment(index, seg)?;
    }
    let active_sum: f64 = segments
        .iter()
        .filter(|s| s.active)
        .map(|s| s.probability)
        .sum();
    if active_sum <= 0.0 {
        return Err(ValidationError::NoWinnableSegments);
    }
    Ok(active_sum)
}

fn check_segment(index: usize, seg: &Segment) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidSegment {
        index,
        reason: reason.to_string(),
    };
    if seg.label.trim().is_empty() {
        return Err(invalid("label is empty"));
    }
    if seg.reward.trim().is_empty() {
        return Err(invalid("reward is empty"));
    }
    if seg.coupon_code.trim().is_empty() {
        return Err(invalid("coupon code is empty"));
    }
    if !seg.probability.is_finite() || !(0.0..=1.0).contains(&seg.probability) {
        return Err(invalid("probability must be within [0, 1]"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::PROBABILITY_EPSILON;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new(["A", "B", "C"])
    }

    #[tokio::test]
    async fn normalizes_active_sum_to_one() {
        let cat = catalog();
        let set = SegmentValidator::new(&cat)
            .validate(vec![
                Segment::new("a", "5% off", "A", 0.2),
                Segment::new("b", "10% off", "B", 0.2),
                Segment::new("c", "free ship", "C", 0.9).inactive(),
            ])
            .await
            .unwrap();
        assert!((set.active_sum() - 1.0).abs() < PROBABILITY_EPSILON);
        assert!((set.segments()[0].probability - 0.5).abs() < PROBABILITY_EPSILON);
        // inactive passes through untouched
        assert_eq!(set.segments()[2].probability, 0.9);
    }

    #[tokio::test]
    async fn rejects_zero_active_sum() {
        let cat = catalog();
        let err = SegmentValidator::new(&cat)
            .validate(vec![
                Segment::new("a", "5% off", "A", 0.0),
                Segment::new("b", "10% off", "B", 0.7).inactive(),
            ])
            .await
            .unwrap_err();
        assert_eq!(err, ConfigError::Invalid(ValidationError::NoWinnableSegments));
    }

    #[tokio::test]
    async fn rejects_empty_and_unknown_coupon() {
        let cat = catalog();
        let v = SegmentValidator::new(&cat);
        assert_eq!(
            v.validate(vec![]).await.unwrap_err(),
            ConfigError::Invalid(ValidationError::Empty)
        );
        let err = v
            .validate(vec![
                Segment::new("a", "5% off", "A", 0.5),
                Segment::new("z", "50% off", "NOPE", 0.5),
            ])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid(ValidationError::UnknownCoupon { code: "NOPE".into() })
        );
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let err = normalize(vec![
            Segment::new("a", "5% off", "A", 0.5),
            Segment::new("b", "10% off", "B", f64::NAN),
        ])
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSegment { index: 1, .. }));
        let err = normalize(vec![Segment::new("", "5% off", "A", 0.5)]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSegment { index: 0, .. }));
    }
}
