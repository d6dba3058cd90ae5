use serde::{Deserialize, Serialize};

use crate::error::SelectionError;
use crate::rng::DrawSource;
use crate::segment::{Segment, SegmentSet};

/// How a segment's category scope is compared with the customer's category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryPolicy {
    #[default]
    Exact,
    IgnoreAsciiCase,
}

impl CategoryPolicy {
    pub fn matches(self, scope: &str, customer: &str) -> bool {
        match self {
            CategoryPolicy::Exact => scope == customer,
            CategoryPolicy::IgnoreAsciiCase => scope.eq_ignore_ascii_case(customer),
        }
    }
}

impl std::str::FromStr for CategoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(CategoryPolicy::Exact),
            "ignore-case" => Ok(CategoryPolicy::IgnoreAsciiCase),
            other => Err(format!("unknown category policy {other:?}")),
        }
    }
}

/// Active segments that apply to `customer_category`, in configuration order.
pub fn eligible<'a>(
    set: &'a SegmentSet,
    customer_category: Option<&str>,
    policy: CategoryPolicy,
) -> Vec<&'a Segment> {
    set.active()
        .filter(|seg| match (seg.scope(), customer_category) {
            (None, _) => true,
            (Some(scope), Some(cat)) => policy.matches(scope, cat),
            (Some(_), None) => false,
        })
        .collect()
}

/// Ordered cumulative-weight walk. Weights are rescaled over `candidates`
/// only; the last candidate absorbs any floating residue as `r` nears 1.
pub fn pick<'a>(candidates: &[&'a Segment], r: f64) -> Result<&'a Segment, SelectionError> {
    let total: f64 = candidates.iter().map(|s| s.probability).sum();
    if candidates.is_empty() || total <= 0.0 {
        return Err(SelectionError::NoEligibleSegment);
    }
    let mut cumulative = 0.0;
    let mut last = None;
    for seg in candidates.iter().copied().filter(|s| s.probability > 0.0) {
        cumulative += seg.probability / total;
        if cumulative > r {
            return Ok(seg);
        }
        last = Some(seg);
    }
    last.ok_or(SelectionError::NoEligibleSegment)
}

/// Draws one winner among the segments eligible for this customer.
pub struct SelectionEngine<'a> {
    draw: &'a dyn DrawSource,
    policy: CategoryPolicy,
}

impl<'a> SelectionEngine<'a> {
    pub fn new(draw: &'a dyn DrawSource, policy: CategoryPolicy) -> Self {
        Self { draw, policy }
    }

    pub fn select<'s>(
        &self,
        set: &'s SegmentSet,
        customer_id: &str,
        customer_category: Option<&str>,
    ) -> Result<&'s Segment, SelectionError> {
        let candidates = eligible(set, customer_category, self.policy);
        if candidates.is_empty() {
            return Err(SelectionError::NoEligibleSegment);
        }
        let r = self.draw.draw(customer_id);
        pick(&candidates, r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::normalize;

    fn set(segments: Vec<Segment>) -> SegmentSet {
        SegmentSet::from_normalized(normalize(segments).unwrap())
    }

    #[test]
    fn walk_covers_unit_interval() {
        let s = set(vec![
            Segment::new("a", "a", "A", 0.25),
            Segment::new("b", "b", "B", 0.75),
        ]);
        let c = eligible(&s, None, CategoryPolicy::Exact);
        assert_eq!(pick(&c, 0.0).unwrap().label, "a");
        assert_eq!(pick(&c, 0.2499).unwrap().label, "a");
        assert_eq!(pick(&c, 0.25).unwrap().label, "b");
        assert_eq!(pick(&c, 0.999_999_999).unwrap().label, "b");
    }

    #[test]
    fn residue_goes_to_last_segment() {
        let thirds = [1.0 / 3.0; 3];
        let segs: Vec<Segment> = thirds
            .iter()
            .enumerate()
            .map(|(i, p)| Segment::new(format!("s{i}"), "r", "C", *p))
            .collect();
        let refs: Vec<&Segment> = segs.iter().collect();
        assert_eq!(pick(&refs, 1.0 - f64::EPSILON).unwrap().label, "s2");
    }

    #[test]
    fn zero_weight_segments_never_win() {
        let s = set(vec![
            Segment::new("zero", "z", "Z", 0.0),
            Segment::new("one", "o", "O", 1.0),
            Segment::new("tail", "t", "T", 0.0),
        ]);
        let c = eligible(&s, None, CategoryPolicy::Exact);
        for r in [0.0, 0.5, 0.999_999] {
            assert_eq!(pick(&c, r).unwrap().label, "one");
        }
    }

    #[test]
    fn category_filter() {
        let s = set(vec![
            Segment::new("any", "a", "A", 0.5),
            Segment::new("books", "b", "B", 0.5).with_category("books"),
            Segment::new("off", "o", "O", 0.5).inactive(),
        ]);
        let labels = |cat, policy| -> Vec<String> {
            eligible(&s, cat, policy).iter().map(|x| x.label.clone()).collect()
        };
        assert_eq!(labels(None, CategoryPolicy::Exact), vec!["any"]);
        assert_eq!(labels(Some("books"), CategoryPolicy::Exact), vec!["any", "books"]);
        assert_eq!(labels(Some("Books"), CategoryPolicy::Exact), vec!["any"]);
        assert_eq!(
            labels(Some("Books"), CategoryPolicy::IgnoreAsciiCase),
            vec!["any", "books"]
        );
    }

    #[test]
    fn no_eligible_segment() {
        let s = set(vec![Segment::new("books", "b", "B", 1.0).with_category("books")]);
        let draw = crate::rng::ProvablyFairRng::new("seed");
        let engine = SelectionEngine::new(&draw, CategoryPolicy::Exact);
        assert_eq!(
            engine.select(&s, "y", Some("electronics")).unwrap_err(),
            SelectionError::NoEligibleSegment
        );
    }
}
