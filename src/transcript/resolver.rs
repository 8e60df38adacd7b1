//! Active-segment resolution
//!
//! Pure lookups over a slice of segments sorted by `start`. A linear scan is
//! plenty for transcripts of a few hundred segments; callers only depend on
//! the first-match contract, so the scan can be swapped for a binary search
//! later without touching them.

use super::Segment;

/// First segment whose `[start, end]` interval contains `time`
///
/// When two touching segments share a boundary, the earlier one wins.
pub fn resolve(segments: &[Segment], time: f64) -> Option<&Segment> {
    resolve_index(segments, time).map(|i| &segments[i])
}

/// Index form of [`resolve`]
pub fn resolve_index(segments: &[Segment], time: f64) -> Option<usize> {
    if !time.is_finite() {
        return None;
    }
    segments.iter().position(|segment| segment.contains(time))
}

/// The first `limit` segments starting strictly after `time`, in order
pub fn upcoming(segments: &[Segment], time: f64, limit: usize) -> Vec<&Segment> {
    if limit == 0 || time.is_nan() {
        return Vec::new();
    }
    segments
        .iter()
        .filter(|segment| segment.start > time)
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> Vec<Segment> {
        vec![
            Segment::new(0.0, 5.0, "a"),
            Segment::new(5.0, 5.0, "b"),
            Segment::new(12.0, 3.0, "c"),
        ]
    }

    fn text(segment: Option<&Segment>) -> Option<&str> {
        segment.map(|s| s.text.as_str())
    }

    #[test]
    fn test_resolve_scenario() {
        let segments = scenario();
        assert_eq!(text(resolve(&segments, 7.0)), Some("b"));
        assert_eq!(text(resolve(&segments, 9.0)), Some("b"));
        assert_eq!(text(resolve(&segments, 11.0)), None);
        assert_eq!(text(resolve(&segments, 13.0)), Some("c"));
    }

    #[test]
    fn test_resolve_gap_returns_none() {
        let segments = vec![Segment::new(0.0, 5.0, "a"), Segment::new(8.0, 2.0, "b")];
        assert!(resolve(&segments, 6.5).is_none());
    }

    #[test]
    fn test_resolve_outside_range() {
        let segments = vec![Segment::new(2.0, 3.0, "a"), Segment::new(5.0, 5.0, "b")];
        assert!(resolve(&segments, 1.99).is_none());
        assert!(resolve(&segments, 10.01).is_none());
        assert!(resolve(&[], 3.0).is_none());
    }

    #[test]
    fn test_shared_boundary_prefers_earlier_segment() {
        let segments = scenario();
        assert_eq!(text(resolve(&segments, 5.0)), Some("a"));
        assert_eq!(resolve_index(&segments, 5.0), Some(0));
    }

    #[test]
    fn test_overlap_prefers_first_in_order() {
        let segments = vec![Segment::new(0.0, 6.0, "a"), Segment::new(5.0, 5.0, "b")];
        assert_eq!(text(resolve(&segments, 5.5)), Some("a"));
        assert_eq!(text(resolve(&segments, 6.5)), Some("b"));
    }

    #[test]
    fn test_non_finite_time() {
        let segments = scenario();
        assert!(resolve(&segments, f64::NAN).is_none());
        assert!(resolve(&segments, f64::INFINITY).is_none());
        assert!(upcoming(&segments, f64::NAN, 3).is_empty());
    }

    #[test]
    fn test_upcoming_scenario() {
        let segments = scenario();
        let next: Vec<&str> = upcoming(&segments, 1.0, 2).iter().map(|s| s.text.as_str()).collect();
        assert_eq!(next, vec!["b", "c"]);
    }

    #[test]
    fn test_upcoming_respects_limit_and_strictness() {
        let segments = scenario();
        assert_eq!(upcoming(&segments, 5.0, 10).len(), 1);
        assert_eq!(upcoming(&segments, -1.0, 2).len(), 2);
        assert!(upcoming(&segments, 0.0, 0).is_empty());
        assert!(upcoming(&segments, 20.0, 3).is_empty());
    }

    #[test]
    fn test_resolved_segment_contains_time_on_a_grid() {
        let segments: Vec<Segment> = (0..200)
            .map(|i| Segment::new(i as f64 * 2.5, 2.0, format!("line {}", i)))
            .collect();

        let mut t = -1.0;
        while t < 520.0 {
            if let Some(segment) = resolve(&segments, t) {
                assert!(segment.start <= t && t <= segment.end);
            }
            let next = upcoming(&segments, t, 3);
            assert!(next.len() <= 3);
            assert!(next.iter().all(|s| s.start > t));
            assert!(next.windows(2).all(|w| w[0].start < w[1].start));
            t += 0.37;
        }
    }
}
