use crate::prelude::{SiteId, TimeWindow};
use std::collections::{BTreeMap, BTreeSet};

/// Largest set of sites whose windows overlap a common anchor window.
///
/// The anchor is the window overlapping the most others (itself included);
/// ties go to the earliest start, then the smallest site id. The returned
/// window is the union of the group's windows.
pub fn overlap_group(
    windows: &BTreeMap<SiteId, TimeWindow>,
    tolerance: f64,
) -> Option<(BTreeSet<SiteId>, TimeWindow)> {
    let mut best: Option<(SiteId, usize, f64)> = None;
    for (&id, window) in windows {
        let count = windows
            .values()
            .filter(|other| window.overlaps(other, tolerance))
            .count();
        let better = match best {
            None => true,
            Some((_, best_count, best_start)) => {
                count > best_count || (count == best_count && window.start < best_start)
            }
        };
        if better {
            best = Some((id, count, window.start));
        }
    }

    let (anchor_id, _, _) = best?;
    let anchor = windows[&anchor_id];
    let mut group = BTreeSet::new();
    let mut span = anchor;
    for (&id, window) in windows {
        if anchor.overlaps(window, tolerance) {
            group.insert(id);
            span = span.union(window);
        }
    }
    Some((group, span))
}

/// Windows of `width` seconds centred on every multiple of `step` from
/// `floor(span.start / step)` to `ceil(span.end / step)`. A non-positive
/// step or width yields no windows.
pub fn step_windows(span: TimeWindow, width: f64, step: f64) -> Vec<TimeWindow> {
    if step <= 0.0 || width <= 0.0 || span.end < span.start {
        return Vec::new();
    }
    let first = (span.start / step).floor() as i64;
    let last = (span.end / step).ceil() as i64;
    (first..=last)
        .map(|k| TimeWindow::centred(k as f64 * step, width))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_prefers_most_overlaps() {
        let windows = BTreeMap::from([
            (1, TimeWindow::new(0.0, 1.0)),
            (2, TimeWindow::new(0.5, 1.5)),
            (3, TimeWindow::new(1.2, 2.0)),
            (4, TimeWindow::new(5.0, 6.0)),
        ]);
        let (group, span) = overlap_group(&windows, 0.0).unwrap();
        assert_eq!(group, BTreeSet::from([1, 2, 3]));
        assert_eq!(span, TimeWindow::new(0.0, 2.0));
    }

    #[test]
    fn group_tie_breaks_on_earliest_start() {
        let windows = BTreeMap::from([
            (7, TimeWindow::new(10.0, 11.0)),
            (3, TimeWindow::new(0.0, 1.0)),
        ]);
        let (group, _) = overlap_group(&windows, 0.02).unwrap();
        assert_eq!(group, BTreeSet::from([3]));
        assert!(overlap_group(&BTreeMap::new(), 0.0).is_none());
    }

    #[test]
    fn tolerance_bridges_small_gaps() {
        let windows = BTreeMap::from([
            (1, TimeWindow::new(0.0, 1.0)),
            (2, TimeWindow::new(1.01, 2.0)),
        ]);
        assert_eq!(overlap_group(&windows, 0.0).unwrap().0.len(), 1);
        assert_eq!(overlap_group(&windows, 0.02).unwrap().0.len(), 2);
    }

    #[test]
    fn step_windows_cover_span() {
        let windows = step_windows(TimeWindow::new(0.3, 2.1), 1.0, 0.5);
        assert_eq!(windows.len(), 6);
        assert_eq!(windows[0], TimeWindow::new(-0.5, 0.5));
        assert_eq!(windows[5], TimeWindow::new(2.0, 3.0));
        assert!(step_windows(TimeWindow::new(0.0, 1.0), 1.0, 0.0).is_empty());
    }
}
