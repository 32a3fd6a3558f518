//! Critical-path extraction: the longest serialized chain from root to a
//! leaf, tolerant of small sibling-overlap clock skew (spec §4.4).
//!
//! # Algorithm
//!
//! Unlike a general DAG's longest-path-via-topological-sort, a sanitized
//! trace is a strict tree: every node has exactly one parent. The critical
//! path is built top-down, one parent at a time — sort the parent's
//! children by end time descending, walk the happens-before chain among
//! them, and recurse into each admitted child. There is one critical-path
//! decision per parent, not one global longest-path relaxation.
//!
//! ```text
//! Root [0,1000]
//! ├─ C1 [0,500]    ← admitted (happens-before C2 within tolerance)
//! └─ C2 [499,999]  ← latest-ending, always admitted
//!
//! Critical path: Root -> C2 -> C1
//! ```
//!
//! # Example
//!
//! ```
//! use tracecrit::model::{ProcessInfo, Span, Trace};
//! use tracecrit::critical_path::find_critical_path;
//! use std::collections::HashMap;
//!
//! let mut procs = HashMap::new();
//! procs.insert("p1".to_string(), ProcessInfo { service_name: "S1".into(), hostname: None });
//! let mut trace = Trace::new(procs);
//! let root = trace.push_span(Span::new("A".into(), 0, 100, "O1".into(), "p1".into(), None));
//! let mut child = Span::new("B".into(), 10, 60, "O2".into(), "p1".into(), Some("A".into()));
//! child.parent = Some(root);
//! let child_idx = trace.push_span(child);
//! trace.span_mut(root).add_child(child_idx);
//! trace.set_root(root);
//!
//! let result = find_critical_path(&trace, root);
//! assert_eq!(result.path.len(), 2);
//! ```

use crate::model::{SpanIndex, Trace};

/// Fraction of the parent's duration that two siblings are allowed to
/// overlap by and still be considered serialized (spec §4.4).
const OVERLAP_ALLOWANCE_FRACTION: f64 = 0.01;

/// The critical path through one trace (or subtree), root-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalPathResult {
    pub path: Vec<SpanIndex>,
}

/// Compute the critical path for the subtree rooted at `root`.
pub fn find_critical_path(trace: &Trace, root: SpanIndex) -> CriticalPathResult {
    CriticalPathResult { path: compute(trace, root) }
}

fn compute(trace: &Trace, node: SpanIndex) -> Vec<SpanIndex> {
    let mut path = vec![node];

    let children = trace.span(node).children.clone();
    if children.is_empty() {
        return path;
    }

    let mut sorted_children = children.clone();
    sorted_children.sort_by(|&a, &b| trace.span(b).end_time().cmp(&trace.span(a).end_time()));

    let mut latest = sorted_children[0];
    path.extend(compute(trace, latest));

    for &candidate in &sorted_children[1..] {
        if happens_before(trace, node, &sorted_children, candidate, latest) {
            path.extend(compute(trace, candidate));
            latest = candidate;
        }
    }

    path
}

/// True when `before` happens fully before `later`, with a small-overlap
/// tolerance for clock skew between siblings (spec §4.4).
fn happens_before(
    trace: &Trace,
    parent: SpanIndex,
    all_children: &[SpanIndex],
    before: SpanIndex,
    later: SpanIndex,
) -> bool {
    let before_end = trace.span(before).end_time();
    let before_start = trace.span(before).start_time;
    let later_start = trace.span(later).start_time;
    let later_end = trace.span(later).end_time();

    if before_end < later_start {
        return true;
    }

    let parent_duration = trace.span(parent).duration as f64;
    let overlap_fraction = (before_end - later_start) as f64 / parent_duration;

    if before_end < later_end && before_start < later_start && overlap_fraction < OVERLAP_ALLOWANCE_FRACTION {
        let window_start = later_start;
        let window_end = before_end;
        let endpoints = count_endpoints_in_window(trace, all_children, window_start, window_end);
        if endpoints == 2 {
            return true;
        }
    }

    false
}

/// Count how many of `children`'s start/end timestamps fall within the
/// closed interval `[window_start, window_end]`, counting each endpoint
/// independently (both a child's start and end may land in the window).
fn count_endpoints_in_window(trace: &Trace, children: &[SpanIndex], window_start: i64, window_end: i64) -> usize {
    let mut count = 0;
    for &c in children {
        let span = trace.span(c);
        if span.start_time >= window_start && span.start_time <= window_end {
            count += 1;
        }
        if span.end_time() >= window_start && span.end_time() <= window_end {
            count += 1;
        }
    }
    count
}
