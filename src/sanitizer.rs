//! Temporal sanitization: repairs clock-skew artifacts so every child span's
//! interval is contained in its parent's (spec §4.3).
//!
//! # Example
//!
//! ```
//! use tracecrit::model::{ProcessInfo, Span, Trace};
//! use tracecrit::sanitizer::sanitize;
//! use std::collections::HashMap;
//!
//! let mut procs = HashMap::new();
//! procs.insert("p1".to_string(), ProcessInfo { service_name: "S1".into(), hostname: None });
//! let mut trace = Trace::new(procs);
//! let root = trace.push_span(Span::new("A".into(), 0, 100, "O1".into(), "p1".into(), None));
//! let mut child = Span::new("B".into(), 90, 50, "O2".into(), "p1".into(), Some("A".into()));
//! child.parent = Some(root);
//! let child_idx = trace.push_span(child);
//! trace.span_mut(root).add_child(child_idx);
//! trace.set_root(root);
//!
//! let report = sanitize(&mut trace, root);
//! assert_eq!(trace.span(child_idx).end_time(), 100);
//! assert_eq!(report.shrink_counter, 1);
//! ```

use crate::model::{SpanIndex, Trace};
use tracing::debug;

/// Diagnostics from one sanitization pass (spec §4.3: "each detach and
/// shrink is counted"). Never surfaced as an error — logged at `debug`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub total_shrink: i64,
    pub shrink_counter: u64,
    pub total_drop: u64,
}

/// Recursively normalize `root`'s subtree so every child is temporally
/// contained in its parent, per the four cases in spec §4.3.
pub fn sanitize(trace: &mut Trace, root: SpanIndex) -> SanitizeReport {
    let mut report = SanitizeReport::default();
    sanitize_node(trace, root, &mut report);
    report
}

fn sanitize_node(trace: &mut Trace, parent: SpanIndex, report: &mut SanitizeReport) {
    let parent_start = trace.span(parent).start_time;
    let parent_end = trace.span(parent).end_time();
    let children = trace.span(parent).children.clone();

    let mut to_detach = Vec::new();
    for child in children {
        let child_start = trace.span(child).start_time;
        let child_end = trace.span(child).end_time();

        if child_start >= parent_start && child_end <= parent_end {
            // Case 1: contained.
            sanitize_node(trace, child, report);
        } else if child_start < parent_start && child_end <= parent_end && child_end > parent_start {
            // Case 2: leading overflow — truncate the start.
            let shrunk = parent_start - child_start;
            report.total_shrink += shrunk;
            report.shrink_counter += 1;
            {
                let c = trace.span_mut(child);
                c.start_time = parent_start;
                c.duration -= shrunk;
            }
            debug!(parent = %trace.span(parent).span_id, child = %trace.span(child).span_id, shrunk, "leading overflow truncated");
            sanitize_node(trace, child, report);
        } else if child_start >= parent_start && child_end > parent_end && child_start < parent_end {
            // Case 3: trailing overflow — truncate the end.
            let shrunk = child_end - parent_end;
            report.total_shrink += shrunk;
            report.shrink_counter += 1;
            {
                let c = trace.span_mut(child);
                c.duration -= shrunk;
            }
            debug!(parent = %trace.span(parent).span_id, child = %trace.span(child).span_id, shrunk, "trailing overflow truncated");
            sanitize_node(trace, child, report);
        } else {
            // Case 4: disjoint — drop the child (and thus its descendants).
            report.total_drop += 1;
            debug!(parent = %trace.span(parent).span_id, child = %trace.span(child).span_id, "child disjoint from parent, dropped");
            to_detach.push(child);
        }
    }

    for child in to_detach {
        trace.detach(child);
    }
}
