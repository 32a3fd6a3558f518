//! Per-trace metric extraction: inclusive/exclusive time, flat and
//! call-path keyed, plus exemplar tracking (spec §4.5).
//!
//! Exclusive time is accumulated with a double-entry credit/debit scheme
//! while walking the critical path in reverse (leaf to root): a span's own
//! interval credits its exclusive bucket, and that same interval debits its
//! parent's, so time spent inside a child is never double-counted against
//! the parent.
//!
//! # Example
//!
//! ```
//! use tracecrit::model::{ProcessInfo, Span, Trace};
//! use tracecrit::critical_path::find_critical_path;
//! use tracecrit::metrics::extract_metrics;
//! use std::collections::HashMap;
//!
//! let mut procs = HashMap::new();
//! procs.insert("p1".to_string(), ProcessInfo { service_name: "S1".into(), hostname: None });
//! let mut trace = Trace::new(procs);
//! let root = trace.push_span(Span::new("A".into(), 0, 100, "O1".into(), "p1".into(), None));
//! let mut child = Span::new("B".into(), 10, 50, "O2".into(), "p1".into(), Some("A".into()));
//! child.parent = Some(root);
//! let child_idx = trace.push_span(child);
//! trace.span_mut(root).add_child(child_idx);
//! trace.set_root(root);
//!
//! let path = find_critical_path(&trace, root).path;
//! let metrics = extract_metrics(&trace, &path, root);
//! assert_eq!(metrics.inclusive_flat.get("[S1] O1"), Some(&100));
//! ```

use crate::critical_path::CriticalPathResult;
use crate::model::{CallPath, SpanIndex, Trace};
use std::collections::{HashMap, HashSet};

/// The reserved flat-map key spec §4.5 assigns to the root span's own
/// total duration, so every per-operation row has a same-shaped row to
/// compare itself against (spec §4.6's percentile-ratio denominator).
pub const TOTAL_TIME_KEY: &str = "totalTime";

/// A tagged `(trace_id, span_id, value)` triple: the largest observed
/// value for some metric, with the span (and trace) that produced it.
/// Ties keep the first-seen span, matching the reverse-traversal order of
/// the reference accumulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exemplar {
    pub trace_id: Option<String>,
    pub span_id: String,
    pub value: i64,
}

impl Exemplar {
    fn observe(current: Option<Exemplar>, trace_id: Option<String>, span_id: &str, value: i64) -> Exemplar {
        match current {
            Some(existing) if existing.value >= value => existing,
            _ => Exemplar { trace_id, span_id: span_id.to_string(), value },
        }
    }
}

/// The metrics extracted from one trace's critical path.
#[derive(Debug, Clone, Default)]
pub struct MetricSet {
    pub inclusive_flat: HashMap<String, i64>,
    pub exclusive_flat: HashMap<String, i64>,
    pub inclusive_callpath: HashMap<CallPath, i64>,
    pub exclusive_callpath: HashMap<CallPath, i64>,
    pub inclusive_exemplars: HashMap<CallPath, Exemplar>,
    pub exclusive_exemplars: HashMap<CallPath, Exemplar>,
    /// Canonical operation name -> every call-path (ending at that name)
    /// observed along this trace's critical path (spec §3).
    pub call_chain: HashMap<String, HashSet<CallPath>>,
    pub num_nodes: usize,
    pub depth: usize,
    /// The root span's duration, spec §4.5's `total_time` scalar.
    pub total_time: i64,
    pub root_span_id: String,
}

fn accumulate(map: &mut HashMap<String, i64>, key: &str, value: i64) {
    *map.entry(key.to_string()).or_insert(0) += value;
}

fn accumulate_cp(map: &mut HashMap<CallPath, i64>, key: &CallPath, value: i64) {
    *map.entry(key.clone()).or_insert(0) += value;
}

/// Extract inclusive/exclusive metrics by walking `path` (the critical
/// path, root-first) in reverse.
pub fn extract_metrics(trace: &Trace, path: &[SpanIndex], root: SpanIndex) -> MetricSet {
    let mut metrics = MetricSet::default();
    let (num_nodes, depth) = trace.graph_stats(root);
    metrics.num_nodes = num_nodes;
    metrics.depth = depth;
    metrics.total_time = trace.span(root).duration;
    metrics.root_span_id = trace.span(root).span_id.clone();

    for &idx in path {
        let name = trace.canonical_name(idx);
        let call_path = trace.call_path(idx);
        metrics.call_chain.entry(name).or_default().insert(call_path);
    }

    for (i, &idx) in path.iter().enumerate().rev() {
        let span = trace.span(idx);
        let name = trace.canonical_name(idx);
        let call_path = trace.call_path(idx);
        let duration = span.duration;

        accumulate(&mut metrics.inclusive_flat, &name, duration);
        accumulate_cp(&mut metrics.inclusive_callpath, &call_path, duration);
        metrics.inclusive_exemplars.insert(
            call_path.clone(),
            Exemplar::observe(
                metrics.inclusive_exemplars.remove(&call_path),
                trace.trace_id.clone(),
                &span.span_id,
                duration,
            ),
        );

        // Credit this span's own interval to its exclusive bucket.
        accumulate(&mut metrics.exclusive_flat, &name, duration);
        accumulate_cp(&mut metrics.exclusive_callpath, &call_path, duration);

        // Debit the same interval from the parent in the path (if any):
        // the parent's exclusive time must not double-count the child's.
        if i > 0 {
            let parent_idx = path[i - 1];
            let parent_name = trace.canonical_name(parent_idx);
            let parent_call_path = trace.call_path(parent_idx);
            accumulate(&mut metrics.exclusive_flat, &parent_name, -duration);
            accumulate_cp(&mut metrics.exclusive_callpath, &parent_call_path, -duration);
        }
    }

    // Exclusive exemplars track each span's own credited interval, which is
    // simply its duration — independent of how much gets debited from its
    // parent afterward.
    for &idx in path {
        let span = trace.span(idx);
        let call_path = trace.call_path(idx);
        metrics.exclusive_exemplars.insert(
            call_path.clone(),
            Exemplar::observe(
                metrics.exclusive_exemplars.remove(&call_path),
                trace.trace_id.clone(),
                &span.span_id,
                span.duration,
            ),
        );
    }

    clamp_negative_exclusive(&mut metrics);

    // Synthetic row (spec §4.5): the root span's total duration, under
    // both flat maps, giving every operation row a same-shaped denominator
    // row at aggregation time (spec §4.6).
    metrics.inclusive_flat.insert(TOTAL_TIME_KEY.to_string(), metrics.total_time);
    metrics.exclusive_flat.insert(TOTAL_TIME_KEY.to_string(), metrics.total_time);

    metrics
}

/// Post-traversal clamp: small clock-skew residue can leave a parent's
/// exclusive time slightly negative once every child's interval has been
/// debited. Negative values are clamped to 0 and logged at `debug`, never
/// surfaced as an error (spec §4.5).
fn clamp_negative_exclusive(metrics: &mut MetricSet) {
    for (name, value) in metrics.exclusive_flat.iter_mut() {
        if *value < 0 {
            tracing::debug!(operation = %name, value, "negative exclusive time clamped to 0");
            *value = 0;
        }
    }
    for (call_path, value) in metrics.exclusive_callpath.iter_mut() {
        if *value < 0 {
            tracing::debug!(call_path = %call_path, value, "negative exclusive time clamped to 0");
            *value = 0;
        }
    }
}

/// Convenience wrapper combining critical-path computation and extraction.
pub fn metrics_for_trace(trace: &Trace, result: &CriticalPathResult, root: SpanIndex) -> MetricSet {
    extract_metrics(trace, &result.path, root)
}
