//! Literal end-to-end scenarios (spec §8, S1–S6): build a trace from a
//! Jaeger-shaped JSON blob, sanitize it, extract the critical path and
//! metrics, and check the documented expected outcome.

use tracecrit::critical_path::find_critical_path;
use tracecrit::graph_builder::{build_trace, RootTraceMode, TraceBlob};
use tracecrit::metrics::extract_metrics;
use tracecrit::model::CallPath;
use tracecrit::sanitizer::sanitize;

fn run(json: &str, service: &str, operation: &str, mode: RootTraceMode) -> (tracecrit::model::Trace, tracecrit::model::SpanIndex) {
    let blob: TraceBlob = serde_json::from_str(json).unwrap();
    let mut trace = build_trace(&blob, service, operation, mode).unwrap();
    let root = trace.root.unwrap();
    sanitize(&mut trace, root);
    (trace, root)
}

#[test]
fn s1_simple_parent_child_containment() {
    let json = r#"{"data": [{"traceID":"t1","processes":{"p1":{"serviceName":"checkout","tags":[]}},
        "spans": [
          {"spanID":"A","operationName":"handle","startTime":0,"duration":100,"processID":"p1","references":[]},
          {"spanID":"B","operationName":"db_query","startTime":10,"duration":60,"processID":"p1","references":[{"refType":"CHILD_OF","spanID":"A"}]}
        ]}]}"#;
    let (trace, root) = run(json, "checkout", "handle", RootTraceMode::Strict);
    let path = find_critical_path(&trace, root).path;
    assert_eq!(path.len(), 2);
    let metrics = extract_metrics(&trace, &path, root);
    assert_eq!(metrics.inclusive_flat["[checkout] handle"], 100);
    assert_eq!(metrics.exclusive_flat["totalTime"], 100);
}

#[test]
fn s2_trailing_overflow_is_truncated_before_critical_path() {
    let json = r#"{"data": [{"traceID":"t1","processes":{"p1":{"serviceName":"checkout","tags":[]}},
        "spans": [
          {"spanID":"A","operationName":"handle","startTime":0,"duration":100,"processID":"p1","references":[]},
          {"spanID":"B","operationName":"db_query","startTime":90,"duration":50,"processID":"p1","references":[{"refType":"CHILD_OF","spanID":"A"}]}
        ]}]}"#;
    let (trace, root) = run(json, "checkout", "handle", RootTraceMode::Strict);
    let child = trace.span(trace.span(root).children[0]);
    assert_eq!(child.end_time(), 100);
}

#[test]
fn s3_disjoint_child_is_dropped_from_critical_path() {
    let json = r#"{"data": [{"traceID":"t1","processes":{"p1":{"serviceName":"checkout","tags":[]}},
        "spans": [
          {"spanID":"A","operationName":"handle","startTime":0,"duration":100,"processID":"p1","references":[]},
          {"spanID":"B","operationName":"late_retry","startTime":200,"duration":10,"processID":"p1","references":[{"refType":"CHILD_OF","spanID":"A"}]}
        ]}]}"#;
    let (trace, root) = run(json, "checkout", "handle", RootTraceMode::Strict);
    assert!(trace.span(root).children.is_empty());
    let path = find_critical_path(&trace, root).path;
    assert_eq!(path, vec![root]);
}

#[test]
fn s4_parallel_siblings_latest_ending_wins() {
    let json = r#"{"data": [{"traceID":"t1","processes":{"p1":{"serviceName":"checkout","tags":[]}},
        "spans": [
          {"spanID":"A","operationName":"handle","startTime":0,"duration":1000,"processID":"p1","references":[]},
          {"spanID":"C1","operationName":"cache_lookup","startTime":0,"duration":500,"processID":"p1","references":[{"refType":"CHILD_OF","spanID":"A"}]},
          {"spanID":"C2","operationName":"db_query","startTime":499,"duration":500,"processID":"p1","references":[{"refType":"CHILD_OF","spanID":"A"}]}
        ]}]}"#;
    let (trace, root) = run(json, "checkout", "handle", RootTraceMode::Strict);
    let path = find_critical_path(&trace, root).path;
    let names: Vec<String> = path.iter().map(|&idx| trace.canonical_name(idx)).collect();
    assert_eq!(names, vec!["[checkout] handle".to_string(), "[checkout] db_query".to_string(), "[checkout] cache_lookup".to_string()]);
}

#[test]
fn s5_lenient_root_mode_finds_nested_operation_and_detaches() {
    let json = r#"{"data": [{"traceID":"t1","processes":{"p1":{"serviceName":"gateway","tags":[]},"p2":{"serviceName":"checkout","tags":[]}},
        "spans": [
          {"spanID":"A","operationName":"ingress","startTime":0,"duration":1000,"processID":"p1","references":[]},
          {"spanID":"B","operationName":"handle","startTime":10,"duration":500,"processID":"p2","references":[{"refType":"CHILD_OF","spanID":"A"}]}
        ]}]}"#;
    let (trace, root) = run(json, "checkout", "handle", RootTraceMode::Lenient);
    assert_eq!(trace.canonical_name(root), "[checkout] handle");
    assert!(trace.span(root).parent.is_none());
}

#[test]
fn s6_exemplar_keeps_first_seen_on_tie() {
    let json = r#"{"data": [{"traceID":"t1","processes":{"p1":{"serviceName":"checkout","tags":[]}},
        "spans": [
          {"spanID":"A","operationName":"handle","startTime":0,"duration":1000,"processID":"p1","references":[]},
          {"spanID":"C1","operationName":"db_query","startTime":0,"duration":300,"processID":"p1","references":[{"refType":"CHILD_OF","spanID":"A"}]},
          {"spanID":"C2","operationName":"db_query","startTime":400,"duration":300,"processID":"p1","references":[{"refType":"CHILD_OF","spanID":"A"}]}
        ]}]}"#;
    let (trace, root) = run(json, "checkout", "handle", RootTraceMode::Strict);
    let path = find_critical_path(&trace, root).path;
    let metrics = extract_metrics(&trace, &path, root);
    // C1 and C2 are both direct children of the same root call, so they
    // share one call-path; the tie is broken within that single bucket.
    let call_path = CallPath("[checkout] handle->[checkout] db_query".to_string());
    let exemplar = &metrics.inclusive_exemplars[&call_path];
    assert_eq!(exemplar.value, 300);
    // Critical path is [root, C2, C1]; reverse traversal visits C1 before
    // C2, so on a value tie the first-seen span (C1) must win, not C2.
    assert_eq!(exemplar.span_id, "C1");
}
