//! Reconstructs a well-formed span tree from a flat, Jaeger-shaped blob
//! (spec §4.2).
//!
//! # Example
//!
//! ```
//! use tracecrit::graph_builder::{build_trace, RootTraceMode, TraceBlob};
//!
//! let json = r#"{
//!   "data": [{
//!     "traceID": "t1",
//!     "processes": { "p1": { "serviceName": "S1", "tags": [] },
//!                    "p2": { "serviceName": "S2", "tags": [] } },
//!     "spans": [
//!       { "spanID": "A", "operationName": "O1", "startTime": 0, "duration": 100,
//!         "processID": "p1", "references": [] },
//!       { "spanID": "B", "operationName": "O2", "startTime": 10, "duration": 50,
//!         "processID": "p2", "references": [{"refType": "CHILD_OF", "spanID": "A"}] }
//!     ]
//!   }]
//! }"#;
//!
//! let blob: TraceBlob = serde_json::from_str(json).unwrap();
//! let trace = build_trace(&blob, "S1", "O1", RootTraceMode::Strict).unwrap();
//! assert_eq!(trace.len(), 2);
//! ```

use crate::error::AnalysisError;
use crate::model::{ProcessInfo, Span, SpanIndex, Trace};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Root-selection policy (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootTraceMode {
    /// Exactly one potential root must exist and must match
    /// `required_service`/`required_operation`.
    Strict,
    /// Depth-first search from each potential root for the first span
    /// matching `required_service`/`required_operation`; it is detached
    /// from any ancestor and becomes the working root.
    Lenient,
}

#[derive(Debug, Deserialize)]
pub struct TraceBlob {
    pub data: Vec<TraceData>,
    #[serde(default)]
    pub testing: Vec<HashMap<String, i64>>,
}

#[derive(Debug, Deserialize)]
pub struct TraceData {
    #[serde(default, rename = "traceID")]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub processes: HashMap<String, ProcessInput>,
    pub spans: Vec<SpanInput>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessInput {
    #[serde(rename = "serviceName")]
    pub service_name: String,
    #[serde(default)]
    pub tags: Vec<TagInput>,
}

#[derive(Debug, Deserialize)]
pub struct TagInput {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct SpanInput {
    #[serde(rename = "spanID")]
    pub span_id: String,
    #[serde(rename = "operationName")]
    pub operation_name: String,
    #[serde(rename = "startTime")]
    pub start_time: i64,
    pub duration: i64,
    #[serde(rename = "processID")]
    pub process_id: String,
    #[serde(default)]
    pub references: Vec<ReferenceInput>,
}

#[derive(Debug, Deserialize)]
pub struct ReferenceInput {
    #[serde(rename = "refType")]
    pub ref_type: String,
    #[serde(rename = "spanID")]
    pub span_id: String,
}

/// Build and root-select a [`Trace`] from a decoded blob.
///
/// # Errors
///
/// Returns [`AnalysisError::NoRoot`] if root selection fails under the
/// given `mode`. Malformed JSON is rejected earlier, at deserialization
/// time, by the caller (`serde_json::from_str` returning `Err`).
pub fn build_trace(
    blob: &TraceBlob,
    required_service: &str,
    required_operation: &str,
    mode: RootTraceMode,
) -> Result<Trace, AnalysisError> {
    let mut processes = HashMap::new();
    let mut hostmap = HashMap::new();
    for data in &blob.data {
        for (pid, p) in &data.processes {
            let hostname = p.tags.iter().find(|t| t.key == "hostname").map(|t| t.value.clone());
            if let Some(h) = &hostname {
                hostmap.insert(pid.clone(), h.clone());
            }
            processes.insert(pid.clone(), ProcessInfo { service_name: p.service_name.clone(), hostname });
        }
    }

    let mut trace = Trace::new(processes);
    trace.hostmap = hostmap;
    trace.trace_id = blob.data.first().and_then(|d| d.trace_id.clone());

    // Pass 1: instantiate a Span per input span.
    let mut id_to_index: HashMap<String, SpanIndex> = HashMap::new();
    for data in &blob.data {
        for span_input in &data.spans {
            // Only the first CHILD_OF reference is used as the parent hint.
            let parent_hint = span_input
                .references
                .iter()
                .find(|r| r.ref_type == "CHILD_OF")
                .map(|r| r.span_id.clone());

            let span = Span::new(
                span_input.span_id.clone(),
                span_input.start_time,
                span_input.duration,
                span_input.operation_name.clone(),
                span_input.process_id.clone(),
                parent_hint,
            );
            let idx = trace.push_span(span);
            id_to_index.insert(span_input.span_id.clone(), idx);
        }
    }

    // Pass 2: link parent/child relations; collect potential roots.
    let mut potential_roots: Vec<SpanIndex> = Vec::new();
    let indices: Vec<SpanIndex> = (0..trace.len()).map(SpanIndex).collect();
    for &idx in &indices {
        let parent_hint = trace.span(idx).parent_span_id.clone();
        let Some(parent_id) = parent_hint else {
            potential_roots.push(idx);
            continue;
        };
        match id_to_index.get(&parent_id) {
            Some(&parent_idx) => {
                trace.span_mut(idx).parent = Some(parent_idx);
                trace.span_mut(parent_idx).add_child(idx);
            }
            None => {
                debug!(span_id = %trace.span(idx).span_id, parent_id, "parent not present in span table");
                potential_roots.push(idx);
            }
        }
    }

    // Pass 4: capture self-check testing data, if present.
    if let Some(first) = blob.testing.first() {
        trace.testing = Some(first.clone());
    }

    select_root(&mut trace, &potential_roots, required_service, required_operation, mode)?;
    Ok(trace)
}

fn matches_required(trace: &Trace, idx: SpanIndex, required_service: &str, required_operation: &str) -> bool {
    trace.canonical_name(idx) == format!("[{}] {}", required_service, required_operation)
}

fn find_root_dfs(trace: &Trace, idx: SpanIndex, required_service: &str, required_operation: &str) -> Option<SpanIndex> {
    if matches_required(trace, idx, required_service, required_operation) {
        return Some(idx);
    }
    let children = trace.span(idx).children.clone();
    for child in children {
        if let Some(found) = find_root_dfs(trace, child, required_service, required_operation) {
            return Some(found);
        }
    }
    None
}

fn select_root(
    trace: &mut Trace,
    potential_roots: &[SpanIndex],
    required_service: &str,
    required_operation: &str,
    mode: RootTraceMode,
) -> Result<(), AnalysisError> {
    if potential_roots.is_empty() {
        return Err(AnalysisError::NoRoot { reason: "no potential root spans".to_string() });
    }

    match mode {
        RootTraceMode::Strict => {
            if potential_roots.len() != 1 {
                return Err(AnalysisError::NoRoot {
                    reason: format!("{} potential roots in strict mode", potential_roots.len()),
                });
            }
            let only = potential_roots[0];
            if !matches_required(trace, only, required_service, required_operation) {
                return Err(AnalysisError::NoRoot {
                    reason: format!(
                        "root {} does not match required [{}] {}",
                        trace.canonical_name(only),
                        required_service,
                        required_operation
                    ),
                });
            }
            trace.set_root(only);
        }
        RootTraceMode::Lenient => {
            let found = potential_roots
                .iter()
                .find_map(|&candidate| find_root_dfs(trace, candidate, required_service, required_operation));
            match found {
                Some(root) => {
                    trace.detach(root);
                    trace.span_mut(root).parent_span_id = None;
                    trace.set_root(root);
                }
                None => {
                    return Err(AnalysisError::NoRoot {
                        reason: format!("no span matching [{}] {} found", required_service, required_operation),
                    });
                }
            }
        }
    }
    Ok(())
}
