//! Trace graph entities: spans, the per-trace arena, and call-path identity.
//!
//! # Arena, not shared ownership
//!
//! Spans live in a flat `Vec<Span>` owned by the `Trace`. Parent/child links
//! are indices into that arena (`SpanIndex`), not `Rc<RefCell<_>>` pointers —
//! the tree is built once by `GraphBuilder`, mutated in place by the
//! `Sanitizer`, and read-only from then on, so there is no need for shared,
//! reference-counted ownership.
//!
//! # Example
//!
//! ```
//! use tracecrit::model::{ProcessInfo, Span, Trace};
//! use std::collections::HashMap;
//!
//! let mut processes = HashMap::new();
//! processes.insert(
//!     "p1".to_string(),
//!     ProcessInfo { service_name: "checkout".to_string(), hostname: None },
//! );
//!
//! let root = Span::new("root".to_string(), 0, 100, "op".to_string(), "p1".to_string(), None);
//! let mut trace = Trace::new(processes);
//! let root_idx = trace.push_span(root);
//! trace.set_root(root_idx);
//!
//! assert_eq!(trace.canonical_name(root_idx), "[checkout] op");
//! ```

use std::collections::HashMap;
use std::fmt;

/// Index into a [`Trace`]'s span arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanIndex(pub usize);

/// A single timed operation, reconstructed from the input blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Opaque identity, unique within the trace.
    pub span_id: String,
    /// Active start time (microseconds since epoch); mutated by sanitization.
    pub start_time: i64,
    /// Active duration (microseconds); mutated by sanitization.
    pub duration: i64,
    /// Start time as first observed, before any sanitization.
    pub original_start_time: i64,
    /// Duration as first observed, before any sanitization.
    pub original_duration: i64,
    pub operation_name: String,
    /// Key into the trace's process table.
    pub process_id: String,
    pub parent_span_id: Option<String>,
    pub parent: Option<SpanIndex>,
    pub children: Vec<SpanIndex>,
}

impl Span {
    pub fn new(
        span_id: String,
        start_time: i64,
        duration: i64,
        operation_name: String,
        process_id: String,
        parent_span_id: Option<String>,
    ) -> Self {
        Self {
            span_id,
            start_time,
            duration,
            original_start_time: start_time,
            original_duration: duration,
            operation_name,
            process_id,
            parent_span_id,
            parent: None,
            children: Vec::new(),
        }
    }

    /// `end_time = start_time + duration`, recomputed from the active pair.
    pub fn end_time(&self) -> i64 {
        self.start_time + self.duration
    }

    /// Link `self` (via arena index `child`) as a child of `self`'s span.
    ///
    /// Idempotent: inserting the same child index twice leaves `children`
    /// unchanged, matching the reference implementation's use of a set
    /// (rather than a list) for child membership.
    pub fn add_child(&mut self, child: SpanIndex) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }
}

/// Process-table entry: a span's `process_id` resolves to this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub service_name: String,
    pub hostname: Option<String>,
}

/// An ordered, `"->"`-joined sequence of canonical span names from the
/// trace's root to a target span — the context-sensitive key used by
/// call-path profiles and exemplar maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallPath(pub String);

impl CallPath {
    pub fn root(canonical_root_name: &str) -> Self {
        CallPath(canonical_root_name.to_string())
    }

    /// Extend this call-path with one more canonical name.
    pub fn extend(&self, canonical_name: &str) -> Self {
        CallPath(format!("{}->{}", self.0, canonical_name))
    }
}

impl fmt::Display for CallPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A per-file container: the reconstructed tree plus its process table.
///
/// Immutable after construction except for the sanitization pass (time
/// adjustment and child-list pruning).
#[derive(Debug, Clone)]
pub struct Trace {
    pub processes: HashMap<String, ProcessInfo>,
    pub hostmap: HashMap<String, String>,
    spans: Vec<Span>,
    pub root: Option<SpanIndex>,
    /// Self-check data from the input blob's optional `testing` section.
    pub testing: Option<HashMap<String, i64>>,
    /// The blob's `traceID`, carried onto every exemplar extracted from
    /// this trace (spec §3's `(trace_id, span_id, value)` exemplar shape).
    pub trace_id: Option<String>,
}

impl Trace {
    pub fn new(processes: HashMap<String, ProcessInfo>) -> Self {
        Self {
            processes,
            hostmap: HashMap::new(),
            spans: Vec::new(),
            root: None,
            testing: None,
            trace_id: None,
        }
    }

    pub fn push_span(&mut self, span: Span) -> SpanIndex {
        let idx = SpanIndex(self.spans.len());
        self.spans.push(span);
        idx
    }

    pub fn set_root(&mut self, root: SpanIndex) {
        self.root = Some(root);
    }

    pub fn span(&self, idx: SpanIndex) -> &Span {
        &self.spans[idx.0]
    }

    pub fn span_mut(&mut self, idx: SpanIndex) -> &mut Span {
        &mut self.spans[idx.0]
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// `"[" + service_name + "] " + operation_name`, resolving the span's
    /// `process_id` through the process table. Falls back to the raw
    /// process id if it has no table entry (malformed but non-fatal input).
    pub fn canonical_name(&self, idx: SpanIndex) -> String {
        let span = self.span(idx);
        let service_name = self
            .processes
            .get(&span.process_id)
            .map(|p| p.service_name.as_str())
            .unwrap_or(span.process_id.as_str());
        format!("[{}] {}", service_name, span.operation_name)
    }

    /// The `"->"`-joined call-path from `root` to `idx`, following parent
    /// pointers. `idx` must be reachable from `self.root`.
    pub fn call_path(&self, idx: SpanIndex) -> CallPath {
        let mut names = vec![self.canonical_name(idx)];
        let mut current = self.span(idx).parent;
        while let Some(p) = current {
            names.push(self.canonical_name(p));
            current = self.span(p).parent;
        }
        names.reverse();
        CallPath(names.join("->"))
    }

    /// Detach `idx` from its parent's child list and clear its parent link.
    /// Descendants of `idx` are left in the arena but become unreachable
    /// from `root`; later passes only traverse reachable spans.
    pub fn detach(&mut self, idx: SpanIndex) {
        if let Some(parent) = self.span(idx).parent {
            self.span_mut(parent).children.retain(|&c| c != idx);
        }
        self.span_mut(idx).parent = None;
    }

    /// Count of spans reachable from `root` and the longest root-to-leaf
    /// edge count + 1, via an independent DFS (spec §4.5).
    pub fn graph_stats(&self, root: SpanIndex) -> (usize, usize) {
        fn walk(trace: &Trace, idx: SpanIndex) -> (usize, usize) {
            let mut descendants = 0usize;
            let mut depth = 0usize;
            for &child in &trace.span(idx).children {
                let (d, depth_c) = walk(trace, child);
                descendants += d;
                depth = depth.max(depth_c);
            }
            (descendants + 1, depth + 1)
        }
        walk(self, root)
    }
}
