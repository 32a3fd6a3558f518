//! Parallel per-trace processing: fan out trace files across a fixed
//! worker pool, fan their metrics back in for aggregation (spec §5).
//!
//! One bounded `crossbeam` channel feeds worker threads trace-file paths;
//! a second bounded channel carries each worker's [`MetricSet`] (or
//! skip reason) back to the caller. There is no shared mutable state
//! between workers — each trace is built, sanitized, and measured
//! independently before its result crosses the channel.

use crate::aggregator::Aggregator;
use crate::critical_path::find_critical_path;
use crate::error::AnalysisError;
use crate::folded_stack::TraceFold;
use crate::graph_builder::{build_trace, RootTraceMode, TraceBlob};
use crate::metrics::{extract_metrics, MetricSet};
use crate::sanitizer::sanitize;
use crossbeam::channel::{bounded, Receiver, Sender};
use std::path::PathBuf;
use std::thread;
use tracing::{debug, warn};

/// Per-trace-file outcome: either a processed trace's metrics (plus its
/// folded-stack contribution) or the reason the file was skipped. Skipped
/// files never abort the run — one malformed trace must not stop the rest
/// of the batch from being processed (spec §7).
pub enum TraceOutcome {
    Processed { metrics: MetricSet, fold: TraceFold },
    Skipped { path: PathBuf, reason: AnalysisError },
}

/// Read, build, sanitize and extract metrics for one trace file.
fn process_one(
    path: &PathBuf,
    service: &str,
    operation: &str,
    mode: RootTraceMode,
) -> Result<(MetricSet, TraceFold), AnalysisError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AnalysisError::MalformedInput { detail: format!("{}: {}", path.display(), e) })?;
    let blob: TraceBlob = serde_json::from_str(&contents)
        .map_err(|e| AnalysisError::MalformedInput { detail: format!("{}: {}", path.display(), e) })?;

    let mut trace = build_trace(&blob, service, operation, mode)?;
    let root = trace.root.ok_or_else(|| AnalysisError::NoRoot { reason: "trace has no root after build".to_string() })?;

    let report = sanitize(&mut trace, root);
    debug!(path = %path.display(), shrinks = report.shrink_counter, drops = report.total_drop, "sanitized trace");

    let critical_path = find_critical_path(&trace, root);
    let metrics = extract_metrics(&trace, &critical_path.path, root);

    let total_time = metrics.total_time;
    let fold = TraceFold {
        total_time,
        call_paths: metrics
            .inclusive_callpath
            .iter()
            .map(|(cp, &v)| (cp.0.clone(), v))
            .collect(),
    };

    Ok((metrics, fold))
}

/// Process every path in `paths` across `workers` threads and fold the
/// results into an [`Aggregator`]. Returns the aggregator plus the list
/// of files that were skipped and why.
pub fn run_pipeline(
    paths: Vec<PathBuf>,
    service: String,
    operation: String,
    mode: RootTraceMode,
    workers: usize,
) -> (Aggregator, Vec<TraceFold>, Vec<(PathBuf, AnalysisError)>) {
    let workers = workers.max(1);
    let (work_tx, work_rx): (Sender<PathBuf>, Receiver<PathBuf>) = bounded(paths.len().max(1));
    let (result_tx, result_rx): (Sender<TraceOutcome>, Receiver<TraceOutcome>) = bounded(paths.len().max(1));

    for path in paths.clone() {
        work_tx.send(path).expect("work channel outlives senders");
    }
    drop(work_tx);

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let work_rx = work_rx.clone();
        let result_tx = result_tx.clone();
        let service = service.clone();
        let operation = operation.clone();

        handles.push(thread::spawn(move || {
            while let Ok(path) = work_rx.recv() {
                let outcome = match process_one(&path, &service, &operation, mode) {
                    Ok((metrics, fold)) => TraceOutcome::Processed { metrics, fold },
                    Err(reason) => {
                        warn!(path = %path.display(), error = %reason, "skipping trace");
                        TraceOutcome::Skipped { path, reason }
                    }
                };
                if result_tx.send(outcome).is_err() {
                    break;
                }
            }
        }));
    }
    drop(result_tx);

    let mut aggregator = Aggregator::new();
    let mut folds = Vec::new();
    let mut skipped = Vec::new();
    for outcome in result_rx.iter() {
        match outcome {
            TraceOutcome::Processed { metrics, fold } => {
                aggregator.ingest(&metrics);
                folds.push(fold);
            }
            TraceOutcome::Skipped { path, reason } => skipped.push((path, reason)),
        }
    }

    for handle in handles {
        let _ = handle.join();
    }

    (aggregator, folds, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_trace_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    const VALID_TRACE: &str = r#"{"data": [{"traceID":"t","processes":{"p1":{"serviceName":"S1","tags":[]}},
        "spans": [{"spanID":"A","operationName":"O1","startTime":0,"duration":10,"processID":"p1","references":[]}]
        }]}"#;

    #[test]
    fn valid_traces_are_aggregated() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_trace_file(&dir, "a.json", VALID_TRACE);

        let (aggregator, folds, skipped) =
            run_pipeline(vec![path], "S1".to_string(), "O1".to_string(), RootTraceMode::Strict, 2);
        assert!(skipped.is_empty());
        assert_eq!(folds.len(), 1);
        let report = aggregator.finish(&[50], 100, 100);
        assert_eq!(report.trace_count, 1);
    }

    #[test]
    fn malformed_trace_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_trace_file(&dir, "bad.json", "not json");
        let good = write_trace_file(&dir, "good.json", VALID_TRACE);

        let (aggregator, _folds, skipped) =
            run_pipeline(vec![bad, good], "S1".to_string(), "O1".to_string(), RootTraceMode::Strict, 2);
        assert_eq!(skipped.len(), 1);
        let report = aggregator.finish(&[50], 100, 100);
        assert_eq!(report.trace_count, 1);
    }
}
