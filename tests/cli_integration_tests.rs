//! End-to-end CLI invocation against an on-disk trace file.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::tempdir;

const VALID_TRACE: &str = r#"{"data": [{"traceID":"t1","processes":{"p1":{"serviceName":"checkout","tags":[]}},
    "spans": [
      {"spanID":"A","operationName":"handle","startTime":0,"duration":100,"processID":"p1","references":[]},
      {"spanID":"B","operationName":"db_query","startTime":10,"duration":60,"processID":"p1","references":[{"refType":"CHILD_OF","spanID":"A"}]}
    ]}]}"#;

#[test]
fn analyzes_a_single_trace_file_and_writes_percentile_report() {
    let dir = tempdir().unwrap();
    let trace_path = dir.path().join("trace.json");
    let mut file = std::fs::File::create(&trace_path).unwrap();
    file.write_all(VALID_TRACE.as_bytes()).unwrap();

    let output_dir = dir.path().join("out");

    let mut cmd = Command::cargo_bin("tracecrit").unwrap();
    cmd.arg("--file")
        .arg(&trace_path)
        .arg("-s")
        .arg("checkout")
        .arg("-a")
        .arg("handle")
        .arg("-o")
        .arg(&output_dir)
        .arg("--percentiles")
        .arg("50");

    cmd.assert().success();

    let report = std::fs::read_to_string(output_dir.join("percentiles.json")).unwrap();
    assert!(report.contains("[checkout] handle"));
}

#[test]
fn rejects_both_file_and_trace_dir() {
    let mut cmd = Command::cargo_bin("tracecrit").unwrap();
    cmd.arg("--file")
        .arg("a.json")
        .arg("-t")
        .arg("dir")
        .arg("-s")
        .arg("checkout")
        .arg("-a")
        .arg("handle");

    cmd.assert().failure().stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn missing_required_service_flag_fails() {
    let mut cmd = Command::cargo_bin("tracecrit").unwrap();
    cmd.arg("--file").arg("a.json").arg("-a").arg("handle");

    cmd.assert().failure();
}
