//! Folded-stack emission for flame graphs, and differential folding
//! between percentiles (spec §4.7).
//!
//! Traces are processed in ascending order of total critical-path time.
//! For each requested percentile `p`, the `k = round(n * p / 100)`
//! shortest traces are folded together into one `;`-joined call-path
//! frequency table; for every pair of consecutive percentiles, an
//! external diff tool is invoked to produce the differential folded
//! output flame-graph renderers consume.
//!
//! The diff step is behind the [`FoldTool`] trait rather than a direct
//! subprocess call so tests never shell out; [`ExternalFoldTool`] is the
//! production implementation that does.

use crate::error::AnalysisError;
use std::collections::HashMap;
use std::process::Command;

/// One trace's contribution: its total critical-path time and the
/// call-path -> time map to fold into the percentile bucket it falls in.
#[derive(Debug, Clone)]
pub struct TraceFold {
    pub total_time: i64,
    pub call_paths: HashMap<String, i64>,
}

/// Aggregate several traces' call-path maps by summing values per key,
/// matching the reference implementation's merge-by-callpath behavior.
fn aggregate_ccts(folds: &[&TraceFold]) -> HashMap<String, i64> {
    let mut merged = HashMap::new();
    for fold in folds {
        for (call_path, &time) in &fold.call_paths {
            *merged.entry(call_path.clone()).or_insert(0) += time;
        }
    }
    merged
}

/// Render a call-path -> time map as folded-stack text: one `key value`
/// line per call path, with `->` separators rewritten to `;`.
pub fn render_folded(merged: &HashMap<String, i64>) -> String {
    let mut lines: Vec<String> = merged
        .iter()
        .map(|(call_path, value)| format!("{} {}", call_path.replace("->", ";"), value))
        .collect();
    lines.sort();
    lines.join("\n")
}

/// Abstraction over the external differential-folding tool (the
/// `difffolded`/`flamegraph` pair in the reference pipeline).
pub trait FoldTool {
    fn diff(&self, lower: &str, higher: &str) -> Result<String, AnalysisError>;
}

/// Shells out to the `difffolded.pl` convention: an executable found on
/// `PATH` that accepts two folded-stack file contents on stdin/argv and
/// emits a differential folded-stack on stdout.
pub struct ExternalFoldTool {
    pub binary: String,
}

impl Default for ExternalFoldTool {
    fn default() -> Self {
        Self { binary: "difffolded.pl".to_string() }
    }
}

impl FoldTool for ExternalFoldTool {
    fn diff(&self, lower: &str, higher: &str) -> Result<String, AnalysisError> {
        let lower_file = write_temp(lower)?;
        let higher_file = write_temp(higher)?;

        let output = Command::new(&self.binary)
            .arg(lower_file.path())
            .arg(higher_file.path())
            .output()
            .map_err(|e| AnalysisError::ExternalProcessFailure {
                tool: "difffolded",
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(AnalysisError::ExternalProcessFailure {
                tool: "difffolded",
                detail: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn write_temp(contents: &str) -> Result<tempfile::NamedTempFile, AnalysisError> {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().map_err(|e| AnalysisError::ExternalProcessFailure {
        tool: "difffolded",
        detail: e.to_string(),
    })?;
    file.write_all(contents.as_bytes()).map_err(|e| AnalysisError::ExternalProcessFailure {
        tool: "difffolded",
        detail: e.to_string(),
    })?;
    Ok(file)
}

/// One emitted percentile bucket: the percentile value, the folded-stack
/// text for it, and — for every percentile already emitted below it — a
/// differential text against that lower percentile (spec §4.7 step 4).
#[derive(Debug, Clone)]
pub struct FoldedOutput {
    pub percentile: u8,
    pub folded_text: String,
    pub diffs_against_lower: Vec<(u8, String)>,
}

/// Process `traces` (any order) into one [`FoldedOutput`] per requested
/// percentile, ascending. `percentiles` is sorted internally. Every
/// percentile is diffed against *every* percentile emitted before it, not
/// just the immediately preceding one, matching
/// `flameGraphPctFilePair[:-1]`'s all-priors loop in the reference
/// implementation.
pub fn emit_folded_stacks(
    traces: &[TraceFold],
    percentiles: &[u8],
    tool: &dyn FoldTool,
) -> Vec<FoldedOutput> {
    let mut sorted_traces: Vec<&TraceFold> = traces.iter().collect();
    sorted_traces.sort_by_key(|t| t.total_time);

    let mut sorted_percentiles = percentiles.to_vec();
    sorted_percentiles.sort_unstable();

    let mut outputs = Vec::new();
    let mut previous: Vec<(u8, String)> = Vec::new();

    for &p in &sorted_percentiles {
        let k = ((p as f64 / 100.0) * sorted_traces.len() as f64).round() as usize;
        if k == 0 {
            continue;
        }
        let subset = &sorted_traces[..k.min(sorted_traces.len())];
        let merged = aggregate_ccts(subset);
        let folded_text = render_folded(&merged);

        let diffs_against_lower: Vec<(u8, String)> = previous
            .iter()
            .filter_map(|(lower_p, lower_text)| tool.diff(lower_text, &folded_text).ok().map(|d| (*lower_p, d)))
            .collect();

        outputs.push(FoldedOutput { percentile: p, folded_text: folded_text.clone(), diffs_against_lower });
        previous.push((p, folded_text));
    }

    outputs
}

/// Filename for one percentile's folded-stack file, e.g. `flame-graph-P50.cct`.
pub fn folded_filename(percentile: u8) -> String {
    format!("flame-graph-P{}.cct", percentile)
}

/// Filename for a differential folded-stack file, e.g.
/// `flame-graph-P50vsP95.cct`.
pub fn diff_filename(lower: u8, higher: u8) -> String {
    format!("flame-graph-P{}vsP{}.cct", lower, higher)
}
