//! Cross-trace aggregation: flat and call-path matrices, occurrence
//! counts, and percentile-of-nonzero-cells tables (spec §4.6).
//!
//! Percentiles are computed nearest-rank style over the nonzero cells of
//! each operation's row, matching the reference implementation's use of a
//! dataframe `.quantile()` call restricted to nonzero values — an
//! operation that only appears in 3 of 100 traces is ranked against those
//! 3 occurrences, not against 97 implicit zeros. Each flat row also carries
//! a ratio against the same percentile of the reserved `"totalTime"` row,
//! so a caller can read "this operation is 30% of the trace" directly off
//! the report instead of re-deriving it.

use crate::metrics::{Exemplar, MetricSet, TOTAL_TIME_KEY};
use crate::model::CallPath;
use std::collections::{HashMap, HashSet};

/// One aggregated row: percentile values keyed by the requested percentile,
/// the overall occurrence count, and (for flat rows) the ratio of each
/// percentile against the same percentile of the `"totalTime"` row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PercentileRow {
    pub occurrences: usize,
    pub percentiles: HashMap<u8, f64>,
    pub ratios: HashMap<u8, f64>,
}

/// The aggregated view across every trace fed into [`Aggregator`].
#[derive(Debug, Clone, Default)]
pub struct AggregateReport {
    pub inclusive_flat: HashMap<String, PercentileRow>,
    pub exclusive_flat: HashMap<String, PercentileRow>,
    pub inclusive_callpath: HashMap<CallPath, PercentileRow>,
    pub exclusive_callpath: HashMap<CallPath, PercentileRow>,
    pub inclusive_exemplars: HashMap<CallPath, Exemplar>,
    pub exclusive_exemplars: HashMap<CallPath, Exemplar>,
    /// Union, across every ingested trace, of `MetricSet::call_chain`:
    /// canonical operation name -> every call-path it was ever seen under.
    pub call_chain_index: HashMap<String, HashSet<CallPath>>,
    pub trace_count: usize,
}

/// Accumulates per-trace [`MetricSet`]s and produces percentile tables.
#[derive(Debug, Default)]
pub struct Aggregator {
    inclusive_flat_cells: HashMap<String, Vec<i64>>,
    exclusive_flat_cells: HashMap<String, Vec<i64>>,
    inclusive_callpath_cells: HashMap<CallPath, Vec<i64>>,
    exclusive_callpath_cells: HashMap<CallPath, Vec<i64>>,
    inclusive_exemplars: HashMap<CallPath, Exemplar>,
    exclusive_exemplars: HashMap<CallPath, Exemplar>,
    call_chain_index: HashMap<String, HashSet<CallPath>>,
    trace_count: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one trace's metrics into the running matrices.
    pub fn ingest(&mut self, metrics: &MetricSet) {
        self.trace_count += 1;

        for (name, &value) in &metrics.inclusive_flat {
            self.inclusive_flat_cells.entry(name.clone()).or_default().push(value);
        }
        for (name, &value) in &metrics.exclusive_flat {
            self.exclusive_flat_cells.entry(name.clone()).or_default().push(value);
        }
        for (cp, &value) in &metrics.inclusive_callpath {
            self.inclusive_callpath_cells.entry(cp.clone()).or_default().push(value);
        }
        for (cp, &value) in &metrics.exclusive_callpath {
            self.exclusive_callpath_cells.entry(cp.clone()).or_default().push(value);
        }
        for (call_path, exemplar) in &metrics.inclusive_exemplars {
            let current = self.inclusive_exemplars.remove(call_path);
            self.inclusive_exemplars.insert(call_path.clone(), Self::better(current, exemplar.clone()));
        }
        for (call_path, exemplar) in &metrics.exclusive_exemplars {
            let current = self.exclusive_exemplars.remove(call_path);
            self.exclusive_exemplars.insert(call_path.clone(), Self::better(current, exemplar.clone()));
        }
        for (name, call_paths) in &metrics.call_chain {
            self.call_chain_index.entry(name.clone()).or_default().extend(call_paths.iter().cloned());
        }
    }

    fn better(current: Option<Exemplar>, candidate: Exemplar) -> Exemplar {
        match current {
            Some(existing) if existing.value >= candidate.value => existing,
            _ => candidate,
        }
    }

    /// Compute percentile rows for every accumulated key, keeping at most
    /// `max_operations` flat rows (ranked by their highest requested
    /// percentile, descending) and at most `max_traces` occurrences per row
    /// (the largest values kept, mirroring descending trace-column
    /// truncation in the reference implementation's summary tables).
    pub fn finish(mut self, percentiles: &[u8], max_operations: usize, max_traces: usize) -> AggregateReport {
        truncate_cells(&mut self.inclusive_flat_cells, max_traces);
        truncate_cells(&mut self.exclusive_flat_cells, max_traces);
        truncate_cells_cp(&mut self.inclusive_callpath_cells, max_traces);
        truncate_cells_cp(&mut self.exclusive_callpath_cells, max_traces);

        let mut report = AggregateReport { trace_count: self.trace_count, ..Default::default() };

        report.inclusive_flat = rank_and_truncate(percentile_rows(&self.inclusive_flat_cells, percentiles), max_operations);
        report.exclusive_flat = rank_and_truncate(percentile_rows(&self.exclusive_flat_cells, percentiles), max_operations);
        report.inclusive_callpath = percentile_rows_cp(&self.inclusive_callpath_cells, percentiles);
        report.exclusive_callpath = percentile_rows_cp(&self.exclusive_callpath_cells, percentiles);
        report.inclusive_exemplars = self.inclusive_exemplars;
        report.exclusive_exemplars = self.exclusive_exemplars;
        report.call_chain_index = self.call_chain_index;

        report
    }
}

fn truncate_cells(cells: &mut HashMap<String, Vec<i64>>, max_traces: usize) {
    for values in cells.values_mut() {
        if values.len() > max_traces {
            values.sort_unstable_by(|a, b| b.cmp(a));
            values.truncate(max_traces);
        }
    }
}

fn truncate_cells_cp(cells: &mut HashMap<CallPath, Vec<i64>>, max_traces: usize) {
    for values in cells.values_mut() {
        if values.len() > max_traces {
            values.sort_unstable_by(|a, b| b.cmp(a));
            values.truncate(max_traces);
        }
    }
}

/// Percentile of nonzero cells, per spec §4.6, plus (for every row except
/// `"totalTime"` itself) the ratio against the same percentile of the
/// `"totalTime"` row — 0 when that denominator is 0, matching
/// `addPercentileColumns`'s guard against division by zero.
fn percentile_rows(cells: &HashMap<String, Vec<i64>>, percentiles: &[u8]) -> HashMap<String, PercentileRow> {
    let total_time_pcts: HashMap<u8, f64> = cells
        .get(TOTAL_TIME_KEY)
        .map(|values| {
            let nonzero: Vec<i64> = values.iter().copied().filter(|&v| v != 0).collect();
            percentiles.iter().map(|&p| (p, nearest_rank_percentile(&nonzero, p))).collect()
        })
        .unwrap_or_default();

    cells
        .iter()
        .map(|(name, values)| {
            let nonzero: Vec<i64> = values.iter().copied().filter(|&v| v != 0).collect();
            let occurrences = values.len();
            let mut pcts = HashMap::new();
            let mut ratios = HashMap::new();
            for &p in percentiles {
                let value = nearest_rank_percentile(&nonzero, p);
                pcts.insert(p, value);
                if name != TOTAL_TIME_KEY {
                    let denom = total_time_pcts.get(&p).copied().unwrap_or(0.0);
                    ratios.insert(p, if denom == 0.0 { 0.0 } else { value / denom });
                }
            }
            (name.clone(), PercentileRow { occurrences, percentiles: pcts, ratios })
        })
        .collect()
}

fn percentile_rows_cp(cells: &HashMap<CallPath, Vec<i64>>, percentiles: &[u8]) -> HashMap<CallPath, PercentileRow> {
    cells
        .iter()
        .map(|(cp, values)| {
            let nonzero: Vec<i64> = values.iter().copied().filter(|&v| v != 0).collect();
            let occurrences = values.len();
            let mut pcts = HashMap::new();
            for &p in percentiles {
                pcts.insert(p, nearest_rank_percentile(&nonzero, p));
            }
            (cp.clone(), PercentileRow { occurrences, percentiles: pcts, ratios: HashMap::new() })
        })
        .collect()
}

/// Nearest-rank percentile over `values`, matching a dataframe `.quantile()`
/// call restricted to the nonzero subset. Returns 0.0 for an empty slice.
fn nearest_rank_percentile(values: &[i64], percentile: u8) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let rank = ((percentile as f64 / 100.0) * (sorted.len() as f64 - 1.0)).round() as usize;
    sorted[rank.min(sorted.len() - 1)] as f64
}

fn rank_and_truncate(mut rows: HashMap<String, PercentileRow>, max_operations: usize) -> HashMap<String, PercentileRow> {
    if rows.len() <= max_operations {
        return rows;
    }
    let mut ranked: Vec<(String, PercentileRow)> = rows.drain().collect();
    ranked.sort_by(|a, b| {
        let a_key = a.1.percentiles.values().cloned().fold(0.0_f64, f64::max);
        let b_key = b.1.percentiles.values().cloned().fold(0.0_f64, f64::max);
        b_key.partial_cmp(&a_key).unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(max_operations);
    ranked.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricSet;
    use crate::model::CallPath;

    fn metric_set(op: &str, inclusive: i64) -> MetricSet {
        let mut m = MetricSet::default();
        m.inclusive_flat.insert(op.to_string(), inclusive);
        m.exclusive_flat.insert(op.to_string(), inclusive);
        let call_path = CallPath(op.to_string());
        m.inclusive_exemplars.insert(call_path.clone(), Exemplar { trace_id: None, span_id: "s".to_string(), value: inclusive });
        m.exclusive_exemplars.insert(call_path.clone(), Exemplar { trace_id: None, span_id: "s".to_string(), value: inclusive });
        m.call_chain.entry(op.to_string()).or_default().insert(call_path);
        m
    }

    #[test]
    fn occurrence_count_matches_number_of_traces_with_the_operation() {
        let mut agg = Aggregator::new();
        agg.ingest(&metric_set("[S1] op", 100));
        agg.ingest(&metric_set("[S1] op", 200));
        let report = agg.finish(&[50], 100, 1000);
        assert_eq!(report.inclusive_flat["[S1] op"].occurrences, 2);
    }

    #[test]
    fn percentile_of_nonzero_excludes_absent_traces() {
        let mut agg = Aggregator::new();
        agg.ingest(&metric_set("[S1] op", 100));
        let mut empty = MetricSet::default();
        empty.inclusive_flat.insert("[S1] other".to_string(), 1);
        agg.ingest(&empty);
        let report = agg.finish(&[50], 100, 1000);
        // op only occurred in one trace; its p50 is exactly that value.
        assert_eq!(report.inclusive_flat["[S1] op"].percentiles[&50], 100.0);
    }

    #[test]
    fn truncation_keeps_highest_ranked_operations() {
        let mut agg = Aggregator::new();
        for i in 0..5 {
            agg.ingest(&metric_set(&format!("[S1] op{i}"), (i as i64 + 1) * 100));
        }
        let report = agg.finish(&[99], 2, 1000);
        assert_eq!(report.inclusive_flat.len(), 2);
        assert!(report.inclusive_flat.contains_key("[S1] op4"));
        assert!(report.inclusive_flat.contains_key("[S1] op3"));
    }

    #[test]
    fn worst_exemplar_is_keyed_by_call_path_and_keeps_largest_value() {
        let mut agg = Aggregator::new();
        agg.ingest(&metric_set("[S1] op", 50));
        agg.ingest(&metric_set("[S1] op", 999));
        let report = agg.finish(&[50], 100, 1000);
        let call_path = CallPath("[S1] op".to_string());
        assert_eq!(report.inclusive_exemplars[&call_path].value, 999);
    }

    #[test]
    fn ratio_is_percentile_over_total_time_percentile() {
        let mut agg = Aggregator::new();
        let mut m = MetricSet::default();
        m.inclusive_flat.insert("[S1] op".to_string(), 86);
        m.inclusive_flat.insert(TOTAL_TIME_KEY.to_string(), 290);
        agg.ingest(&m);
        let report = agg.finish(&[50], 100, 1000);
        assert_eq!(report.inclusive_flat["[S1] op"].ratios[&50], 86.0 / 290.0);
    }

    #[test]
    fn ratio_is_zero_when_total_time_denominator_is_zero() {
        let mut agg = Aggregator::new();
        let mut m = MetricSet::default();
        m.inclusive_flat.insert("[S1] op".to_string(), 0);
        m.inclusive_flat.insert(TOTAL_TIME_KEY.to_string(), 0);
        agg.ingest(&m);
        let report = agg.finish(&[50], 100, 1000);
        assert_eq!(report.inclusive_flat["[S1] op"].ratios[&50], 0.0);
    }

    #[test]
    fn call_chain_index_unions_across_traces() {
        let mut agg = Aggregator::new();
        agg.ingest(&metric_set("[S1] op", 100));
        let mut other = MetricSet::default();
        other
            .call_chain
            .entry("[S1] op".to_string())
            .or_default()
            .insert(CallPath("[S1] root->[S1] op".to_string()));
        agg.ingest(&other);
        let report = agg.finish(&[50], 100, 1000);
        assert_eq!(report.call_chain_index["[S1] op"].len(), 2);
    }
}
