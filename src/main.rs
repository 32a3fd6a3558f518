use anyhow::{Context, Result};
use clap::Parser;

mod aggregator;
mod cli;
mod config;
mod critical_path;
mod error;
mod folded_stack;
mod graph_builder;
mod metrics;
mod model;
mod pipeline;
mod sanitizer;

use cli::Cli;
use config::AnalysisConfig;
use folded_stack::ExternalFoldTool;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config: AnalysisConfig = cli.into();

    let trace_files = config
        .resolve_trace_files()
        .context("failed to resolve trace files")?;

    if trace_files.is_empty() {
        anyhow::bail!("no trace files found; pass --file or a --trace-dir containing .json files");
    }

    tracing::info!(count = trace_files.len(), "processing trace files");

    let (aggregator, folds, skipped) = pipeline::run_pipeline(
        trace_files,
        config.service.clone(),
        config.operation.clone(),
        config.root_trace_mode,
        config.workers,
    );

    for (path, reason) in &skipped {
        tracing::warn!(path = %path.display(), error = %reason, "trace skipped");
    }

    let report = aggregator.finish(&config.percentiles, config.max_operations, config.max_traces);
    tracing::info!(traces = report.trace_count, "aggregation complete");

    std::fs::create_dir_all(&config.output_dir).context("failed to create output directory")?;

    let report_path = config.output_dir.join("percentiles.json");
    let report_json = serde_json::to_string_pretty(&serde_json::json!({
        "trace_count": report.trace_count,
        "inclusive_flat": report.inclusive_flat.iter().map(|(k, v)| {
            (k.clone(), serde_json::json!({
                "occurrences": v.occurrences,
                "percentiles": v.percentiles,
                "ratios": v.ratios,
            }))
        }).collect::<std::collections::HashMap<_, _>>(),
        "exclusive_flat": report.exclusive_flat.iter().map(|(k, v)| {
            (k.clone(), serde_json::json!({
                "occurrences": v.occurrences,
                "percentiles": v.percentiles,
                "ratios": v.ratios,
            }))
        }).collect::<std::collections::HashMap<_, _>>(),
    }))
    .context("failed to serialize percentile report")?;
    std::fs::write(&report_path, report_json).context("failed to write percentile report")?;

    let tool = ExternalFoldTool::default();
    let outputs = folded_stack::emit_folded_stacks(&folds, &config.percentiles, &tool);
    for output in &outputs {
        let path = config.output_dir.join(folded_stack::folded_filename(output.percentile));
        std::fs::write(&path, &output.folded_text)
            .with_context(|| format!("failed to write {}", path.display()))?;

        for (lower, diff_text) in &output.diffs_against_lower {
            let diff_path = config.output_dir.join(folded_stack::diff_filename(*lower, output.percentile));
            std::fs::write(&diff_path, diff_text)
                .with_context(|| format!("failed to write {}", diff_path.display()))?;
        }
    }

    tracing::info!(path = %report_path.display(), "wrote percentile report");
    Ok(())
}
