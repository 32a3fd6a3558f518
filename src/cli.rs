//! CLI argument parsing for the critical-path analyzer.

use crate::config::AnalysisConfig;
use crate::graph_builder::RootTraceMode;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tracecrit")]
#[command(version)]
#[command(about = "Critical-path analysis for Jaeger-style distributed traces", long_about = None)]
pub struct Cli {
    /// Directory of Jaeger trace JSON files to analyze.
    #[arg(short = 't', long = "trace-dir", conflicts_with = "file")]
    pub trace_dir: Option<PathBuf>,

    /// A single Jaeger trace JSON file to analyze.
    #[arg(long = "file", conflicts_with = "trace_dir")]
    pub file: Option<PathBuf>,

    /// Service name the root span must belong to.
    #[arg(short = 's', long = "service")]
    pub service: String,

    /// Operation name the root span must carry.
    #[arg(short = 'a', long = "operation")]
    pub operation: String,

    /// Root-selection policy.
    #[arg(long = "root-trace-mode", value_enum, default_value = "strict")]
    pub root_trace_mode: RootTraceModeArg,

    /// Directory to write percentile tables and folded-stack files into.
    #[arg(short = 'o', long = "output-dir", default_value = "./output")]
    pub output_dir: PathBuf,

    /// Percentiles to compute and emit (comma-separated).
    #[arg(long = "percentiles", value_delimiter = ',', default_value = "50,95,99")]
    pub percentiles: Vec<u8>,

    /// Keep at most this many operations in the flat percentile tables.
    #[arg(long = "max-operations", default_value_t = 20)]
    pub max_operations: usize,

    /// Keep at most this many trace samples per operation row.
    #[arg(long = "max-traces", default_value_t = 1000)]
    pub max_traces: usize,

    /// Number of worker threads processing trace files concurrently.
    #[arg(short = 'w', long = "workers", default_value_t = 4)]
    pub workers: usize,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootTraceModeArg {
    Strict,
    Lenient,
}

impl From<RootTraceModeArg> for RootTraceMode {
    fn from(value: RootTraceModeArg) -> Self {
        match value {
            RootTraceModeArg::Strict => RootTraceMode::Strict,
            RootTraceModeArg::Lenient => RootTraceMode::Lenient,
        }
    }
}

impl From<Cli> for AnalysisConfig {
    fn from(cli: Cli) -> Self {
        AnalysisConfig {
            trace_dir: cli.trace_dir,
            file: cli.file,
            service: cli.service,
            operation: cli.operation,
            root_trace_mode: cli.root_trace_mode.into(),
            output_dir: cli.output_dir,
            percentiles: cli.percentiles,
            max_operations: cli.max_operations,
            max_traces: cli.max_traces,
            workers: cli.workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_required_args() {
        let cli = Cli::parse_from(["tracecrit", "--file", "t.json", "-s", "S1", "-a", "O1"]);
        assert_eq!(cli.file, Some(PathBuf::from("t.json")));
        assert_eq!(cli.service, "S1");
        assert_eq!(cli.operation, "O1");
        assert_eq!(cli.root_trace_mode, RootTraceModeArg::Strict);
    }

    #[test]
    fn percentiles_parse_as_comma_separated_list() {
        let cli = Cli::parse_from(["tracecrit", "--file", "t.json", "-s", "S1", "-a", "O1", "--percentiles", "10,50,90"]);
        assert_eq!(cli.percentiles, vec![10, 50, 90]);
    }

    #[test]
    fn trace_dir_and_file_are_mutually_exclusive() {
        let result = Cli::try_parse_from(["tracecrit", "--file", "t.json", "-t", "dir", "-s", "S1", "-a", "O1"]);
        assert!(result.is_err());
    }
}
